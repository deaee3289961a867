//! txledger-ingest: JSON-RPC clients feeding the ledger (Blockbook history and
//! tickers) and the EVM lookup tools.

pub mod blockbook;
pub mod evm;
pub mod rpc;
pub mod tools;

pub use blockbook::BlockbookClient;
pub use evm::{ChainRegistry, EvmChain, EvmClient, EvmLog, LogFilter};
pub use tools::{AddressInput, ChainInput, LogsInput, ToolCommand, ToolOutput, dispatch};
