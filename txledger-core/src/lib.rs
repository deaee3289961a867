//! txledger-core: address history types and ledger reconstruction

pub mod account;
pub mod address;
pub mod error;
pub mod ledger;
pub mod model;
pub mod price;
pub mod time;
pub mod units;

pub use account::{
    AccountReport, AccountTransfer, TransferKind, TransferStatus, extract_account_transfers,
};
pub use address::{is_valid_address, validate_address};
pub use error::{LedgerError, Result};
pub use ledger::{
    AnnotatedTransaction, Direction, FiatValue, LedgerReport, ReconstructOptions, TxStatus,
    reconstruct,
};
pub use model::{
    AddressHistory, Chain, EthereumSpecific, InternalTransfer, MultiTokenValue, ParsedData,
    TokenTransfer, Transaction, TxInput, TxOutput,
};
pub use price::{
    HistoryQuery, PriceLookup, PriceRate, TransactionProvider, fetch_full_history, fetch_rates,
};
pub use time::{LocalStamp, ReportWindow, local_stamp, parse_timezone};
pub use units::{format_units, parse_minor, to_major};
