//! Typed command table for the EVM lookup tools.
//!
//! Each operation is a variant with its own input struct; `dispatch`
//! validates the input, picks the chain's client from the registry and
//! shapes the answer for display.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use txledger_core::{Chain, format_units, validate_address};

use crate::evm::{ChainRegistry, EvmChain, EvmLog, LogFilter};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressInput {
    pub address: String,
    pub chain: EvmChain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainInput {
    pub chain: EvmChain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogsInput {
    pub chain: EvmChain,
    #[serde(flatten)]
    pub filter: LogFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "input")]
pub enum ToolCommand {
    #[serde(rename = "eth_getBalance")]
    GetBalance(AddressInput),
    #[serde(rename = "eth_getCode")]
    GetCode(AddressInput),
    #[serde(rename = "eth_gasPrice")]
    GasPrice(ChainInput),
    #[serde(rename = "eth_getLogs")]
    GetLogs(LogsInput),
}

impl ToolCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCommand::GetBalance(_) => "eth_getBalance",
            ToolCommand::GetCode(_) => "eth_getCode",
            ToolCommand::GasPrice(_) => "eth_gasPrice",
            ToolCommand::GetLogs(_) => "eth_getLogs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceOutput {
    pub address: String,
    pub chain: String,
    pub balance_wei: String,
    pub balance_formatted: String,
    pub symbol: String,
    pub decimals: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeOutput {
    pub address: String,
    pub chain: String,
    pub is_contract: bool,
    pub bytecode_size: usize,
    pub bytecode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPriceOutput {
    pub chain: String,
    pub gas_price_wei: String,
    pub gas_price_gwei: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsOutput {
    pub chain: String,
    pub count: usize,
    pub logs: Vec<EvmLog>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Balance(BalanceOutput),
    Code(CodeOutput),
    GasPrice(GasPriceOutput),
    Logs(LogsOutput),
}

fn check_address(address: &str) -> Result<()> {
    validate_address(Chain::Ethereum, address).map_err(anyhow::Error::from)
}

pub fn code_output(address: &str, chain: EvmChain, code: String) -> CodeOutput {
    let hex = code.strip_prefix("0x").unwrap_or(&code);
    CodeOutput {
        address: address.to_string(),
        chain: chain.name().to_string(),
        is_contract: !hex.is_empty(),
        bytecode_size: hex.len() / 2,
        bytecode: if code.is_empty() { "0x".to_string() } else { code },
    }
}

pub async fn dispatch(registry: &ChainRegistry, command: ToolCommand) -> Result<ToolOutput> {
    debug!(tool = command.name(), "dispatching tool");
    match command {
        ToolCommand::GetBalance(AddressInput { address, chain }) => {
            check_address(&address)?;
            let wei = registry
                .client(chain)?
                .get_balance(&address)
                .await
                .context("Failed to get balance")?;
            let formatted = format_units(&wei.to_string(), chain.decimals())
                .context("format balance")?;
            Ok(ToolOutput::Balance(BalanceOutput {
                address,
                chain: chain.name().to_string(),
                balance_wei: wei.to_string(),
                balance_formatted: format!("{formatted} {}", chain.symbol()),
                symbol: chain.symbol().to_string(),
                decimals: chain.decimals(),
            }))
        }
        ToolCommand::GetCode(AddressInput { address, chain }) => {
            check_address(&address)?;
            let code = registry
                .client(chain)?
                .get_code(&address)
                .await
                .context("Failed to get code")?;
            Ok(ToolOutput::Code(code_output(&address, chain, code)))
        }
        ToolCommand::GasPrice(ChainInput { chain }) => {
            let wei = registry
                .client(chain)?
                .gas_price()
                .await
                .context("Failed to get gas price")?;
            let gwei = format_units(&wei.to_string(), 9).context("format gas price")?;
            Ok(ToolOutput::GasPrice(GasPriceOutput {
                chain: chain.name().to_string(),
                gas_price_wei: wei.to_string(),
                gas_price_gwei: gwei,
            }))
        }
        ToolCommand::GetLogs(LogsInput { chain, filter }) => {
            if let Some(address) = filter.address.as_deref() {
                check_address(address)?;
            }
            let logs = registry
                .client(chain)?
                .get_logs(&filter)
                .await
                .context("Failed to get logs")?;
            Ok(ToolOutput::Logs(LogsOutput {
                chain: chain.name().to_string(),
                count: logs.len(),
                logs,
            }))
        }
    }
}
