//! Address history records as returned by a Blockbook indexer.
//!
//! Fields the reconstruction depends on are kept optional so that a missing
//! field surfaces as a `MalformedTransaction` naming it, instead of a generic
//! deserialization failure for the whole page.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chains with a reconstruction variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Chain {
    #[serde(rename = "bitcoin")]
    Bitcoin,
    #[serde(rename = "ethereum")]
    Ethereum,
}

impl Chain {
    /// Decimals between the minor unit and the display unit
    pub fn decimals(&self) -> u32 {
        match self {
            Chain::Bitcoin => 8,
            Chain::Ethereum => 18,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "BTC",
            Chain::Ethereum => "ETH",
        }
    }

    /// Blockbook method name serving the address history.
    /// The Ethereum flavour of Blockbook spells it in camel case.
    pub fn history_method(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "bb_getaddress",
            Chain::Ethereum => "bb_getAddress",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Bitcoin => write!(f, "bitcoin"),
            Chain::Ethereum => write!(f, "ethereum"),
        }
    }
}

/// Account snapshot plus its transaction feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressHistory {
    pub address: String,
    /// Current balance in minor units, as a decimal string
    pub balance: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    /// Total number of transactions the provider knows for the address
    #[serde(default)]
    pub txs: Option<u64>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub txid: String,
    #[serde(default)]
    pub block_height: Option<i64>,
    /// Unix seconds
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub confirmations: u64,
    #[serde(default)]
    pub vin: Option<Vec<TxInput>>,
    #[serde(default)]
    pub vout: Option<Vec<TxOutput>>,
    /// Fee in minor units
    #[serde(default)]
    pub fees: Option<String>,
    #[serde(default)]
    pub token_transfers: Option<Vec<TokenTransfer>>,
    #[serde(default)]
    pub ethereum_specific: Option<EthereumSpecific>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxInput {
    /// Absent on coinbase inputs
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Absent on OP_RETURN outputs
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
    #[serde(default)]
    pub value: Option<String>,
}

fn addresses_contain(addresses: &Option<Vec<String>>, address: &str) -> bool {
    addresses
        .as_deref()
        .is_some_and(|list| list.iter().any(|a| a == address))
}

fn addresses_joined(addresses: &Option<Vec<String>>) -> String {
    addresses.as_deref().unwrap_or_default().join(", ")
}

impl TxInput {
    pub fn involves(&self, address: &str) -> bool {
        addresses_contain(&self.addresses, address)
    }

    pub fn joined_addresses(&self) -> String {
        addresses_joined(&self.addresses)
    }
}

impl TxOutput {
    pub fn involves(&self, address: &str) -> bool {
        addresses_contain(&self.addresses, address)
    }

    pub fn joined_addresses(&self) -> String {
        addresses_joined(&self.addresses)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthereumSpecific {
    #[serde(default)]
    pub internal_transfers: Option<Vec<InternalTransfer>>,
    #[serde(default)]
    pub parsed_data: Option<ParsedData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalTransfer {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedData {
    #[serde(default)]
    pub method_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ParsedData {
    /// `name (methodId)` when both are known, else whichever is present
    pub fn label(&self) -> String {
        let name = self.name.as_deref().filter(|s| !s.is_empty());
        let method_id = self.method_id.as_deref().filter(|s| !s.is_empty());
        match (name, method_id) {
            (Some(n), Some(id)) => format!("{n} ({id})"),
            (Some(n), None) => n.to_string(),
            (None, Some(id)) => id.to_string(),
            (None, None) => "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    /// ERC20, ERC721 or ERC1155
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub contract: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub multi_token_values: Option<Vec<MultiTokenValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiTokenValue {
    pub id: String,
    pub value: String,
}
