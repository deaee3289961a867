//! EVM chains, their JSON-RPC clients, and the caller-owned registry that
//! maps one to the other.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::rpc::RpcTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvmChain {
    Ethereum,
    Base,
    Arbitrum,
    Avalanche,
    Bsc,
}

impl EvmChain {
    pub const ALL: [EvmChain; 5] = [
        EvmChain::Ethereum,
        EvmChain::Base,
        EvmChain::Arbitrum,
        EvmChain::Avalanche,
        EvmChain::Bsc,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            EvmChain::Ethereum => "ethereum",
            EvmChain::Base => "base",
            EvmChain::Arbitrum => "arbitrum",
            EvmChain::Avalanche => "avalanche",
            EvmChain::Bsc => "bsc",
        }
    }

    /// QuickNode network slug
    pub fn network(&self) -> &'static str {
        match self {
            EvmChain::Ethereum => "mainnet",
            EvmChain::Base => "base-mainnet",
            EvmChain::Arbitrum => "arbitrum-mainnet",
            EvmChain::Avalanche => "avalanche-mainnet",
            EvmChain::Bsc => "bsc",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EvmChain::Ethereum => "Ethereum",
            EvmChain::Base => "Base",
            EvmChain::Arbitrum => "Arbitrum",
            EvmChain::Avalanche => "Avalanche",
            EvmChain::Bsc => "Binance Smart Chain",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            EvmChain::Ethereum | EvmChain::Base | EvmChain::Arbitrum => "ETH",
            EvmChain::Avalanche => "AVAX",
            EvmChain::Bsc => "BNB",
        }
    }

    pub fn decimals(&self) -> u32 {
        18
    }

    /// QuickNode endpoint URL for this chain.
    pub fn rpc_url(&self, endpoint_name: &str, token: &str) -> String {
        match self {
            EvmChain::Ethereum => format!("https://{endpoint_name}.quiknode.pro/{token}/"),
            EvmChain::Avalanche => format!(
                "https://{endpoint_name}.{}.quiknode.pro/{token}/ext/bc/C/rpc",
                self.network()
            ),
            _ => format!("https://{endpoint_name}.{}.quiknode.pro/{token}/", self.network()),
        }
    }
}

impl fmt::Display for EvmChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for EvmChain {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        EvmChain::ALL
            .into_iter()
            .find(|c| c.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let supported: Vec<_> = EvmChain::ALL.iter().map(|c| c.id()).collect();
                anyhow!("chain {s} not supported; use one of: {}", supported.join(", "))
            })
    }
}

/// Parse an `0x`-prefixed hex quantity.
pub fn parse_quantity(hex: &str) -> Result<u128> {
    let digits = hex
        .strip_prefix("0x")
        .with_context(|| format!("quantity without 0x prefix: {hex}"))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16).with_context(|| format!("invalid hex quantity: {hex}"))
}

/// `eth_getLogs` filter. Unset fields are omitted from the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_block: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_block: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub topics: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmLog {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub log_index: Option<String>,
}

/// Pass-through JSON-RPC calls against one chain.
#[derive(Debug)]
pub struct EvmClient {
    rpc: RpcTransport,
    chain: EvmChain,
}

impl EvmClient {
    pub fn new(url: impl Into<String>, chain: EvmChain, timeout: Duration) -> Result<Self> {
        Ok(Self {
            rpc: RpcTransport::new(url, timeout)?,
            chain,
        })
    }

    pub fn chain(&self) -> EvmChain {
        self.chain
    }

    /// Balance in wei at the latest block
    pub async fn get_balance(&self, address: &str) -> Result<u128> {
        let hex: String = self.rpc.call("eth_getBalance", (address, "latest")).await?;
        parse_quantity(&hex)
    }

    /// Deployed bytecode, `0x` for externally owned accounts
    pub async fn get_code(&self, address: &str) -> Result<String> {
        self.rpc.call("eth_getCode", (address, "latest")).await
    }

    /// Gas price in wei
    pub async fn gas_price(&self) -> Result<u128> {
        let hex: String = self.rpc.call("eth_gasPrice", Vec::<String>::new()).await?;
        parse_quantity(&hex)
    }

    pub async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<EvmLog>> {
        self.rpc.call("eth_getLogs", [filter]).await
    }
}

/// Chain-to-client map, built once at start-up and passed by reference.
#[derive(Default)]
pub struct ChainRegistry {
    clients: BTreeMap<EvmChain, EvmClient>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One client per supported chain on a QuickNode endpoint.
    pub fn from_quicknode(endpoint_name: &str, token: &str, timeout: Duration) -> Result<Self> {
        if endpoint_name.is_empty() || token.is_empty() {
            bail!("QuickNode endpoint name and token are required (QN_ENDPOINT_NAME / QN_TOKEN_ID)");
        }
        let mut registry = Self::new();
        for chain in EvmChain::ALL {
            let client = EvmClient::new(chain.rpc_url(endpoint_name, token), chain, timeout)?;
            registry.insert(client);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, client: EvmClient) {
        self.clients.insert(client.chain(), client);
    }

    pub fn client(&self, chain: EvmChain) -> Result<&EvmClient> {
        self.clients.get(&chain).with_context(|| {
            let registered: Vec<String> = self.chains().map(|c| c.to_string()).collect();
            let registered = if registered.is_empty() {
                "none".to_string()
            } else {
                registered.join(", ")
            };
            format!("no client registered for {chain} (registered: {registered})")
        })
    }

    pub fn chains(&self) -> impl Iterator<Item = EvmChain> + '_ {
        self.clients.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rpc_urls() {
        assert_eq!(
            EvmChain::Ethereum.rpc_url("my-node", "tok"),
            "https://my-node.quiknode.pro/tok/"
        );
        assert_eq!(
            EvmChain::Base.rpc_url("my-node", "tok"),
            "https://my-node.base-mainnet.quiknode.pro/tok/"
        );
        assert_eq!(
            EvmChain::Avalanche.rpc_url("my-node", "tok"),
            "https://my-node.avalanche-mainnet.quiknode.pro/tok/ext/bc/C/rpc"
        );
    }

    #[test]
    fn test_chain_from_str() {
        assert_eq!("bsc".parse::<EvmChain>().unwrap(), EvmChain::Bsc);
        assert_eq!("Arbitrum".parse::<EvmChain>().unwrap(), EvmChain::Arbitrum);
        let err = "solana".parse::<EvmChain>().unwrap_err();
        assert!(err.to_string().contains("ethereum, base, arbitrum, avalanche, bsc"));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(parse_quantity("0x1bc16d674ec80000").unwrap(), 2_000_000_000_000_000_000);
        assert!(parse_quantity("1234").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_log_filter_omits_unset_fields() {
        let filter = LogFilter {
            address: Some("0xabc".into()),
            from_block: Some("0x10".into()),
            ..LogFilter::default()
        };
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({"address": "0xabc", "fromBlock": "0x10"})
        );
    }

    #[test]
    fn test_registry_lookup() {
        let registry =
            ChainRegistry::from_quicknode("node", "tok", Duration::from_secs(5)).unwrap();
        assert_eq!(registry.chains().count(), 5);
        let base = registry.client(EvmChain::Base).unwrap();
        assert_eq!(base.chain(), EvmChain::Base);

        let empty = ChainRegistry::new();
        assert!(empty.client(EvmChain::Ethereum).is_err());
        assert!(ChainRegistry::from_quicknode("", "tok", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_missing_client_lists_registered_chains() {
        let mut registry = ChainRegistry::new();
        let timeout = Duration::from_secs(5);
        for chain in [EvmChain::Base, EvmChain::Ethereum] {
            registry.insert(EvmClient::new("http://127.0.0.1:9", chain, timeout).unwrap());
        }
        let err = registry.client(EvmChain::Bsc).unwrap_err();
        assert_eq!(
            err.to_string(),
            "no client registered for bsc (registered: ethereum, base)"
        );

        let err = ChainRegistry::new().client(EvmChain::Bsc).unwrap_err();
        assert!(err.to_string().ends_with("(registered: none)"));
    }
}
