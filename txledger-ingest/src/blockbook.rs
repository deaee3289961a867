//! Blockbook client: address history (`bb_getaddress` / `bb_getAddress`)
//! and historical fiat tickers (`bb_gettickers`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use txledger_core::{
    AddressHistory, Chain, HistoryQuery, LedgerError, PriceLookup, PriceRate, TransactionProvider,
    validate_address,
};

use crate::rpc::RpcTransport;

/// Second positional parameter of the address-history call. Blockbook
/// accepts the paging numbers as strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressParams {
    pub page: String,
    pub size: String,
    pub from_height: String,
    pub details: &'static str,
}

impl From<&HistoryQuery> for AddressParams {
    fn from(q: &HistoryQuery) -> Self {
        Self {
            page: q.page.to_string(),
            size: q.size.to_string(),
            from_height: q.from_height.to_string(),
            details: "txs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickerParams {
    pub timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickersResult {
    pub ts: i64,
    pub rates: TickerRates,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickerRates {
    #[serde(default)]
    pub usd: Option<f64>,
}

impl TickersResult {
    pub fn into_rate(self) -> Result<PriceRate> {
        let usd = self
            .rates
            .usd
            .with_context(|| format!("no usd rate at {}", self.ts))?;
        Ok(PriceRate { ts: self.ts, usd })
    }
}

pub struct BlockbookClient {
    rpc: RpcTransport,
    chain: Chain,
}

impl BlockbookClient {
    pub fn new(endpoint: impl Into<String>, chain: Chain, timeout: Duration) -> Result<Self> {
        Ok(Self {
            rpc: RpcTransport::new(endpoint, timeout)?,
            chain,
        })
    }

    pub async fn get_address(&self, address: &str, query: &HistoryQuery) -> Result<AddressHistory> {
        let method = self.chain.history_method();
        let params = (address, AddressParams::from(query));
        let history: AddressHistory = self.rpc.call(method, params).await?;
        debug!(
            address,
            txs = history.transactions.len(),
            page = query.page,
            "fetched address history"
        );
        Ok(history)
    }

    pub async fn get_tickers(&self, timestamp: i64) -> Result<PriceRate> {
        let result: TickersResult = self
            .rpc
            .call("bb_gettickers", [TickerParams { timestamp }])
            .await?;
        result.into_rate()
    }
}

#[async_trait]
impl TransactionProvider for BlockbookClient {
    async fn get_address_history(
        &self,
        address: &str,
        query: &HistoryQuery,
    ) -> txledger_core::Result<AddressHistory> {
        validate_address(self.chain, address)?;
        self.get_address(address, query)
            .await
            .map_err(|e| LedgerError::Provider(format!("{e:#}")))
    }
}

#[async_trait]
impl PriceLookup for BlockbookClient {
    async fn rate_at(&self, timestamp: i64) -> txledger_core::Result<PriceRate> {
        self.get_tickers(timestamp)
            .await
            .map_err(|e| LedgerError::price_lookup(timestamp, format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_address_params_shape() {
        let params = ("bc1qexample", AddressParams::from(&HistoryQuery::default()));
        let v = serde_json::to_value(&params).unwrap();
        assert_eq!(
            v,
            json!(["bc1qexample", {"page": "1", "size": "1000", "fromHeight": "0", "details": "txs"}])
        );
    }

    #[test]
    fn test_tickers_result() {
        let r: TickersResult =
            serde_json::from_value(json!({"ts": 1710000000, "rates": {"usd": 68123.45}})).unwrap();
        let rate = r.into_rate().unwrap();
        assert_eq!(rate.ts, 1_710_000_000);
        assert_eq!(rate.usd, 68123.45);
    }

    #[test]
    fn test_tickers_without_usd() {
        let r: TickersResult =
            serde_json::from_value(json!({"ts": 5, "rates": {"eur": 1.0}})).unwrap();
        assert!(r.into_rate().is_err());
    }

    #[tokio::test]
    async fn test_invalid_address_rejected_before_request() {
        // Port 9 (discard) is never contacted: validation fails first
        let timeout = Duration::from_secs(1);
        let client = BlockbookClient::new("http://127.0.0.1:9", Chain::Bitcoin, timeout).unwrap();
        let err = client
            .get_address_history("not-an-address", &HistoryQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAddress { .. }));
    }
}
