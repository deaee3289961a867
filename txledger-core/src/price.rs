//! Collaborator seams: transaction provider and fiat price oracle.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::model::AddressHistory;

/// Fiat exchange rate effective at `ts` (unix seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRate {
    pub ts: i64,
    pub usd: f64,
}

/// Price oracle. One call per in-window transaction.
#[async_trait]
pub trait PriceLookup: Send + Sync {
    async fn rate_at(&self, timestamp: i64) -> Result<PriceRate>;
}

/// Paging parameters for an address history request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub page: u32,
    pub size: u32,
    pub from_height: u64,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            page: 1,
            size: 1000,
            from_height: 0,
        }
    }
}

#[async_trait]
pub trait TransactionProvider: Send + Sync {
    async fn get_address_history(
        &self,
        address: &str,
        query: &HistoryQuery,
    ) -> Result<AddressHistory>;
}

/// Look up rates for `(row index, block time)` pairs with at most
/// `concurrency` requests in flight. Results are keyed by row index, so
/// completion order does not matter. The first failure aborts the rest.
pub async fn fetch_rates<P>(
    lookup: &P,
    requests: &[(usize, i64)],
    concurrency: usize,
) -> Result<HashMap<usize, PriceRate>>
where
    P: PriceLookup + ?Sized,
{
    let mut rates = HashMap::with_capacity(requests.len());
    let mut pending = stream::iter(requests.iter().copied())
        .map(|(index, timestamp)| async move {
            (index, timestamp, lookup.rate_at(timestamp).await)
        })
        .buffer_unordered(concurrency.max(1));

    while let Some((index, timestamp, result)) = pending.next().await {
        let rate = result?;
        if !rate.usd.is_finite() || rate.usd < 0.0 {
            return Err(LedgerError::price_lookup(
                timestamp,
                format!("unusable usd rate {}", rate.usd),
            ));
        }
        rates.insert(index, rate);
    }

    Ok(rates)
}

/// Fetch every page of an address history and concatenate the
/// transactions in provider order. Summary fields come from the first page.
pub async fn fetch_full_history<P>(
    provider: &P,
    address: &str,
    page_size: u32,
) -> Result<AddressHistory>
where
    P: TransactionProvider + ?Sized,
{
    let mut query = HistoryQuery {
        size: page_size.max(1),
        ..HistoryQuery::default()
    };
    let mut history = provider.get_address_history(address, &query).await?;
    let total_pages = history.total_pages.unwrap_or(1);

    while query.page < total_pages {
        query.page += 1;
        let next = provider.get_address_history(address, &query).await?;
        if next.transactions.is_empty() {
            break;
        }
        history.transactions.extend(next.transactions);
    }

    debug!(
        address,
        pages = query.page,
        txs = history.transactions.len(),
        "address history complete"
    );
    history.page = Some(1);
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers slower for earlier timestamps so completions arrive out of order.
    struct SlowFirst {
        calls: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl PriceLookup for SlowFirst {
        async fn rate_at(&self, timestamp: i64) -> Result<PriceRate> {
            self.calls.lock().unwrap().push(timestamp);
            let delay = 30u64.saturating_sub(timestamp as u64 * 10);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(PriceRate {
                ts: timestamp,
                usd: timestamp as f64 * 100.0,
            })
        }
    }

    #[tokio::test]
    async fn test_rates_keyed_by_index() {
        let lookup = SlowFirst {
            calls: Mutex::new(Vec::new()),
        };
        let requests = vec![(4, 1), (7, 2), (9, 3)];
        let rates = fetch_rates(&lookup, &requests, 3).await.unwrap();

        assert_eq!(rates.len(), 3);
        assert_eq!(rates[&4].usd, 100.0);
        assert_eq!(rates[&7].usd, 200.0);
        assert_eq!(rates[&9].usd, 300.0);
        assert_eq!(lookup.calls.lock().unwrap().len(), 3);
    }

    struct Failing;

    #[async_trait]
    impl PriceLookup for Failing {
        async fn rate_at(&self, timestamp: i64) -> Result<PriceRate> {
            Err(LedgerError::price_lookup(timestamp, "connection refused"))
        }
    }

    #[tokio::test]
    async fn test_failure_aborts() {
        let err = fetch_rates(&Failing, &[(0, 10)], 2).await.unwrap_err();
        assert!(matches!(err, LedgerError::PriceLookup { timestamp: 10, .. }));
    }

    struct NanRate;

    #[async_trait]
    impl PriceLookup for NanRate {
        async fn rate_at(&self, timestamp: i64) -> Result<PriceRate> {
            Ok(PriceRate {
                ts: timestamp,
                usd: f64::NAN,
            })
        }
    }

    #[tokio::test]
    async fn test_rejects_non_finite_rate() {
        let err = fetch_rates(&NanRate, &[(0, 5)], 1).await.unwrap_err();
        assert!(matches!(err, LedgerError::PriceLookup { timestamp: 5, .. }));
    }

    #[tokio::test]
    async fn test_empty_requests() {
        let rates = fetch_rates(&Failing, &[], 4).await.unwrap();
        assert!(rates.is_empty());
    }

    struct Paged {
        pages: Vec<Vec<&'static str>>,
        seen: Mutex<Vec<HistoryQuery>>,
    }

    #[async_trait]
    impl TransactionProvider for Paged {
        async fn get_address_history(
            &self,
            address: &str,
            query: &HistoryQuery,
        ) -> Result<AddressHistory> {
            self.seen.lock().unwrap().push(*query);
            let txids = self
                .pages
                .get(query.page as usize - 1)
                .cloned()
                .unwrap_or_default();
            Ok(AddressHistory {
                address: address.to_string(),
                balance: "5".to_string(),
                page: Some(query.page),
                total_pages: Some(self.pages.len() as u32),
                txs: Some(3),
                transactions: txids
                    .into_iter()
                    .map(|txid| crate::model::Transaction {
                        txid: txid.to_string(),
                        block_height: None,
                        block_time: None,
                        confirmations: 0,
                        vin: None,
                        vout: None,
                        fees: None,
                        token_transfers: None,
                        ethereum_specific: None,
                    })
                    .collect(),
            })
        }
    }

    #[tokio::test]
    async fn test_full_history_follows_pages() {
        let provider = Paged {
            pages: vec![vec!["c", "b"], vec!["a"]],
            seen: Mutex::new(Vec::new()),
        };
        let history = fetch_full_history(&provider, "addr", 2).await.unwrap();

        let txids: Vec<_> = history.transactions.iter().map(|t| t.txid.as_str()).collect();
        assert_eq!(txids, vec!["c", "b", "a"]);
        assert_eq!(history.balance, "5");
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].page, 2);
        assert_eq!(seen[1].size, 2);
    }
}
