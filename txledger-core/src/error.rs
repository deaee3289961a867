//! Error taxonomy for ledger reconstruction.

use thiserror::Error;

use crate::model::Chain;

/// Every failure on the reconstruction path. None of these are recovered
/// locally: the whole report is aborted and no partial rows are returned.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A transaction record lacks a field the reconstruction needs, or the
    /// field does not hold an integer amount.
    #[error("malformed transaction {txid}: missing or invalid `{field}`")]
    MalformedTransaction { txid: String, field: &'static str },

    /// The fiat-rate provider failed or answered with something unusable.
    #[error("price lookup failed at timestamp {timestamp}: {message}")]
    PriceLookup { timestamp: i64, message: String },

    /// Fetching the address history failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// The address does not match the chain's format. Raised before any
    /// network call is made.
    #[error("invalid {chain} address: {address}")]
    InvalidAddress { chain: Chain, address: String },

    /// The report window could not be resolved (unknown zone, reversed
    /// dates, unrepresentable local midnight).
    #[error("invalid report window: {0}")]
    InvalidWindow(String),

    /// The history does not reconcile: fewer transactions than the provider
    /// reports, or a non-zero balance before the oldest transaction.
    #[error(
        "incomplete history: received {received} of {reported} transactions, opening balance {opening_balance}"
    )]
    IncompleteHistory {
        received: usize,
        reported: u64,
        opening_balance: i128,
    },
}

impl LedgerError {
    pub(crate) fn malformed(txid: &str, field: &'static str) -> Self {
        LedgerError::MalformedTransaction {
            txid: txid.to_string(),
            field,
        }
    }

    pub fn price_lookup(timestamp: i64, message: impl Into<String>) -> Self {
        LedgerError::PriceLookup {
            timestamp,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
