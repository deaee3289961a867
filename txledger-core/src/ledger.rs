//! Ledger reconstruction for UTXO-style chains.
//!
//! Walks an address history in the order given by the provider, classifies
//! each transaction relative to the address, and derives balances by
//! unwinding a cumulative delta from the current balance. Rows outside the
//! report window still move the delta but are neither priced nor returned.
//!
//! The unwind assumes the history is complete. A single missing transaction
//! shifts every derived balance, which is what the completeness check is for.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, Result};
use crate::model::{AddressHistory, Chain, Transaction, TxInput};
use crate::price::{PriceLookup, fetch_rates};
use crate::time::{LocalStamp, ReportWindow, local_stamp};
use crate::units::{parse_minor, to_major};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Incoming => write!(f, "Incoming"),
            Direction::Outgoing => write!(f, "Outgoing"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxStatus {
    Confirmed,
    Unconfirmed,
}

impl TxStatus {
    pub fn from_confirmations(confirmations: u64) -> Self {
        if confirmations == 0 {
            TxStatus::Unconfirmed
        } else {
            TxStatus::Confirmed
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStatus::Confirmed => write!(f, "Confirmed"),
            TxStatus::Unconfirmed => write!(f, "Unconfirmed"),
        }
    }
}

/// Fiat conversion at the transaction's block time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FiatValue {
    /// USD per display unit
    pub rate: Decimal,
    pub amount: Decimal,
    pub fee: Decimal,
}

/// A transaction annotated relative to the report address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedTransaction {
    pub txid: String,
    pub block_height: Option<i64>,
    pub block_time: i64,
    pub status: TxStatus,
    pub direction: Direction,
    pub from_addresses: Vec<String>,
    pub to_addresses: Vec<String>,
    /// Net amount moved, minor units, never negative
    pub amount: i128,
    /// Network fee, minor units
    pub fee: i128,
    /// Display-unit decimals of `amount`, `fee` and the balances
    pub decimals: u32,
    pub fiat: Option<FiatValue>,
    pub balance_before: i128,
    pub balance_after: i128,
    pub local: LocalStamp,
}

impl AnnotatedTransaction {
    /// Positive for incoming, negative for outgoing
    pub fn signed_amount(&self) -> i128 {
        signed(self.direction, self.amount)
    }
}

fn signed(direction: Direction, amount: i128) -> i128 {
    match direction {
        Direction::Incoming => amount,
        Direction::Outgoing => -amount,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerReport {
    pub address: String,
    pub current_balance: i128,
    /// Balance implied before the oldest transaction; zero for a complete history
    pub opening_balance: i128,
    pub window: ReportWindow,
    pub transactions: Vec<AnnotatedTransaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconstructOptions {
    /// Maximum price lookups in flight
    pub price_concurrency: usize,
    /// Fail with `IncompleteHistory` instead of warning
    pub require_complete_history: bool,
    /// Minor-unit decimals of the native asset
    pub decimals: u32,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            price_concurrency: 4,
            require_complete_history: false,
            decimals: Chain::Bitcoin.decimals(),
        }
    }
}

/// Result of the classification pass, before balances are known.
#[derive(Debug)]
struct Classified {
    txid: String,
    block_height: Option<i64>,
    block_time: i64,
    status: TxStatus,
    direction: Direction,
    from_addresses: Vec<String>,
    to_addresses: Vec<String>,
    amount: i128,
    fee: i128,
    in_window: bool,
    local: LocalStamp,
}

fn checked_sum<'a>(
    txid: &str,
    field: &'static str,
    values: impl Iterator<Item = &'a Option<String>>,
) -> Result<i128> {
    let mut total: i128 = 0;
    for value in values {
        let v = value
            .as_deref()
            .and_then(parse_minor)
            .ok_or_else(|| LedgerError::malformed(txid, field))?;
        total = total
            .checked_add(v)
            .ok_or_else(|| LedgerError::malformed(txid, field))?;
    }
    Ok(total)
}

fn senders(vin: &[TxInput], address: &str) -> Vec<String> {
    vin.iter()
        .filter(|i| !i.involves(address))
        .map(|i| i.joined_addresses())
        .filter(|joined| !joined.is_empty())
        .collect()
}

fn classify(tx: &Transaction, address: &str, window: &ReportWindow) -> Result<Classified> {
    let txid = tx.txid.as_str();
    let vin = tx.vin.as_ref().ok_or_else(|| LedgerError::malformed(txid, "vin"))?;
    let vout = tx.vout.as_ref().ok_or_else(|| LedgerError::malformed(txid, "vout"))?;
    let block_time = tx
        .block_time
        .ok_or_else(|| LedgerError::malformed(txid, "blockTime"))?;
    let local = local_stamp(block_time, window.timezone)
        .ok_or_else(|| LedgerError::malformed(txid, "blockTime"))?;
    let fee = tx
        .fees
        .as_deref()
        .and_then(parse_minor)
        .ok_or_else(|| LedgerError::malformed(txid, "fees"))?;

    let is_sender = vin.iter().any(|input| input.involves(address));

    let (direction, amount, from_addresses, to_addresses) = if is_sender {
        let sent = checked_sum(
            txid,
            "vin.value",
            vin.iter().filter(|i| i.involves(address)).map(|i| &i.value),
        )?;
        // Outputs paying the address back are change, not movement
        let change = checked_sum(
            txid,
            "vout.value",
            vout.iter().filter(|o| o.involves(address)).map(|o| &o.value),
        )?;
        if change > sent {
            // Gets back more than it put in (payjoin): a net receipt
            (
                Direction::Incoming,
                change - sent,
                senders(vin, address),
                vec![address.to_string()],
            )
        } else {
            let recipients = vout
                .iter()
                .filter(|o| !o.involves(address))
                .map(|o| o.joined_addresses())
                .filter(|joined| !joined.is_empty())
                .collect();
            (
                Direction::Outgoing,
                sent - change,
                vec![address.to_string()],
                recipients,
            )
        }
    } else {
        let received = checked_sum(
            txid,
            "vout.value",
            vout.iter().filter(|o| o.involves(address)).map(|o| &o.value),
        )?;
        (
            Direction::Incoming,
            received,
            senders(vin, address),
            vec![address.to_string()],
        )
    };

    Ok(Classified {
        txid: tx.txid.clone(),
        block_height: tx.block_height,
        block_time,
        status: TxStatus::from_confirmations(tx.confirmations),
        direction,
        from_addresses,
        to_addresses,
        amount,
        fee,
        in_window: window.contains(block_time),
        local,
    })
}

fn fiat_value(row: &Classified, usd: f64, decimals: u32) -> Result<FiatValue> {
    let overflow = || {
        LedgerError::price_lookup(
            row.block_time,
            format!("cannot convert {} at rate {usd}", row.txid),
        )
    };
    let rate = Decimal::try_from(usd).map_err(|_| overflow())?;
    let amount = to_major(row.amount, decimals).ok_or_else(overflow)?;
    let fee = to_major(row.fee, decimals).ok_or_else(overflow)?;
    Ok(FiatValue {
        rate,
        amount: amount.checked_mul(rate).ok_or_else(overflow)?,
        fee: fee.checked_mul(rate).ok_or_else(overflow)?,
    })
}

/// Reconstruct the annotated, window-filtered ledger of `history.address`.
///
/// Three passes: classify every transaction (fail fast on malformed
/// records), price the in-window rows with a bounded fan-out, then unwind
/// balances sequentially in the original order.
pub async fn reconstruct<P>(
    history: &AddressHistory,
    prices: &P,
    window: &ReportWindow,
    options: &ReconstructOptions,
) -> Result<LedgerReport>
where
    P: PriceLookup + ?Sized,
{
    let address = history.address.as_str();
    let current_balance = parse_minor(&history.balance).ok_or_else(|| {
        LedgerError::Provider(format!("invalid balance {:?} for {address}", history.balance))
    })?;

    let classified = history
        .transactions
        .iter()
        .map(|tx| classify(tx, address, window))
        .collect::<Result<Vec<_>>>()?;

    let requests: Vec<(usize, i64)> = classified
        .iter()
        .enumerate()
        .filter(|(_, row)| row.in_window)
        .map(|(index, row)| (index, row.block_time))
        .collect();
    debug!(
        address,
        total = classified.len(),
        in_window = requests.len(),
        "classified transactions"
    );

    let rates = fetch_rates(prices, &requests, options.price_concurrency).await?;

    let mut cumulative_diff: i128 = 0;
    let mut opening_balance = current_balance;
    let mut transactions = Vec::with_capacity(requests.len());

    for (index, row) in classified.into_iter().enumerate() {
        let overflow = || LedgerError::malformed(&row.txid, "amount");
        let signed_amount = signed(row.direction, row.amount);
        cumulative_diff = cumulative_diff
            .checked_add(signed_amount)
            .ok_or_else(overflow)?;
        let balance_before = current_balance
            .checked_sub(cumulative_diff)
            .ok_or_else(overflow)?;
        let balance_after = balance_before
            .checked_add(signed_amount)
            .ok_or_else(overflow)?;
        opening_balance = balance_before;

        if !row.in_window {
            continue;
        }

        let rate = rates.get(&index).ok_or_else(|| {
            LedgerError::price_lookup(row.block_time, format!("no rate for {}", row.txid))
        })?;
        let fiat = fiat_value(&row, rate.usd, options.decimals)?;

        transactions.push(AnnotatedTransaction {
            txid: row.txid,
            block_height: row.block_height,
            block_time: row.block_time,
            status: row.status,
            direction: row.direction,
            from_addresses: row.from_addresses,
            to_addresses: row.to_addresses,
            amount: row.amount,
            fee: row.fee,
            decimals: options.decimals,
            fiat: Some(fiat),
            balance_before,
            balance_after,
            local: row.local,
        });
    }

    check_completeness(history, opening_balance, options)?;

    info!(
        address,
        rows = transactions.len(),
        start = %window.start,
        end = %window.end,
        "ledger reconstructed"
    );

    Ok(LedgerReport {
        address: history.address.clone(),
        current_balance,
        opening_balance,
        window: window.clone(),
        transactions,
    })
}

fn check_completeness(
    history: &AddressHistory,
    opening_balance: i128,
    options: &ReconstructOptions,
) -> Result<()> {
    let received = history.transactions.len();
    let reported = history.txs.unwrap_or(received as u64);
    if opening_balance == 0 && (received as u64) >= reported {
        return Ok(());
    }

    if options.require_complete_history {
        return Err(LedgerError::IncompleteHistory {
            received,
            reported,
            opening_balance,
        });
    }

    warn!(
        address = %history.address,
        received,
        reported,
        opening_balance,
        "history does not reconcile; derived balances may be off"
    );
    Ok(())
}
