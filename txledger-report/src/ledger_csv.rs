//! CSV rendering of a reconstructed UTXO ledger.
//!
//! Columns:
//! Day,Time,Transaction ID,Type,Direction,From Addresses,To Addresses,
//! Amount [BTC],Amount [USD],Fees [BTC],Fees [USD],Pre Balance (BTC),Post Balance (BTC)

use anyhow::{Context, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use std::io::Write;

use txledger_core::{AnnotatedTransaction, LedgerReport, to_major};

/// Fixed-point rendering, rounding half away from zero.
pub fn fixed(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", dp as usize, rounded)
}

fn native(minor: i128, decimals: u32) -> Result<String> {
    let major = to_major(minor, decimals)
        .with_context(|| format!("amount {minor} does not fit a decimal with {decimals} places"))?;
    Ok(fixed(major, decimals))
}

pub fn header(symbol: &str) -> Vec<String> {
    vec![
        "Day".to_string(),
        "Time".to_string(),
        "Transaction ID".to_string(),
        "Type".to_string(),
        "Direction".to_string(),
        "From Addresses".to_string(),
        "To Addresses".to_string(),
        format!("Amount [{symbol}]"),
        "Amount [USD]".to_string(),
        format!("Fees [{symbol}]"),
        "Fees [USD]".to_string(),
        format!("Pre Balance ({symbol})"),
        format!("Post Balance ({symbol})"),
    ]
}

fn row(tx: &AnnotatedTransaction) -> Result<Vec<String>> {
    let (usd_amount, usd_fee) = match &tx.fiat {
        Some(fiat) => (fixed(fiat.amount, 2), fixed(fiat.fee, 2)),
        None => (String::new(), String::new()),
    };

    Ok(vec![
        tx.local.day.clone(),
        tx.local.time.clone(),
        tx.txid.clone(),
        tx.status.to_string(),
        tx.direction.to_string(),
        tx.from_addresses.join(", "),
        tx.to_addresses.join(", "),
        native(tx.amount, tx.decimals)?,
        usd_amount,
        native(tx.fee, tx.decimals)?,
        usd_fee,
        native(tx.balance_before, tx.decimals)?,
        native(tx.balance_after, tx.decimals)?,
    ])
}

/// Write the report rows. Fields containing commas (joined address
/// lists) are quoted by the writer.
pub fn write_ledger_csv<W: Write>(report: &LedgerReport, symbol: &str, out: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(header(symbol))?;
    for tx in &report.transactions {
        wtr.write_record(row(tx).with_context(|| format!("rendering {}", tx.txid))?)?;
    }
    wtr.flush().context("flush csv")?;
    Ok(())
}

pub fn ledger_csv_string(report: &LedgerReport, symbol: &str) -> Result<String> {
    let mut buf = Vec::new();
    write_ledger_csv(report, symbol, &mut buf)?;
    String::from_utf8(buf).context("csv is not utf-8")
}
