//! CSV rendering of account-model (Ethereum) transfer rows.

use anyhow::{Context, Result};
use std::io::Write;

use txledger_core::AccountReport;

pub const HEADER: [&str; 14] = [
    "Day",
    "Time",
    "Block",
    "Transaction ID",
    "Transaction Status",
    "Transaction Type",
    "Asset",
    "Sender Address",
    "Direction",
    "Receiver Address",
    "Amount",
    "Token ID",
    "Fees [ETH]",
    "Method Name/ID",
];

pub fn write_transfers_csv<W: Write>(report: &AccountReport, out: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(HEADER)?;

    for t in &report.transfers {
        let block = t.block_height.map(|h| h.to_string()).unwrap_or_default();
        let status = t.status.to_string();
        let kind = t.kind.to_string();
        let direction = t.direction.to_string();
        wtr.write_record([
            t.local.day.as_str(),
            t.local.time.as_str(),
            block.as_str(),
            t.txid.as_str(),
            status.as_str(),
            kind.as_str(),
            t.asset.as_str(),
            t.sender.as_str(),
            direction.as_str(),
            t.receiver.as_str(),
            t.value.as_str(),
            t.token_id.as_deref().unwrap_or("N/A"),
            t.fee.as_str(),
            t.method.as_str(),
        ])?;
    }

    wtr.flush().context("flush csv")?;
    Ok(())
}

pub fn transfers_csv_string(report: &AccountReport) -> Result<String> {
    let mut buf = Vec::new();
    write_transfers_csv(report, &mut buf)?;
    String::from_utf8(buf).context("csv is not utf-8")
}
