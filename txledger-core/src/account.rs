//! Account-model (Ethereum) transfer extraction.
//!
//! One top-level transaction can yield several rows: the native movement
//! per output, each internal transfer and each token transfer touching the
//! address. Address matching is case-insensitive since providers return
//! checksummed addresses while callers often pass lowercase ones.

use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::ledger::Direction;
use crate::model::{AddressHistory, Chain, TokenTransfer, Transaction};
use crate::time::{LocalStamp, ReportWindow, local_stamp};
use crate::units::format_units;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferKind {
    Normal,
    Internal,
    Erc20,
    Erc721,
    Erc1155,
}

impl TransferKind {
    fn from_token_type(kind: &str) -> Option<Self> {
        match kind {
            "ERC20" => Some(TransferKind::Erc20),
            "ERC721" => Some(TransferKind::Erc721),
            "ERC1155" => Some(TransferKind::Erc1155),
            _ => None,
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferKind::Normal => "Normal",
            TransferKind::Internal => "Internal",
            TransferKind::Erc20 => "ERC20",
            TransferKind::Erc721 => "ERC721",
            TransferKind::Erc1155 => "ERC1155",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferStatus {
    Confirmed,
    Pending,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Confirmed => write!(f, "Confirmed"),
            TransferStatus::Pending => write!(f, "Pending"),
        }
    }
}

/// One value movement touching the report address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountTransfer {
    pub txid: String,
    pub block_height: Option<i64>,
    pub status: TransferStatus,
    pub kind: TransferKind,
    /// `ETH`, `name (symbol)` for tokens, or `N/A`
    pub asset: String,
    pub sender: String,
    pub receiver: String,
    pub direction: Direction,
    /// Display value; ids and amounts joined by ", " for ERC1155
    pub value: String,
    pub token_id: Option<String>,
    /// Transaction fee in ether
    pub fee: String,
    /// `name (methodId)` from the decoded input, empty when not decoded
    pub method: String,
    pub contract: Option<String>,
    pub local: LocalStamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountReport {
    pub address: String,
    pub window: ReportWindow,
    pub transfers: Vec<AccountTransfer>,
}

/// Fields shared by every row of one transaction.
struct TxContext<'a> {
    txid: &'a str,
    block_height: Option<i64>,
    status: TransferStatus,
    fee: String,
    method: String,
    local: LocalStamp,
}

impl TxContext<'_> {
    #[allow(clippy::too_many_arguments)]
    fn row(
        &self,
        kind: TransferKind,
        asset: String,
        sender: String,
        receiver: String,
        direction: Direction,
        value: String,
        token_id: Option<String>,
        contract: Option<String>,
    ) -> AccountTransfer {
        AccountTransfer {
            txid: self.txid.to_string(),
            block_height: self.block_height,
            status: self.status,
            kind,
            asset,
            sender,
            receiver,
            direction,
            value,
            token_id,
            fee: self.fee.clone(),
            method: self.method.clone(),
            contract,
            local: self.local.clone(),
        }
    }
}

fn same_address(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn ether(txid: &str, raw: Option<&str>, field: &'static str) -> Result<String> {
    raw.and_then(|v| format_units(v, Chain::Ethereum.decimals()))
        .ok_or_else(|| LedgerError::malformed(txid, field))
}

/// Extract every in-window transfer touching `history.address`.
pub fn extract_account_transfers(
    history: &AddressHistory,
    window: &ReportWindow,
) -> Result<AccountReport> {
    let address = history.address.as_str();
    let mut transfers = Vec::new();

    for tx in &history.transactions {
        let block_time = tx
            .block_time
            .ok_or_else(|| LedgerError::malformed(&tx.txid, "blockTime"))?;
        if !window.contains(block_time) {
            continue;
        }
        extract_one(tx, address, block_time, window, &mut transfers)?;
    }

    debug!(address, rows = transfers.len(), "account transfers extracted");

    Ok(AccountReport {
        address: history.address.clone(),
        window: window.clone(),
        transfers,
    })
}

fn extract_one(
    tx: &Transaction,
    address: &str,
    block_time: i64,
    window: &ReportWindow,
    out: &mut Vec<AccountTransfer>,
) -> Result<()> {
    let txid = tx.txid.as_str();
    let vin = tx.vin.as_ref().ok_or_else(|| LedgerError::malformed(txid, "vin"))?;
    let vout = tx.vout.as_ref().ok_or_else(|| LedgerError::malformed(txid, "vout"))?;
    let local = local_stamp(block_time, window.timezone)
        .ok_or_else(|| LedgerError::malformed(txid, "blockTime"))?;

    let ctx = TxContext {
        txid,
        block_height: tx.block_height,
        status: if tx.confirmations > 0 {
            TransferStatus::Confirmed
        } else {
            TransferStatus::Pending
        },
        fee: ether(txid, tx.fees.as_deref(), "fees")?,
        method: tx
            .ethereum_specific
            .as_ref()
            .and_then(|e| e.parsed_data.as_ref())
            .map(|p| p.label())
            .unwrap_or_default(),
        local,
    };

    let involves = |addresses: &Option<Vec<String>>| {
        addresses
            .as_deref()
            .is_some_and(|list| list.iter().any(|a| same_address(a, address)))
    };

    // Native value sent: one row per non-zero output
    if vin.iter().any(|input| involves(&input.addresses)) {
        for output in vout {
            let raw = output
                .value
                .as_deref()
                .ok_or_else(|| LedgerError::malformed(txid, "vout.value"))?;
            if raw == "0" {
                continue;
            }
            out.push(ctx.row(
                TransferKind::Normal,
                "ETH".to_string(),
                address.to_string(),
                output.joined_addresses(),
                Direction::Outgoing,
                ether(txid, Some(raw), "vout.value")?,
                None,
                None,
            ));
        }
    }

    // Native value received
    for output in vout.iter().filter(|o| involves(&o.addresses)) {
        let senders: Vec<String> = vin.iter().map(|i| i.joined_addresses()).collect();
        out.push(ctx.row(
            TransferKind::Normal,
            "ETH".to_string(),
            senders.join(", "),
            address.to_string(),
            Direction::Incoming,
            ether(txid, output.value.as_deref(), "vout.value")?,
            None,
            None,
        ));
    }

    let internal = tx
        .ethereum_specific
        .as_ref()
        .and_then(|e| e.internal_transfers.as_deref())
        .unwrap_or_default();
    for transfer in internal {
        let from = transfer.from.as_deref().unwrap_or_default();
        let to = transfer.to.as_deref().unwrap_or_default();
        let outgoing = same_address(from, address);
        if !outgoing && !same_address(to, address) {
            continue;
        }
        out.push(ctx.row(
            TransferKind::Internal,
            "ETH".to_string(),
            from.to_string(),
            to.to_string(),
            if outgoing {
                Direction::Outgoing
            } else {
                Direction::Incoming
            },
            ether(txid, transfer.value.as_deref(), "internalTransfers.value")?,
            None,
            None,
        ));
    }

    for token in tx.token_transfers.as_deref().unwrap_or_default() {
        if let Some(row) = token_row(&ctx, token, address)? {
            out.push(row);
        }
    }

    Ok(())
}

fn token_row(
    ctx: &TxContext<'_>,
    token: &TokenTransfer,
    address: &str,
) -> Result<Option<AccountTransfer>> {
    let txid = ctx.txid;
    let from = token
        .from
        .as_deref()
        .ok_or_else(|| LedgerError::malformed(txid, "tokenTransfers.from"))?;
    let to = token
        .to
        .as_deref()
        .ok_or_else(|| LedgerError::malformed(txid, "tokenTransfers.to"))?;
    let outgoing = same_address(from, address);
    if !outgoing && !same_address(to, address) {
        return Ok(None);
    }

    let kind_raw = token
        .kind
        .as_deref()
        .ok_or_else(|| LedgerError::malformed(txid, "tokenTransfers.type"))?;
    let Some(kind) = TransferKind::from_token_type(kind_raw) else {
        debug!(txid, kind = kind_raw, "skipping unsupported token transfer");
        return Ok(None);
    };

    let raw_value = || {
        token
            .value
            .as_deref()
            .ok_or_else(|| LedgerError::malformed(txid, "tokenTransfers.value"))
    };

    let (value, token_id) = match kind {
        TransferKind::Erc20 => {
            let decimals = token
                .decimals
                .ok_or_else(|| LedgerError::malformed(txid, "tokenTransfers.decimals"))?;
            let value = format_units(raw_value()?, decimals)
                .ok_or_else(|| LedgerError::malformed(txid, "tokenTransfers.value"))?;
            (value, None)
        }
        TransferKind::Erc721 => ("1".to_string(), Some(raw_value()?.to_string())),
        TransferKind::Erc1155 => match token.multi_token_values.as_deref() {
            Some(values) if !values.is_empty() => {
                let ids: Vec<&str> = values.iter().map(|v| v.id.as_str()).collect();
                let amounts: Vec<&str> = values.iter().map(|v| v.value.as_str()).collect();
                (amounts.join(", "), Some(ids.join(", ")))
            }
            _ => ("N/A".to_string(), None),
        },
        TransferKind::Normal | TransferKind::Internal => return Ok(None),
    };

    let asset = match (token.name.as_deref(), token.symbol.as_deref()) {
        (Some(name), Some(symbol)) if !name.is_empty() && !symbol.is_empty() => {
            format!("{name} ({symbol})")
        }
        _ => "N/A".to_string(),
    };

    Ok(Some(ctx.row(
        kind,
        asset,
        from.to_string(),
        to.to_string(),
        if outgoing {
            Direction::Outgoing
        } else {
            Direction::Incoming
        },
        value,
        token_id,
        token.contract.clone(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        EthereumSpecific, InternalTransfer, MultiTokenValue, ParsedData, TxInput, TxOutput,
    };
    use crate::time::parse_timezone;
    use chrono::NaiveDate;

    const ME: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";
    const OTHER: &str = "0x1111111111111111111111111111111111111111";
    const JAN_10: i64 = 1_704_844_800;

    fn window() -> ReportWindow {
        let d = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        ReportWindow::new(d, d, parse_timezone("UTC").unwrap()).unwrap()
    }

    fn eth_tx(from: &str, to: &str, value: &str) -> Transaction {
        Transaction {
            txid: "0xabc".to_string(),
            block_height: Some(19_000_000),
            block_time: Some(JAN_10 + 3600),
            confirmations: 10,
            vin: Some(vec![TxInput {
                addresses: Some(vec![from.to_string()]),
                value: None,
            }]),
            vout: Some(vec![TxOutput {
                addresses: Some(vec![to.to_string()]),
                value: Some(value.to_string()),
            }]),
            fees: Some("21000000000000".to_string()),
            token_transfers: None,
            ethereum_specific: None,
        }
    }

    fn history(transactions: Vec<Transaction>) -> AddressHistory {
        AddressHistory {
            address: ME.to_string(),
            balance: "0".to_string(),
            page: None,
            total_pages: None,
            txs: None,
            transactions,
        }
    }

    fn token(kind: &str, from: &str, to: &str, value: &str) -> TokenTransfer {
        TokenTransfer {
            kind: Some(kind.to_string()),
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            contract: Some("0xtoken".to_string()),
            name: Some("USD Coin".to_string()),
            symbol: Some("USDC".to_string()),
            decimals: Some(6),
            value: Some(value.to_string()),
            multi_token_values: None,
        }
    }

    #[test]
    fn test_normal_outgoing_and_fee() {
        let h = history(vec![eth_tx(ME, OTHER, "1500000000000000000")]);
        let report = extract_account_transfers(&h, &window()).unwrap();
        assert_eq!(report.transfers.len(), 1);
        let row = &report.transfers[0];
        assert_eq!(row.direction, Direction::Outgoing);
        assert_eq!(row.kind, TransferKind::Normal);
        assert_eq!(row.value, "1.5");
        assert_eq!(row.fee, "0.000021");
        assert_eq!(row.receiver, OTHER);
        assert_eq!(row.status, TransferStatus::Confirmed);
    }

    #[test]
    fn test_zero_value_contract_call_has_no_native_row() {
        let mut tx = eth_tx(ME, "0xtoken", "0");
        tx.token_transfers = Some(vec![token("ERC20", ME, OTHER, "2500000")]);
        tx.ethereum_specific = Some(EthereumSpecific {
            internal_transfers: None,
            parsed_data: Some(ParsedData {
                method_id: Some("0xa9059cbb".to_string()),
                name: Some("transfer".to_string()),
            }),
        });

        let report = extract_account_transfers(&history(vec![tx]), &window()).unwrap();
        assert_eq!(report.transfers.len(), 1);
        let row = &report.transfers[0];
        assert_eq!(row.kind, TransferKind::Erc20);
        assert_eq!(row.value, "2.5");
        assert_eq!(row.asset, "USD Coin (USDC)");
        assert_eq!(row.token_id, None);
        assert_eq!(row.method, "transfer (0xa9059cbb)");
    }

    #[test]
    fn test_incoming_matches_lowercase_address() {
        let lower = ME.to_lowercase();
        let report = extract_account_transfers(
            &history(vec![eth_tx(OTHER, &lower, "1000000000000000000")]),
            &window(),
        )
        .unwrap();
        assert_eq!(report.transfers.len(), 1);
        assert_eq!(report.transfers[0].direction, Direction::Incoming);
        assert_eq!(report.transfers[0].sender, OTHER);
        assert_eq!(report.transfers[0].value, "1");
    }

    #[test]
    fn test_internal_transfers() {
        let mut tx = eth_tx(OTHER, "0xcontract", "0");
        tx.ethereum_specific = Some(EthereumSpecific {
            internal_transfers: Some(vec![
                InternalTransfer {
                    from: Some("0xcontract".to_string()),
                    to: Some(ME.to_string()),
                    value: Some("250000000000000000".to_string()),
                },
                InternalTransfer {
                    from: Some("0xcontract".to_string()),
                    to: Some(OTHER.to_string()),
                    value: Some("1".to_string()),
                },
            ]),
            parsed_data: None,
        });

        let report = extract_account_transfers(&history(vec![tx]), &window()).unwrap();
        assert_eq!(report.transfers.len(), 1);
        assert_eq!(report.transfers[0].kind, TransferKind::Internal);
        assert_eq!(report.transfers[0].value, "0.25");
        assert_eq!(report.transfers[0].method, "");
    }

    #[test]
    fn test_nft_transfers() {
        let mut tx = eth_tx(OTHER, "0xnft", "0");
        let mut erc1155 = token("ERC1155", OTHER, ME, "");
        erc1155.multi_token_values = Some(vec![
            MultiTokenValue {
                id: "7".into(),
                value: "2".into(),
            },
            MultiTokenValue {
                id: "9".into(),
                value: "1".into(),
            },
        ]);
        let mut bare_1155 = token("ERC1155", OTHER, ME, "");
        bare_1155.name = None;
        tx.token_transfers = Some(vec![token("ERC721", OTHER, ME, "1234"), erc1155, bare_1155]);

        let report = extract_account_transfers(&history(vec![tx]), &window()).unwrap();
        let rows = &report.transfers;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].value, "1");
        assert_eq!(rows[0].token_id.as_deref(), Some("1234"));
        assert_eq!(rows[1].value, "2, 1");
        assert_eq!(rows[1].token_id.as_deref(), Some("7, 9"));
        assert_eq!(rows[2].value, "N/A");
        assert_eq!(rows[2].asset, "N/A");
    }

    #[test]
    fn test_unknown_token_type_skipped() {
        let mut tx = eth_tx(OTHER, "0xx", "0");
        tx.token_transfers = Some(vec![token("BEP20", OTHER, ME, "5")]);
        let report = extract_account_transfers(&history(vec![tx]), &window()).unwrap();
        assert!(report.transfers.is_empty());
    }

    #[test]
    fn test_window_filter() {
        let mut old = eth_tx(ME, OTHER, "1");
        old.block_time = Some(JAN_10 - 1);
        let report = extract_account_transfers(&history(vec![old]), &window()).unwrap();
        assert!(report.transfers.is_empty());
    }

    #[test]
    fn test_missing_token_field_is_malformed() {
        let mut tx = eth_tx(OTHER, "0xx", "0");
        let mut broken = token("ERC20", OTHER, ME, "5");
        broken.decimals = None;
        tx.token_transfers = Some(vec![broken]);

        let err = extract_account_transfers(&history(vec![tx]), &window()).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::MalformedTransaction { field: "tokenTransfers.decimals", .. }
        ));
    }

    #[test]
    fn test_pending_status() {
        let mut tx = eth_tx(ME, OTHER, "1");
        tx.confirmations = 0;
        let report = extract_account_transfers(&history(vec![tx]), &window()).unwrap();
        assert_eq!(report.transfers[0].status, TransferStatus::Pending);
    }
}
