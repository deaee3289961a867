use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

use txledger_core::{
    Chain, ReconstructOptions, ReportWindow, extract_account_transfers, fetch_full_history,
    parse_timezone, reconstruct, validate_address,
};
use txledger_ingest::BlockbookClient;
use txledger_report::{report_file_name, write_ledger_csv, write_transfers_csv};

use crate::config::Config;

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    /// Bitcoin ledger with running balances and USD values
    Btc(ReportArgs),

    /// Ethereum transfers (native, internal and token)
    Eth(ReportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[arg(long)]
    pub address: String,

    /// First day, YYYY-MM-DD (default: today in the report zone)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day, YYYY-MM-DD (default: today in the report zone)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// IANA zone, e.g. America/New_York (default: from config)
    #[arg(long)]
    pub timezone: Option<String>,

    /// Output path (default: transaction_report_<address>_<start>_<end>.csv)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Fail when the history does not reconcile with the current balance
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

impl ReportArgs {
    pub fn window(&self, default_timezone: &str) -> Result<ReportWindow> {
        let zone = self.timezone.as_deref().unwrap_or(default_timezone);
        let tz = parse_timezone(zone)?;
        let window = match (self.start, self.end) {
            (None, None) => ReportWindow::today(tz)?,
            (start, end) => {
                let today = ReportWindow::today(tz)?.start_date();
                ReportWindow::new(start.unwrap_or(today), end.unwrap_or(today), tz)?
            }
        };
        Ok(window)
    }

    fn out_path(&self, window: &ReportWindow) -> PathBuf {
        self.out.clone().unwrap_or_else(|| {
            PathBuf::from(report_file_name(
                &self.address,
                window.start_date(),
                window.end_date(),
            ))
        })
    }
}

pub async fn run(cfg: &Config, command: ReportCommand) -> Result<()> {
    match command {
        ReportCommand::Btc(args) => run_btc(cfg, &args).await,
        ReportCommand::Eth(args) => run_eth(cfg, &args).await,
    }
}

fn create_out(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

async fn run_btc(cfg: &Config, args: &ReportArgs) -> Result<()> {
    let chain = Chain::Bitcoin;
    validate_address(chain, &args.address)?;
    let window = args.window(&cfg.report.timezone)?;

    let client = BlockbookClient::new(cfg.blockbook_endpoint(chain)?, chain, cfg.timeout())?;
    let history = fetch_full_history(&client, &args.address, cfg.blockbook.page_size)
        .await
        .with_context(|| format!("fetching history for {}", args.address))?;

    let options = ReconstructOptions {
        price_concurrency: cfg.report.price_concurrency,
        require_complete_history: args.strict || cfg.report.strict,
        decimals: chain.decimals(),
    };
    let report = reconstruct(&history, &client, &window, &options)
        .await
        .with_context(|| format!("reconstructing ledger for {}", args.address))?;

    let path = args.out_path(&window);
    write_ledger_csv(&report, chain.symbol(), create_out(&path)?)
        .with_context(|| format!("writing {}", path.display()))?;

    info!(rows = report.transactions.len(), path = %path.display(), "report written");
    println!(
        "Wrote {} transactions to {}",
        report.transactions.len(),
        path.display()
    );
    Ok(())
}

async fn run_eth(cfg: &Config, args: &ReportArgs) -> Result<()> {
    let chain = Chain::Ethereum;
    validate_address(chain, &args.address)?;
    let window = args.window(&cfg.report.timezone)?;

    let client = BlockbookClient::new(cfg.blockbook_endpoint(chain)?, chain, cfg.timeout())?;
    let history = fetch_full_history(&client, &args.address, cfg.blockbook.page_size)
        .await
        .with_context(|| format!("fetching history for {}", args.address))?;

    let report = extract_account_transfers(&history, &window)
        .with_context(|| format!("extracting transfers for {}", args.address))?;

    let path = args.out_path(&window);
    write_transfers_csv(&report, create_out(&path)?)
        .with_context(|| format!("writing {}", path.display()))?;

    info!(rows = report.transfers.len(), path = %path.display(), "report written");
    println!(
        "Wrote {} transfers to {}",
        report.transfers.len(),
        path.display()
    );
    Ok(())
}
