use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod report_cmd;
mod tool_cmd;

use report_cmd::ReportCommand;
use tool_cmd::ToolArgs;

#[derive(Parser, Debug)]
#[command(
    name = "txledger",
    version,
    about = "Transaction ledger reports from blockchain indexers"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a CSV report for an address over a date range
    Report {
        #[command(subcommand)]
        command: ReportCommand,
    },

    /// Raw EVM lookups against the configured QuickNode endpoint
    Tool {
        #[command(subcommand)]
        command: ToolArgs,
    },

    /// Manage ~/.txledger/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config file if none exists
    Init,

    /// Print the effective config (file plus environment overrides)
    Show,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Report { command } => {
            let cfg = config::load_config()?;
            report_cmd::run(&cfg, command).await?;
        }

        Command::Tool { command } => {
            let cfg = config::load_config()?;
            tool_cmd::run(&cfg, command).await?;
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                let cfg = config::load_config()?.redacted();
                print!("{}", toml::to_string_pretty(&cfg)?);
            }
        },
    }

    Ok(())
}
