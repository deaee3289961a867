use anyhow::{Context, Result, anyhow};
use clap::Subcommand;

use txledger_ingest::{
    AddressInput, ChainInput, ChainRegistry, EvmChain, LogFilter, LogsInput, ToolCommand, dispatch,
};

use crate::config::Config;

fn parse_chain(s: &str) -> Result<EvmChain, String> {
    s.parse::<EvmChain>().map_err(|e| e.to_string())
}

#[derive(Subcommand, Debug)]
pub enum ToolArgs {
    /// Native balance of an address (eth_getBalance)
    Balance {
        #[arg(long)]
        address: String,
        #[arg(long, value_parser = parse_chain, default_value = "ethereum")]
        chain: EvmChain,
    },

    /// Deployed bytecode at an address (eth_getCode)
    Code {
        #[arg(long)]
        address: String,
        #[arg(long, value_parser = parse_chain, default_value = "ethereum")]
        chain: EvmChain,
    },

    /// Current gas price (eth_gasPrice)
    GasPrice {
        #[arg(long, value_parser = parse_chain, default_value = "ethereum")]
        chain: EvmChain,
    },

    /// Event logs matching a filter (eth_getLogs)
    Logs {
        #[arg(long, value_parser = parse_chain, default_value = "ethereum")]
        chain: EvmChain,
        /// Emitting contract
        #[arg(long)]
        address: Option<String>,
        /// Block number or tag, e.g. 0x12a05f2 or latest
        #[arg(long)]
        from_block: Option<String>,
        #[arg(long)]
        to_block: Option<String>,
        /// Topic filters in position order
        #[arg(long = "topic")]
        topics: Vec<String>,
    },
}

impl From<ToolArgs> for ToolCommand {
    fn from(args: ToolArgs) -> Self {
        match args {
            ToolArgs::Balance { address, chain } => {
                ToolCommand::GetBalance(AddressInput { address, chain })
            }
            ToolArgs::Code { address, chain } => {
                ToolCommand::GetCode(AddressInput { address, chain })
            }
            ToolArgs::GasPrice { chain } => ToolCommand::GasPrice(ChainInput { chain }),
            ToolArgs::Logs {
                chain,
                address,
                from_block,
                to_block,
                topics,
            } => ToolCommand::GetLogs(LogsInput {
                chain,
                filter: LogFilter {
                    address,
                    from_block,
                    to_block,
                    topics: topics.into_iter().map(Some).collect(),
                },
            }),
        }
    }
}

pub async fn run(cfg: &Config, args: ToolArgs) -> Result<()> {
    let (endpoint_name, token) = cfg.quicknode_credentials()?;
    let registry = ChainRegistry::from_quicknode(endpoint_name, token, cfg.timeout())?;

    let command = ToolCommand::from(args);
    let name = command.name();
    let output = dispatch(&registry, command)
        .await
        .map_err(|e| anyhow!("{name} failed: {e:#}"))?;

    let json = serde_json::to_string_pretty(&output).context("serialize tool output")?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logs_args_to_command() {
        let cmd = ToolCommand::from(ToolArgs::Logs {
            chain: EvmChain::Base,
            address: Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string()),
            from_block: Some("latest".to_string()),
            to_block: None,
            topics: vec!["0xddf252ad".to_string()],
        });
        let v = serde_json::to_value(&cmd).unwrap();
        assert_eq!(v["tool"], "eth_getLogs");
        assert_eq!(v["input"]["chain"], serde_json::to_value(EvmChain::Base).unwrap());
        assert_eq!(v["input"]["fromBlock"], "latest");
        assert!(v["input"].get("toBlock").is_none());
        assert_eq!(v["input"]["topics"][0], "0xddf252ad");
    }

    #[test]
    fn test_parse_chain_reports_supported() {
        assert_eq!(parse_chain("BSC").unwrap(), EvmChain::Bsc);
        let err = parse_chain("solana").unwrap_err();
        assert!(err.contains("ethereum"));
    }
}
