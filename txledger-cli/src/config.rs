use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use txledger_core::Chain;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub blockbook: BlockbookSection,
    #[serde(default)]
    pub quicknode: QuicknodeSection,
    #[serde(default)]
    pub report: ReportSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockbookSection {
    /// Blockbook JSON-RPC URL for Bitcoin (bb_getaddress, bb_gettickers)
    pub bitcoin_endpoint: String,
    /// Blockbook JSON-RPC URL for Ethereum (bb_getAddress)
    pub ethereum_endpoint: String,
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for BlockbookSection {
    fn default() -> Self {
        Self {
            bitcoin_endpoint: String::new(),
            ethereum_endpoint: String::new(),
            page_size: 1000,
            timeout_secs: 30,
        }
    }
}

/// Credentials for the EVM tool registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct QuicknodeSection {
    pub endpoint_name: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSection {
    /// IANA zone used when --timezone is not given
    pub timezone: String,
    pub price_concurrency: usize,
    /// Fail when the history does not reconcile with the current balance
    pub strict: bool,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            price_concurrency: 4,
            strict: false,
        }
    }
}

impl Config {
    /// Overlay values from the environment. `lookup` is `std::env::var` in
    /// the binary; empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("TXLEDGER_BTC_ENDPOINT") {
            self.blockbook.bitcoin_endpoint = v;
        }
        if let Some(v) = get("TXLEDGER_ETH_ENDPOINT") {
            self.blockbook.ethereum_endpoint = v;
        }
        if let Some(v) = get("QN_ENDPOINT_NAME") {
            self.quicknode.endpoint_name = v;
        }
        if let Some(v) = get("QN_TOKEN_ID") {
            self.quicknode.token = v;
        }
    }

    pub fn blockbook_endpoint(&self, chain: Chain) -> Result<&str> {
        let (endpoint, key, var) = match chain {
            Chain::Bitcoin => (
                &self.blockbook.bitcoin_endpoint,
                "bitcoin_endpoint",
                "TXLEDGER_BTC_ENDPOINT",
            ),
            Chain::Ethereum => (
                &self.blockbook.ethereum_endpoint,
                "ethereum_endpoint",
                "TXLEDGER_ETH_ENDPOINT",
            ),
        };
        if endpoint.trim().is_empty() {
            bail!("no Blockbook endpoint for {chain}: set [blockbook].{key} or {var}");
        }
        Ok(endpoint)
    }

    pub fn quicknode_credentials(&self) -> Result<(&str, &str)> {
        let q = &self.quicknode;
        if q.endpoint_name.trim().is_empty() || q.token.trim().is_empty() {
            bail!(
                "QuickNode credentials missing: set [quicknode] endpoint_name/token or QN_ENDPOINT_NAME/QN_TOKEN_ID"
            );
        }
        Ok((&q.endpoint_name, &q.token))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.blockbook.timeout_secs.max(1))
    }

    /// Copy safe to print: secrets keep only their last four characters.
    pub fn redacted(&self) -> Config {
        let mut cfg = self.clone();
        cfg.quicknode.token = mask_secret(&self.quicknode.token);
        cfg
    }
}

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{tail}", "*".repeat(chars.len() - 4))
}

/// `~/.txledger`, created on first use.
fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    let dir = PathBuf::from(home).join(".txledger");
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    let mut cfg = if p.exists() {
        let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
        toml::from_str(&s).context("parse config.toml")?
    } else {
        Config::default()
    };
    cfg.apply_overrides(|key| std::env::var(key).ok());
    Ok(cfg)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}
