//! Daemon configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! database_path = "/var/lib/fatd/fatd.db"
//!
//! [replay]
//! poll_interval_ms = 5000
//! max_batch_entries = 500
//!
//! [[chain]]
//! token_id = "test"
//! issuer_chain_id = "8888888888888888888888888888888888888888888888888888888888888888"
//! issuer_address = "65d0b6e430b31a73f32803e694be39977a41bae9e13316b58bbe5b64a95de39e"
//! start_height = 160000
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use fatd_core::{token_chain_id, Address, ChainId};
use fatd_replay::{ChainSpec, ReplayConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or checking a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Validation(String),
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub replay: ReplaySettings,

    /// Token chains to track.
    #[serde(default, rename = "chain")]
    pub chains: Vec<ChainConfig>,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("fatd.db")
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            replay: ReplaySettings::default(),
            chains: Vec::new(),
        }
    }
}

impl DaemonConfig {
    /// Parse and check a configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and check a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Like [`DaemonConfig::from_file`], naming the file in the error.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        Self::from_file(path).with_context(|| format!("loading config from {}", path.display()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.replay.validate()?;

        let mut seen = BTreeSet::new();
        for chain in &self.chains {
            if chain.token_id.is_empty() {
                return Err(ConfigError::Validation("empty token_id".into()));
            }
            let chain_id = chain.chain_id();
            if !seen.insert(chain_id) {
                return Err(ConfigError::Validation(format!(
                    "token {:?} configured twice (chain {})",
                    chain.token_id, chain_id
                )));
            }
        }
        Ok(())
    }

    /// Replay specs for every configured chain.
    pub fn chain_specs(&self) -> Vec<ChainSpec> {
        self.chains.iter().map(ChainConfig::spec).collect()
    }
}

/// Replay tuning, in TOML-friendly units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplaySettings {
    pub poll_interval_ms: u64,
    pub max_batch_entries: usize,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self::from(&ReplayConfig::default())
    }
}

impl From<&ReplayConfig> for ReplaySettings {
    fn from(config: &ReplayConfig) -> Self {
        Self {
            poll_interval_ms: config.poll_interval.as_millis() as u64,
            max_batch_entries: config.max_batch_entries,
            max_retries: config.max_retries,
            retry_base_delay_ms: config.retry_base_delay.as_millis() as u64,
            retry_max_delay_ms: config.retry_max_delay.as_millis() as u64,
        }
    }
}

impl ReplaySettings {
    pub fn to_replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_batch_entries: self.max_batch_entries,
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            retry_max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_entries == 0 {
            return Err(ConfigError::Validation(
                "replay.max_batch_entries must be at least 1".into(),
            ));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(ConfigError::Validation(
                "replay.retry_base_delay_ms exceeds replay.retry_max_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

/// One token chain to track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    pub token_id: String,

    /// Identity chain of the issuer; together with `token_id` it names the
    /// token chain.
    pub issuer_chain_id: ChainId,

    /// Address whose key signs the issuance and coinbase transactions.
    pub issuer_address: Address,

    /// First height to read when the chain has no cursor yet.
    #[serde(default)]
    pub start_height: u64,
}

impl ChainConfig {
    pub fn chain_id(&self) -> ChainId {
        token_chain_id(&self.token_id, &self.issuer_chain_id)
    }

    pub fn spec(&self) -> ChainSpec {
        ChainSpec::new(self.chain_id(), self.issuer_address, self.start_height)
    }
}
