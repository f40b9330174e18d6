//! TOML collection configuration.
//!
//! ```toml
//! instruments = ["KRW-BTC", "KRW-ETH"]
//! bar_count = 30
//! interval = "day"
//! delay_ms = 100
//!
//! [store]
//! db_path = "crypto_data.db"
//! relation = "market_bars"
//! ```
//!
//! Every field is optional; missing ones take the defaults below.

use crate::collector::{CollectOptions, DEFAULT_BAR_COUNT, DEFAULT_DELAY, DEFAULT_INSTRUMENTS};
use crate::store::{validate_relation_name, DEFAULT_DB_PATH, DEFAULT_RELATION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tickerlab_core::domain::{Interval, Ticker};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectConfig {
    pub instruments: Vec<Ticker>,
    pub bar_count: usize,
    pub interval: Interval,
    pub delay_ms: u64,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub relation: String,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            instruments: DEFAULT_INSTRUMENTS.iter().map(|s| s.to_string()).collect(),
            bar_count: DEFAULT_BAR_COUNT,
            interval: Interval::Day,
            delay_ms: DEFAULT_DELAY.as_millis() as u64,
            store: StoreConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            relation: DEFAULT_RELATION.to_string(),
        }
    }
}

impl CollectConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instruments.is_empty() {
            return Err(ConfigError::Invalid("instrument list is empty".into()));
        }
        if let Some(blank) = self.instruments.iter().find(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("blank instrument id {blank:?}")));
        }
        if self.bar_count == 0 {
            return Err(ConfigError::Invalid("bar_count must be at least 1".into()));
        }
        validate_relation_name(&self.store.relation).map_err(ConfigError::Invalid)?;
        Ok(())
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            bar_count: self.bar_count,
            interval: self.interval,
            delay: self.delay(),
        }
    }

    pub fn instrument_refs(&self) -> Vec<&str> {
        self.instruments.iter().map(|s| s.as_str()).collect()
    }
}
