//! Configuration file parser for the indexer.
//!
//! The config file is optional: a missing file yields `Config::default()`,
//! which reproduces the stock behaviour (200 URLs per account, up to 5
//! accounts, 3 attempts with a 2 second pause on dropped connections).
//! Unknown keys are accepted but logged, since they are usually typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::publish::RetryPolicy;

/// Indexing API publish endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://indexing.googleapis.com/v3/urlNotifications:publish";

/// OAuth scope granting access to the indexing API.
pub const INDEXING_SCOPE: &str = "https://www.googleapis.com/auth/indexing";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Publish endpoint URL.
    pub endpoint: String,

    /// OAuth scope requested for each account's bearer token.
    pub scope: String,

    /// Number of URLs assigned to each account (its daily quota).
    pub pool_size: usize,

    /// Upper bound accepted at the pool-count prompt.
    pub max_pools: usize,

    /// Total attempts per URL when the connection drops.
    pub max_attempts: u32,

    /// Pause between attempts after a dropped connection, in seconds.
    pub retry_delay_secs: u64,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Directory holding `account1.json`, `account2.json`, ...
    pub credentials_dir: PathBuf,

    /// Sitemaps to read URLs from, in order.
    pub sitemaps: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            scope: INDEXING_SCOPE.to_string(),
            pool_size: 200,
            max_pools: 5,
            max_attempts: 3,
            retry_delay_secs: 2,
            request_timeout_secs: 30,
            credentials_dir: PathBuf::from("."),
            sitemaps: Vec::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "endpoint",
        "scope",
        "pool_size",
        "max_pools",
        "max_attempts",
        "retry_delay_secs",
        "request_timeout_secs",
        "credentials_dir",
        "sitemaps",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Zero `pool_size`, `max_pools` or `max_attempts` → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            pool_size = config.pool_size,
            sitemaps = config.sitemaps.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::Invalid("pool_size must be at least 1".into()));
        }
        if self.max_pools == 0 {
            return Err(ConfigError::Invalid("max_pools must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Retry policy for the publish sender.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_secs(self.retry_delay_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================
