//! Configuration file parser for gleaner.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde, though we log a warning when
//! the file contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::scraper::ScraperConfig;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite database file.
    pub database_path: String,

    /// Max feeds selected per round, and max workers in flight.
    pub concurrency: usize,

    /// Seconds between the start of one round and the start of the next.
    pub interval_seconds: u64,

    /// Minimum seconds since a feed's last fetch before it is due again.
    pub min_feed_age_seconds: u64,

    /// Per-request HTTP timeout in seconds.
    pub fetch_timeout_seconds: u64,

    /// Bound on one feed's whole refresh (fetch + parse + reconcile).
    pub worker_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "gleaner.db".to_string(),
            concurrency: 10,
            interval_seconds: 60,
            min_feed_age_seconds: 300,
            fetch_timeout_seconds: 30,
            worker_timeout_seconds: 45,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
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

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "database_path",
                "concurrency",
                "interval_seconds",
                "min_feed_age_seconds",
                "fetch_timeout_seconds",
                "worker_timeout_seconds",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            concurrency = config.concurrency,
            interval_seconds = config.interval_seconds,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// The scraper-facing view of this configuration.
    pub fn scraper(&self) -> ScraperConfig {
        ScraperConfig {
            concurrency: self.concurrency,
            interval: Duration::from_secs(self.interval_seconds),
            min_feed_age: Duration::from_secs(self.min_feed_age_seconds),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_seconds),
            worker_timeout: Duration::from_secs(self.worker_timeout_seconds),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
