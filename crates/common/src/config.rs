//! Ledger configuration
//!
//! Loaded from a TOML file, then overridden by `BALLOT_*` environment
//! variables, then validated.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "BALLOT_";

/// Smallest option count any proposal may have
pub const MIN_OPTIONS: u32 = 2;

/// Deployment policy for the ballot ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Upper bound on a proposal's option count (inclusive)
    #[serde(default = "default_max_options")]
    pub max_options: u32,

    /// Capacity of the live event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Directory holding the persisted ledger snapshot
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether file writes are fsynced before returning
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,
}

fn default_max_options() -> u32 {
    10
}

fn default_event_capacity() -> usize {
    1024
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./ballot-data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sync_writes() -> bool {
    true
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_options: default_max_options(),
            event_capacity: default_event_capacity(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            sync_writes: default_sync_writes(),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileAccess(path.display().to_string(), e))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration as TOML
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::FileAccess(path.display().to_string(), e))
    }

    /// Apply `BALLOT_*` environment overrides and re-validate
    pub fn apply_env(self) -> ConfigResult<Self> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup, keyed by full variable name
    pub fn apply_overrides<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            let key = format!("{}{}", ENV_PREFIX, name);
            lookup(&key).map(|value| (key, value))
        };

        if let Some((key, value)) = var("MAX_OPTIONS") {
            self.max_options = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnvVar(key, value))?;
        }

        if let Some((key, value)) = var("EVENT_CAPACITY") {
            self.event_capacity = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnvVar(key, value))?;
        }

        if let Some((_, value)) = var("DATA_DIR") {
            self.data_dir = PathBuf::from(value);
        }

        if let Some((_, value)) = var("LOG_LEVEL") {
            self.log_level = value.trim().to_lowercase();
        }

        if let Some((key, value)) = var("SYNC_WRITES") {
            self.sync_writes = match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(ConfigError::InvalidEnvVar(key, value)),
            };
        }

        self.validate()?;
        Ok(self)
    }

    /// Check every value is within its allowed range
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_options < MIN_OPTIONS {
            return Err(ConfigError::invalid(format!(
                "max_options must be at least {}, got {}",
                MIN_OPTIONS, self.max_options
            )));
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::invalid("event_capacity must be greater than zero"));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::invalid(format!(
                    "Invalid log level: {}",
                    self.log_level
                )))
            }
        }

        Ok(())
    }
}
