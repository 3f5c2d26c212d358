//! Error types shared across the ballot crates

use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or written
    #[error("Failed to access config file {0}: {1}")]
    FileAccess(String, #[source] std::io::Error),

    /// The configuration text is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// The configuration could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    /// An environment override carried an unusable value
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidEnvVar(String, String),

    /// A value is outside its allowed range
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The global logger could not be installed
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl ConfigError {
    /// Create a new invalid configuration error
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        ConfigError::Invalid(msg.into())
    }
}
