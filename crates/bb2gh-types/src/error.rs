//! Error types for configuration handling.

use thiserror::Error;

/// Errors raised while loading or validating a migration configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Repository '{0}' is not configured for migration")]
    UnknownRepository(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
