//! Error types for migration operations.

use thiserror::Error;

/// Migration-specific errors.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Failed to authenticate with Bitbucket or GitHub.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Repository not found.
    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    /// The configured issue count disagrees with the issue tracker. Going
    /// on would renumber every migrated pull request.
    #[error(
        "Repository '{repository}' has {actual} issues but the configuration \
         says {configured}"
    )]
    IssueCountMismatch {
        repository: String,
        configured: u64,
        actual: u64,
    },

    /// A timestamp in an exported record could not be parsed.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// The bulk issue import was rejected outright.
    #[error("Issue import failed: {0}")]
    ImportFailed(String),

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] bb2gh_types::ConfigError),

    /// Commit map error.
    #[error("Commit map error: {0}")]
    MapError(#[from] bb2gh_map::MapError),

    /// A reference pattern built from the configuration did not compile.
    #[error("Invalid reference pattern: {0}")]
    PatternError(#[from] regex::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// A request URL could not be assembled.
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
