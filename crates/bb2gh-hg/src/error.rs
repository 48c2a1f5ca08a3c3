//! Error types for the conversion pipeline.

use thiserror::Error;

/// Errors raised while driving `hg`, `git` and the fast-export script.
#[derive(Debug, Error)]
pub enum HgError {
    /// A subprocess ran but exited unsuccessfully.
    #[error("'{command}' failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// A subprocess could not be started, or filesystem work around it
    /// failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Reading or writing a commit map failed.
    #[error(transparent)]
    MapError(#[from] bb2gh_map::MapError),
}

pub type Result<T> = std::result::Result<T, HgError>;
