//! Error types for commit map handling.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or storing commit maps.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("Failed to read commit map {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write commit map {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed line {line} in commit map {path:?}: '{text}'")]
    MalformedLine {
        path: PathBuf,
        line: usize,
        text: String,
    },
}

pub type Result<T> = std::result::Result<T, MapError>;
