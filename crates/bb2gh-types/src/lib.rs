//! Shared types for the bb2gh migration tools.
//!
//! This crate holds the pieces every other bb2gh crate agrees on: the YAML
//! migration configuration, the records exported from Bitbucket, and the
//! payloads uploaded to GitHub.

pub mod config;
pub mod error;
pub mod payload;
pub mod record;

pub use config::{MigrationConfig, RepositoryMapping};
pub use error::{ConfigError, Result};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
