//! Commit hash maps for the bb2gh migration tools.
//!
//! Converting a Mercurial repository to Git gives every commit a new hash.
//! This crate stores the mapping produced by the conversion and resolves
//! hash prefixes found in migrated text, across all repositories of a
//! migration wave at once.

pub mod error;
pub mod index;
pub mod map;

pub use error::{MapError, Result};
pub use index::{CommitMapIndex, PrefixHit};
pub use map::{CommitMap, PrefixLookup, MIN_PREFIX_LEN};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
