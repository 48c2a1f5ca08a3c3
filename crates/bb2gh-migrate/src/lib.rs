//! # Discussion migration
//!
//! This crate moves the discussion side of a Bitbucket repository (issues,
//! their comments, change history, attachments and pull requests) to a
//! GitHub repository, preserving issue numbers and rewriting every
//! Bitbucket-specific reference on the way.
//!
//! ## Features
//!
//! - **Issue import**: Bulk upload through GitHub's issue-import API, with
//!   original creation dates, falling back to regular issue creation
//! - **Pull requests**: Closed ones archived as labelled issues, open ones
//!   recreated as real pull requests on the converted branches
//! - **Reference rewriting**: Issue/pull links, commit hashes, user
//!   mentions and Bitbucket markup become their GitHub counterparts
//! - **Attachments**: Mirrored into one gist per issue and linked from the
//!   issue body
//! - **Idempotent runs**: A rerun updates what already exists instead of
//!   duplicating it
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use bb2gh_migrate::{
//!     load_commit_index, BitbucketExport, DiscussionMigrator, GithubImport,
//!     MigrationOptions,
//! };
//! use bb2gh_types::MigrationConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(MigrationConfig::load("migration.yml".as_ref())?);
//!     let index = Arc::new(load_commit_index(&config)?);
//!
//!     let bexport = BitbucketExport::new("acme/widget")?
//!         .with_credentials("user", "app-password");
//!     let gimport = GithubImport::new("github-token", "acme-org/widget")?;
//!
//!     let migrator = DiscussionMigrator::new(
//!         bexport,
//!         gimport,
//!         config,
//!         index,
//!         MigrationOptions::default(),
//!     )?;
//!     let report = migrator.migrate().await?;
//!     println!("{report:?}");
//!     Ok(())
//! }
//! ```

pub mod assemble;
pub mod bitbucket;
pub mod check;
pub mod error;
pub mod github;
pub mod mapping;
pub mod progress;
pub mod relink;
pub mod rewrite;
pub mod run;
pub mod time;

// Re-export main types
pub use assemble::ContentAssembler;
pub use bitbucket::BitbucketExport;
pub use check::{check_migration, CheckReport};
pub use error::{MigrateError, Result};
pub use github::GithubImport;
pub use mapping::IdentityMapper;
pub use progress::{
    ConsoleProgressReporter, MigrationPhase, MigrationProgress, ProgressCallback,
};
pub use relink::{Relinker, RelinkReport};
pub use rewrite::ReferenceRewriter;
pub use run::{
    load_commit_index, DiscussionMigrator, MigrationOptions, MigrationReport,
    PullRecreationReport,
};

/// Version of the migration tools.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
