//! # Repository conversion
//!
//! This crate turns a Bitbucket Mercurial repository into a Git repository
//! ready for GitHub, by shelling out to `hg`, `git` and `hg-fast-export.sh`.
//!
//! ## Features
//!
//! - **Fork import**: Commits referenced by open pull requests are pulled
//!   from their forks into the main clone before conversion
//! - **Branch surgery**: Multi-headed branches get a uniquely named branch
//!   per head, fork heads get `fork/branch` names, and the single `default`
//!   head becomes `master`
//! - **Commit map**: The `hg -> git` hash pairs recorded by fast-export in
//!   git notes are extracted into a map file for reference rewriting
//! - **Dry run**: Every history-changing Mercurial command can be printed
//!   instead of executed
//!
//! ## Example
//!
//! ```rust,ignore
//! use bb2gh_hg::{convert_repository, ConvertOptions};
//! use bb2gh_types::MigrationConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = MigrationConfig::load("migration.yml".as_ref())?;
//!     let mapping = &config.repositories[0];
//!     let options = ConvertOptions {
//!         work_dir: "work".into(),
//!         fast_export_script: "fast-export/hg-fast-export.sh".into(),
//!         dry_run: false,
//!         push: true,
//!     };
//!     let outcome = convert_repository(mapping, &[], &options)?;
//!     println!("commit map at {}", outcome.commit_map.display());
//!     Ok(())
//! }
//! ```

pub mod branches;
pub mod error;
pub mod forks;
pub mod git;
pub mod hg;
pub mod notes;
pub mod pipeline;
mod process;

// Re-export main types
pub use branches::{
    create_fork_branches, create_master_branch, unique_branch_per_head,
};
pub use error::{HgError, Result};
pub use forks::{
    import_fork_commits, open_fork_commits, ForkCommit, BITBUCKET_SSH_BASE,
};
pub use git::{GitRepo, HG_NOTES_REF};
pub use hg::{BranchHead, HgRepo};
pub use notes::{extract_commit_map, store_commit_map};
pub use pipeline::{
    bitbucket_repo_url, convert_repository, github_repo_url, ConvertOptions,
    ConvertOutcome,
};

/// Version of the conversion tools.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
