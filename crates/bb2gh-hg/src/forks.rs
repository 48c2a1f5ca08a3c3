//! Importing open-pull-request commits from forks.
//!
//! Pull requests opened from forks reference commits that exist only in
//! the fork. They are pulled into the main repository before conversion,
//! so the recreated pull requests have real commits to point at.

use tracing::{info, warn};

use bb2gh_types::record::PullRequestRecord;

use crate::error::{HgError, Result};
use crate::hg::HgRepo;

/// Base URL fork clones are pulled from.
pub const BITBUCKET_SSH_BASE: &str = "ssh://hg@bitbucket.org/";

/// A commit referenced by an open pull request, with the repository it
/// lives in. The hash may be a short form, as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkCommit {
    pub repository: String,
    pub hash: String,
}

/// Source commits of all open pull requests that still carry both a
/// source repository and a source commit. Bitbucket prunes either field
/// once the fork or the commit is gone, which drops the pull request
/// here.
pub fn open_fork_commits(pulls: &[PullRequestRecord]) -> Vec<ForkCommit> {
    let mut commits = Vec::new();
    for pull in pulls.iter().filter(|pull| pull.is_open()) {
        match (&pull.source.repository, &pull.source.commit) {
            (Some(repository), Some(commit)) => commits.push(ForkCommit {
                repository: repository.full_name.clone(),
                hash: commit.hash.clone(),
            }),
            _ => warn!(
                "Pull request #{} no longer has a source repository and commit, skipping it",
                pull.id
            ),
        }
    }
    commits
}

/// Pull every fork commit into the repository. A failing pull is reported
/// and skipped, as the commit may have been garbage collected on
/// Bitbucket since the pull request was opened. Returns the number of
/// commits pulled.
pub fn import_fork_commits(repo: &HgRepo, commits: &[ForkCommit]) -> Result<usize> {
    let mut imported = 0;
    for commit in commits {
        let url = format!("{BITBUCKET_SSH_BASE}{}", commit.repository);
        info!("Pulling {} from '{}'", commit.hash, commit.repository);
        match repo.pull_rev(&commit.hash, &url) {
            Ok(()) => imported += 1,
            Err(HgError::CommandFailed { stderr, .. }) => warn!(
                "Commit {} of fork '{}' could not be pulled, skipping it: {}",
                commit.hash,
                commit.repository,
                stderr.trim()
            ),
            Err(err) => return Err(err),
        }
    }
    Ok(imported)
}
