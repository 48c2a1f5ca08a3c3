//! Branch surgery before conversion.
//!
//! `hg-fast-export` refuses unnamed heads: every head must be the tip of a
//! uniquely named branch, and GitHub expects a `master` branch to exist.
//! These fixes add the missing branch names the way a Mercurial user
//! would, as ordinary branch-creation commits.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::forks::ForkCommit;
use crate::hg::{BranchHead, HgRepo};

/// Pick a branch name that does not collide with an existing one by
/// appending `_0`, `_1`, ...
pub fn unique_branch_name(existing: &[String], base: &str) -> String {
    let mut id = 0;
    loop {
        let candidate = format!("{base}_{id}");
        if !existing.iter().any(|name| name == &candidate) {
            return candidate;
        }
        id += 1;
    }
}

/// Branch name under which a fork's commits appear in the main repository.
pub fn fork_branch_name(fork: &str, branch: &str) -> String {
    format!("{fork}/{branch}")
}

/// Create `name` as a real branch whose tip is `rev`.
pub fn create_branch(repo: &HgRepo, rev: &str, name: &str) -> Result<()> {
    repo.update(rev)?;
    repo.branch(name)?;
    repo.commit(&format!("Creates branch {name}"))?;
    Ok(())
}

/// Give every head of a multi-headed branch its own uniquely named branch.
pub fn unique_branch_per_head(repo: &HgRepo) -> Result<()> {
    let mut by_branch: BTreeMap<String, Vec<BranchHead>> = BTreeMap::new();
    for head in repo.heads()? {
        by_branch.entry(head.branch.clone()).or_default().push(head);
    }
    for (branch, heads) in &by_branch {
        if heads.len() <= 1 {
            continue;
        }
        info!("Branch '{branch}' has {} heads", heads.len());
        for head in heads {
            // Re-read after every creation so the new name is taken into
            // account for the next head.
            let existing = repo.branch_names()?;
            let name = unique_branch_name(&existing, branch);
            create_branch(repo, &head.node, &name)?;
        }
    }
    Ok(())
}

/// Create a `fork/branch` branch for every head pulled in from a fork.
/// Commits that were in the repository all along keep their branch names.
pub fn create_fork_branches(
    repo: &HgRepo,
    fork_commits: &[ForkCommit],
    own_repo: &str,
) -> Result<()> {
    for head in repo.heads()? {
        let fork_commit = match fork_commits
            .iter()
            .find(|commit| head.node.starts_with(&commit.hash))
        {
            Some(commit) => commit,
            None => continue,
        };
        if fork_commit.repository == own_repo {
            debug!(
                "Commit {} was already in '{own_repo}', keeping branch '{}'",
                fork_commit.hash, head.branch
            );
            continue;
        }
        let name = fork_branch_name(&fork_commit.repository, &head.branch);
        info!("Creating branch '{name}' for fork commit {}", fork_commit.hash);
        create_branch(repo, &fork_commit.hash, &name)?;
    }
    Ok(())
}

/// Create a `master` branch on the single `default` head. A branch
/// creation commit there is enough for fast-export to put the whole
/// preceding history onto `master`. With no `default` head, or several,
/// there is no obvious mainline and the step is skipped.
pub fn create_master_branch(repo: &HgRepo) -> Result<()> {
    let default_heads: Vec<BranchHead> = repo
        .heads()?
        .into_iter()
        .filter(|head| head.branch == "default")
        .collect();
    match default_heads.as_slice() {
        [head] => create_branch(repo, &head.node, "master"),
        [] => {
            warn!("No default head found, skipping master branch creation");
            Ok(())
        }
        _ => {
            warn!(
                "{} default heads found, skipping master branch creation",
                default_heads.len()
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_branch_name_starts_at_zero() {
        assert_eq!(unique_branch_name(&[], "dev"), "dev_0");
    }

    #[test]
    fn test_unique_branch_name_skips_taken_suffixes() {
        let existing = vec![
            "dev".to_string(),
            "dev_0".to_string(),
            "dev_1".to_string(),
        ];
        assert_eq!(unique_branch_name(&existing, "dev"), "dev_2");
    }

    #[test]
    fn test_fork_branch_name() {
        assert_eq!(
            fork_branch_name("carol/widget-fork", "feature"),
            "carol/widget-fork/feature"
        );
    }

    #[test]
    fn test_create_branch_dry_run() {
        let repo = HgRepo::new("/nonexistent/repo").with_dry_run(true);
        create_branch(&repo, "abc123", "master").unwrap();
    }
}
