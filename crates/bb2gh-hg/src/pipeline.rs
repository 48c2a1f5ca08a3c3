//! The end-to-end history conversion of one repository.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use bb2gh_types::record::PullRequestRecord;
use bb2gh_types::RepositoryMapping;

use crate::branches;
use crate::error::Result;
use crate::forks;
use crate::git::GitRepo;
use crate::hg::HgRepo;
use crate::notes;

/// Settings of one conversion run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Directory receiving the hg clone, the git repository and the
    /// commit map.
    pub work_dir: PathBuf,
    /// Path of the `hg-fast-export.sh` script.
    pub fast_export_script: PathBuf,
    /// Print branch-fixing write commands instead of running them.
    pub dry_run: bool,
    /// Push the converted repository to GitHub when done.
    pub push: bool,
}

/// Where one conversion left its outputs.
#[derive(Debug)]
pub struct ConvertOutcome {
    pub hg_dir: PathBuf,
    pub git_dir: PathBuf,
    pub commit_map: PathBuf,
    pub forks_imported: usize,
}

/// Clone URL of a Bitbucket Mercurial repository.
pub fn bitbucket_repo_url(repo: &str) -> String {
    format!("ssh://hg@bitbucket.org/{repo}")
}

/// Push URL of a GitHub repository.
pub fn github_repo_url(repo: &str) -> String {
    format!("git@github.com:{repo}.git")
}

/// Convert one repository's history: clone, fork import, branch fixes,
/// fast-export, push, commit-map extraction. `pulls` are the repository's
/// pull requests, which determine the fork commits to import.
pub fn convert_repository(
    mapping: &RepositoryMapping,
    pulls: &[PullRequestRecord],
    options: &ConvertOptions,
) -> Result<ConvertOutcome> {
    let hg_dir = options.work_dir.join("bitbucket").join(&mapping.source);
    let git_dir = options.work_dir.join("github").join(&mapping.target);

    info!("Cloning '{}' to {}", mapping.source, hg_dir.display());
    recreate_dir(&hg_dir)?;
    let hg = HgRepo::clone_from(&bitbucket_repo_url(&mapping.source), &hg_dir)?
        .with_dry_run(options.dry_run);

    info!("Importing fork commits of open pull requests");
    let fork_commits = forks::open_fork_commits(pulls);
    let forks_imported = forks::import_fork_commits(&hg, &fork_commits)?;
    branches::create_fork_branches(&hg, &fork_commits, &mapping.source)?;
    branches::unique_branch_per_head(&hg)?;
    branches::create_master_branch(&hg)?;

    info!("Converting to git in {}", git_dir.display());
    recreate_dir(&git_dir)?;
    let git = GitRepo::init(&git_dir)?;
    git.fast_export(&options.fast_export_script, &hg_dir)?;

    if options.push {
        info!("Pushing to '{}'", mapping.target);
        git.remote_add("origin", &github_repo_url(&mapping.target))?;
        git.push_all("origin")?;
    }

    let commit_map = match &mapping.commit_map {
        Some(path) => path.clone(),
        None => options
            .work_dir
            .join(format!("{}.map", mapping.short_name())),
    };
    info!("Writing commit map to {}", commit_map.display());
    notes::store_commit_map(&git, &commit_map)?;

    Ok(ConvertOutcome {
        hg_dir,
        git_dir,
        commit_map,
        forks_imported,
    })
}

/// Make `path` an empty directory, clearing any earlier attempt.
fn recreate_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_urls() {
        assert_eq!(
            bitbucket_repo_url("acme/widget"),
            "ssh://hg@bitbucket.org/acme/widget"
        );
        assert_eq!(
            github_repo_url("acme-org/widget"),
            "git@github.com:acme-org/widget.git"
        );
    }

    #[test]
    fn test_recreate_dir_clears_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("work");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("stale.txt"), "old run").unwrap();

        recreate_dir(&target).unwrap();

        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target).unwrap().count(), 0);
    }
}
