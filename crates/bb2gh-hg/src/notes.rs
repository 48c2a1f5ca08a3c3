//! Commit-map extraction from git notes.
//!
//! `hg-fast-export --hg-hash` records each converted commit's Mercurial
//! hash as a git note. Walking those notes yields the complete hg-to-git
//! hash mapping of the conversion, which the discussion migration later
//! uses to rewrite commit references.

use std::path::Path;

use tracing::info;

use bb2gh_map::CommitMap;

use crate::error::Result;
use crate::git::GitRepo;

/// Read the hg provenance note of every converted commit.
pub fn extract_commit_map(repo: &GitRepo) -> Result<CommitMap> {
    let mut map = CommitMap::new();
    for git_hash in repo.notes_list()? {
        let hg_hash = repo.note_content(&git_hash)?;
        map.insert(&hg_hash, &git_hash);
    }
    info!("Extracted {} commit mappings", map.len());
    Ok(map)
}

/// Extract the map and write it to `path` in the `hg-hash,git-hash` line
/// format.
pub fn store_commit_map(repo: &GitRepo, path: &Path) -> Result<()> {
    let map = extract_commit_map(repo)?;
    map.store(path)?;
    Ok(())
}
