//! Wrapper around the `git` command line client and the fast-export
//! script.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::Result;
use crate::process;

/// The notes ref `hg-fast-export --hg-hash` writes commit provenance to.
pub const HG_NOTES_REF: &str = "refs/notes/hg";

/// A local Git repository driven through the `git` executable.
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    /// Wrap an existing repository.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Initialize a fresh repository at `path`. Case-insensitive filename
    /// handling is switched off to match Mercurial's view of the tree.
    pub fn init(path: impl Into<PathBuf>) -> Result<Self> {
        let repo = Self::open(path);
        repo.command(&["init"])?;
        repo.command(&["config", "core.ignoreCase", "false"])?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run one `git` command inside the repository and return its stdout.
    pub fn command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.path).args(args);
        process::run(&mut cmd)
    }

    /// Add a named remote.
    pub fn remote_add(&self, name: &str, url: &str) -> Result<()> {
        self.command(&["remote", "add", name, url])?;
        Ok(())
    }

    /// Push `master` with upstream tracking, then every other branch.
    pub fn push_all(&self, remote: &str) -> Result<()> {
        self.command(&["push", "--set-upstream", remote, "master", "-f"])?;
        self.command(&["push", "--all", remote])?;
        Ok(())
    }

    /// Convert the Mercurial repository at `hg_repo` into this repository
    /// with the `hg-fast-export.sh` script. `--hg-hash` makes the script
    /// record each commit's Mercurial hash as a git note under
    /// [`HG_NOTES_REF`], which later feeds the commit map.
    pub fn fast_export(&self, script: &Path, hg_repo: &Path) -> Result<()> {
        let mut cmd = Command::new(script);
        cmd.current_dir(&self.path)
            .arg("-r")
            .arg(hg_repo)
            .arg("--hg-hash");
        process::run(&mut cmd)?;
        Ok(())
    }

    /// Git hashes of every commit carrying an hg provenance note. The
    /// notes listing pairs each note object with its annotated commit;
    /// only the commit hashes are of interest.
    pub fn notes_list(&self) -> Result<Vec<String>> {
        let out = self.command(&["notes", "--ref", HG_NOTES_REF, "list"])?;
        Ok(parse_notes_list(&out))
    }

    /// Content of the hg provenance note of one commit.
    pub fn note_content(&self, git_hash: &str) -> Result<String> {
        let out = self.command(&["notes", "--ref", HG_NOTES_REF, "show", git_hash])?;
        Ok(out.trim().to_string())
    }
}

fn parse_notes_list(out: &str) -> Vec<String> {
    out.lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_notes_list_takes_annotated_commit() {
        let out = "note1111 commitaaaa\nnote2222 commitbbbb\n";
        assert_eq!(parse_notes_list(out), vec!["commitaaaa", "commitbbbb"]);
    }

    #[test]
    fn test_parse_notes_list_ignores_blank_and_short_lines() {
        assert!(parse_notes_list("").is_empty());
        assert!(parse_notes_list("\n\n").is_empty());
        assert!(parse_notes_list("only-one-token\n").is_empty());
    }
}
