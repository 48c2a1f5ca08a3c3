//! Wrapper around the `hg` command line client.

use std::path::{Path, PathBuf};
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::process;

static BRANCH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^;]*);").expect("Invalid regex"));
static HEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^,;]*),([^,;]*);").expect("Invalid regex"));

/// One topological head, as reported by `hg heads`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHead {
    /// Name of the branch the head is on.
    pub branch: String,
    /// Full hash of the head commit.
    pub node: String,
}

/// A local Mercurial repository driven through the `hg` executable.
///
/// Every invocation pins `--cwd` to the repository and forces UTF-8 output
/// with an `en_US` locale, so the parsed output stays stable across host
/// setups.
pub struct HgRepo {
    path: PathBuf,
    dry_run: bool,
}

impl HgRepo {
    /// Wrap an existing repository.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            dry_run: false,
        }
    }

    /// Clone `url` into `path` and wrap the result.
    pub fn clone_from(url: &str, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut cmd = Command::new("hg");
        cmd.args(["--encoding", "UTF-8", "clone", url])
            .arg(&path)
            .env("LANG", "en_US");
        process::run(&mut cmd)?;
        Ok(Self::new(path))
    }

    /// Print write commands instead of running them. Reads still run.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run one `hg` command inside the repository and return its stdout.
    pub fn command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("hg");
        cmd.arg("--cwd")
            .arg(&self.path)
            .args(["--encoding", "UTF-8"])
            .args(args)
            .env("LANG", "en_US");
        process::run(&mut cmd)
    }

    /// Names of all named branches.
    pub fn branch_names(&self) -> Result<Vec<String>> {
        let out = self.command(&["branches", "--template", "{branch};"])?;
        Ok(parse_branch_names(&out))
    }

    /// Topological heads with their branch names and full hashes.
    pub fn heads(&self) -> Result<Vec<BranchHead>> {
        let out = self.command(&["heads", "-t", "-T", "{branch},{node};"])?;
        Ok(parse_heads(&out))
    }

    /// Update the working copy to a revision.
    pub fn update(&self, rev: &str) -> Result<()> {
        if self.dry_run {
            println!("hg update {rev}");
            return Ok(());
        }
        self.command(&["update", rev])?;
        Ok(())
    }

    /// Put the working copy on a (possibly new) named branch.
    pub fn branch(&self, name: &str) -> Result<()> {
        if self.dry_run {
            println!("hg branch {name}");
            return Ok(());
        }
        self.command(&["branch", name])?;
        Ok(())
    }

    /// Commit the working copy.
    pub fn commit(&self, message: &str) -> Result<()> {
        if self.dry_run {
            println!("hg commit -m \"{message}\"");
            return Ok(());
        }
        self.command(&["commit", "-m", message])?;
        Ok(())
    }

    /// Pull one revision from another repository.
    pub fn pull_rev(&self, rev: &str, url: &str) -> Result<()> {
        if self.dry_run {
            println!("hg pull -r {rev} {url}");
            return Ok(());
        }
        self.command(&["pull", "-r", rev, url])?;
        Ok(())
    }
}

fn parse_branch_names(out: &str) -> Vec<String> {
    BRANCH_RE
        .captures_iter(out)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn parse_heads(out: &str) -> Vec<BranchHead> {
    HEAD_RE
        .captures_iter(out)
        .map(|caps| BranchHead {
            branch: caps[1].to_string(),
            node: caps[2].to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_branch_names() {
        assert_eq!(
            parse_branch_names("default;feature;bug/fix-1;"),
            vec!["default", "feature", "bug/fix-1"]
        );
        assert!(parse_branch_names("").is_empty());
    }

    #[test]
    fn test_parse_heads() {
        let heads = parse_heads("default,aa11;feature,bb22;");
        assert_eq!(
            heads,
            vec![
                BranchHead {
                    branch: "default".to_string(),
                    node: "aa11".to_string(),
                },
                BranchHead {
                    branch: "feature".to_string(),
                    node: "bb22".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_dry_run_skips_write_commands() {
        // The path does not exist; a real invocation would fail.
        let repo = HgRepo::new("/nonexistent/repo").with_dry_run(true);
        repo.update("abc123").unwrap();
        repo.branch("master").unwrap();
        repo.commit("Creates branch master").unwrap();
        repo.pull_rev("def456", "ssh://hg@bitbucket.org/acme/widget-fork")
            .unwrap();
    }
}
