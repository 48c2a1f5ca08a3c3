//! Migration configuration loaded from a YAML file.
//!
//! A single configuration file describes every repository taking part in a
//! migration wave, so that cross-repository references can be rewritten even
//! when only one repository is being migrated at a time.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Mapping of one Bitbucket repository to its GitHub counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMapping {
    /// Full Bitbucket name, e.g. `acme/widget`.
    pub source: String,
    /// Full GitHub name, e.g. `acme-org/widget`.
    pub target: String,
    /// Number of issues in the Bitbucket issue tracker. Pull requests are
    /// migrated as issues numbered after this count, so an incorrect value
    /// here corrupts every rewritten pull-request reference.
    pub issue_count: u64,
    /// Path to the `old-hash,new-hash` commit map produced by the repository
    /// conversion, if one exists yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_map: Option<PathBuf>,
}

impl RepositoryMapping {
    /// The repository name without its workspace prefix.
    pub fn short_name(&self) -> &str {
        match self.source.split_once('/') {
            Some((_, name)) => name,
            None => &self.source,
        }
    }
}

/// Complete migration configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Repositories taking part in the migration wave.
    #[serde(default)]
    pub repositories: Vec<RepositoryMapping>,

    /// Bitbucket nickname to GitHub username. A `null` value records that
    /// the user is known but has no GitHub account, which silences the
    /// unknown-user warning.
    #[serde(default)]
    pub users: BTreeMap<String, Option<String>>,

    /// Issue kind to GitHub label; `null` drops the kind.
    #[serde(default)]
    pub kinds: BTreeMap<String, Option<String>>,

    /// Issue priority to GitHub label; `null` drops the priority.
    #[serde(default)]
    pub priorities: BTreeMap<String, Option<String>>,

    /// Issue component to GitHub label; `null` drops the component.
    #[serde(default)]
    pub components: BTreeMap<String, Option<String>>,

    /// Issue state to GitHub label; `null` drops the state.
    #[serde(default)]
    pub states: BTreeMap<String, Option<String>>,

    /// Issue states considered open; everything else closes the GitHub issue.
    #[serde(default)]
    pub open_states: BTreeSet<String>,

    /// Replacement name for the Mercurial `default` branch of the repository
    /// being migrated, used when naming pull-request base branches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch_rename: Option<String>,
}

impl MigrationConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.repositories.is_empty() {
            return Err(ConfigError::Invalid(
                "no repositories configured".to_string(),
            ));
        }
        let mut sources = BTreeSet::new();
        for mapping in &self.repositories {
            for name in [&mapping.source, &mapping.target] {
                if !is_full_name(name) {
                    return Err(ConfigError::Invalid(format!(
                        "invalid repository name '{name}': expected 'workspace/name'"
                    )));
                }
            }
            if !sources.insert(mapping.source.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "repository '{}' is configured twice",
                    mapping.source
                )));
            }
        }
        Ok(())
    }

    /// The mapping for a Bitbucket repository, if it is configured.
    pub fn mapping(&self, source: &str) -> Option<&RepositoryMapping> {
        self.repositories.iter().find(|m| m.source == source)
    }

    /// The mapping for a Bitbucket repository, failing when it is missing.
    pub fn require_mapping(&self, source: &str) -> Result<&RepositoryMapping> {
        self.mapping(source)
            .ok_or_else(|| ConfigError::UnknownRepository(source.to_string()))
    }

    /// The GitHub repository a Bitbucket repository migrates to.
    pub fn target_repository(&self, source: &str) -> Option<&str> {
        self.mapping(source).map(|m| m.target.as_str())
    }

    /// The configured issue count of a Bitbucket repository.
    pub fn issue_count(&self, source: &str) -> Option<u64> {
        self.mapping(source).map(|m| m.issue_count)
    }

    /// Lowercased short repository names to their mappings. When two
    /// repositories share a short name the one listed first wins.
    pub fn short_names(&self) -> BTreeMap<String, &RepositoryMapping> {
        let mut names = BTreeMap::new();
        for mapping in &self.repositories {
            names
                .entry(mapping.short_name().to_lowercase())
                .or_insert(mapping);
        }
        names
    }
}

fn is_full_name(name: &str) -> bool {
    match name.split_once('/') {
        Some((workspace, repo)) => {
            !workspace.is_empty() && !repo.is_empty() && !repo.contains('/')
        }
        None => false,
    }
}
