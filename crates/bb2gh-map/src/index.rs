//! Combined lookup across the commit maps of every configured repository.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::warn;

use crate::error::Result;
use crate::map::{shared_prefix_len, CommitMap, PrefixLookup, MIN_PREFIX_LEN};

/// A resolved commit hash prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixHit<'a> {
    /// Full Bitbucket name of the repository the hash belongs to.
    pub repository: &'a str,
    /// Full source (Mercurial) hash.
    pub source: &'a str,
    /// Full target (Git) hash.
    pub target: &'a str,
}

/// Commit maps of all repositories in a migration wave, keyed by full
/// Bitbucket repository name.
///
/// Bare hashes in migrated text carry no repository qualifier, so a prefix
/// is resolved against every map at once and only counts as a hit when it
/// is unique across all of them.
#[derive(Debug, Clone, Default)]
pub struct CommitMapIndex {
    maps: BTreeMap<String, CommitMap>,
}

impl CommitMapIndex {
    pub fn new(maps: Vec<(String, CommitMap)>) -> Self {
        Self {
            maps: maps.into_iter().collect(),
        }
    }

    /// Load the maps named by `(repository, path)` pairs.
    pub fn load(pairs: &[(String, PathBuf)]) -> Result<Self> {
        let mut maps = BTreeMap::new();
        for (repository, path) in pairs {
            maps.insert(repository.clone(), CommitMap::load(path)?);
        }
        Ok(Self { maps })
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Total number of mapped commits.
    pub fn len(&self) -> usize {
        self.maps.values().map(CommitMap::len).sum()
    }

    /// The map of one repository.
    pub fn map_of(&self, repository: &str) -> Option<&CommitMap> {
        self.maps.get(repository)
    }

    /// Resolve a hash prefix across all maps. Ambiguity, within one map or
    /// between maps, is reported and treated as a miss.
    pub fn lookup(&self, prefix: &str) -> Option<PrefixHit<'_>> {
        let mut hit: Option<PrefixHit<'_>> = None;
        for (repository, map) in &self.maps {
            match map.lookup_prefix(prefix) {
                PrefixLookup::Unique { source, target } => {
                    if let Some(earlier) = hit {
                        warn!(
                            "Commit hash prefix '{prefix}' matches in both '{}' and '{repository}'",
                            earlier.repository
                        );
                        return None;
                    }
                    hit = Some(PrefixHit {
                        repository,
                        source,
                        target,
                    });
                }
                PrefixLookup::Ambiguous => {
                    warn!("Commit hash prefix '{prefix}' is ambiguous within '{repository}'");
                    return None;
                }
                PrefixLookup::NotFound => {}
            }
        }
        hit
    }

    /// The Git hash a prefix maps to, if the prefix is a unique hit.
    pub fn lookup_target(&self, prefix: &str) -> Option<&str> {
        self.lookup(prefix).map(|hit| hit.target)
    }

    /// The repository a prefix belongs to, if the prefix is a unique hit.
    pub fn lookup_repository(&self, prefix: &str) -> Option<&str> {
        self.lookup(prefix).map(|hit| hit.repository)
    }

    /// Advisory consistency check: reports source hashes that cannot be
    /// told apart by a [`MIN_PREFIX_LEN`]-character prefix anywhere in the
    /// wave, and Git hashes produced by more than one source hash. Returns
    /// the number of problems found; all of them are logged as warnings.
    pub fn check(&self) -> usize {
        let mut problems = 0;

        let mut sources: Vec<(&str, &str)> = self
            .maps
            .iter()
            .flat_map(|(repository, map)| {
                map.iter().map(move |(source, _)| (source, repository.as_str()))
            })
            .collect();
        sources.sort_unstable();
        for pair in sources.windows(2) {
            let (a, repo_a) = pair[0];
            let (b, repo_b) = pair[1];
            if shared_prefix_len(a, b) >= MIN_PREFIX_LEN {
                warn!(
                    "Commit hashes '{a}' ({repo_a}) and '{b}' ({repo_b}) share a prefix of \
                     {MIN_PREFIX_LEN} or more characters"
                );
                problems += 1;
            }
        }

        let mut targets: BTreeMap<&str, (&str, &str)> = BTreeMap::new();
        for (repository, map) in &self.maps {
            for (source, target) in map.iter() {
                if let Some((other_repo, other_source)) =
                    targets.insert(target, (repository.as_str(), source))
                {
                    warn!(
                        "Git commit '{target}' is mapped from both '{other_source}' \
                         ({other_repo}) and '{source}' ({repository})"
                    );
                    problems += 1;
                }
            }
        }

        problems
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn hash_strategy() -> impl Strategy<Value = String> {
        "[0-9a-f]{40}"
    }

    proptest! {
        /// Property: any unique prefix of at least seven characters of a
        /// stored hash resolves to that hash's target.
        #[test]
        fn prop_unique_prefix_resolves(
            hashes in prop::collection::btree_set(hash_strategy(), 1..20),
            prefix_len in MIN_PREFIX_LEN..40usize,
        ) {
            let hashes: Vec<String> = hashes.into_iter().collect();
            let mut map = CommitMap::new();
            for (i, hash) in hashes.iter().enumerate() {
                map.insert(hash, &format!("{i:040x}"));
            }
            let index = CommitMapIndex::new(vec![("acme/widget".to_string(), map)]);

            for (i, hash) in hashes.iter().enumerate() {
                let prefix = &hash[..prefix_len];
                let unique = hashes
                    .iter()
                    .filter(|other| other.starts_with(prefix))
                    .count()
                    == 1;
                match index.lookup(prefix) {
                    Some(hit) => {
                        prop_assert!(unique);
                        prop_assert_eq!(hit.source, hash.as_str());
                        prop_assert_eq!(hit.target, format!("{i:040x}"));
                    }
                    None => prop_assert!(!unique),
                }
            }
        }

        /// Property: prefixes shorter than the minimum never resolve.
        #[test]
        fn prop_short_prefix_never_resolves(
            hashes in prop::collection::btree_set(hash_strategy(), 1..10),
            prefix_len in 0..MIN_PREFIX_LEN,
        ) {
            let mut map = CommitMap::new();
            for hash in &hashes {
                map.insert(hash, hash);
            }
            let index = CommitMapIndex::new(vec![("acme/widget".to_string(), map)]);
            for hash in &hashes {
                prop_assert!(index.lookup(&hash[..prefix_len]).is_none());
            }
        }
    }
}
