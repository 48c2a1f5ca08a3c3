//! A single repository's Mercurial-to-Git commit map.
//!
//! Conversion writes one `hg-hash,git-hash` pair per line. The map is read
//! back whenever commit references in migrated text need to be rewritten,
//! so loading is strict: a malformed line means the conversion output is
//! corrupt and the whole migration must stop.

use std::collections::BTreeMap;
use std::fs;
use std::ops::Bound;
use std::path::Path;

use crate::error::{MapError, Result};

/// Shortest commit hash prefix the rewriter resolves. Mercurial and Git
/// both abbreviate to at least this many characters in practice.
pub const MIN_PREFIX_LEN: usize = 7;

/// Result of a prefix lookup in one map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixLookup<'a> {
    /// Exactly one hash starts with the prefix.
    Unique { source: &'a str, target: &'a str },
    /// More than one hash starts with the prefix.
    Ambiguous,
    /// No hash starts with the prefix, or the prefix is too short.
    NotFound,
}

/// Maps full Mercurial hashes to the Git hashes they became.
#[derive(Debug, Clone, Default)]
pub struct CommitMap {
    entries: BTreeMap<String, String>,
}

impl CommitMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a map from its `hg-hash,git-hash` file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| MapError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut map = Self::new();
        for (index, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let malformed = || MapError::MalformedLine {
                path: path.to_path_buf(),
                line: index + 1,
                text: line.to_string(),
            };
            let (source, target) = line.split_once(',').ok_or_else(malformed)?;
            if !is_hex(source) || !is_hex(target) {
                return Err(malformed());
            }
            map.insert(source, target);
        }
        Ok(map)
    }

    /// Write the map in the same `hg-hash,git-hash` format it is loaded
    /// from, one pair per line in hash order.
    pub fn store(&self, path: &Path) -> Result<()> {
        let mut text = String::new();
        for (source, target) in &self.entries {
            text.push_str(source);
            text.push(',');
            text.push_str(target);
            text.push('\n');
        }
        fs::write(path, text).map_err(|source| MapError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Insert a pair. Hashes are normalized to lowercase; a repeated source
    /// hash overwrites the earlier entry.
    pub fn insert(&mut self, source: &str, target: &str) {
        self.entries
            .insert(source.to_lowercase(), target.to_lowercase());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup by full source hash.
    pub fn get(&self, source: &str) -> Option<&str> {
        self.entries.get(&source.to_lowercase()).map(String::as_str)
    }

    /// Resolve a hash prefix of at least [`MIN_PREFIX_LEN`] characters.
    pub fn lookup_prefix(&self, prefix: &str) -> PrefixLookup<'_> {
        if prefix.len() < MIN_PREFIX_LEN || !is_hex(prefix) {
            return PrefixLookup::NotFound;
        }
        let needle = prefix.to_lowercase();
        let mut matches = self
            .entries
            .range::<str, _>((Bound::Included(needle.as_str()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(&needle));
        match (matches.next(), matches.next()) {
            (Some((source, target)), None) => PrefixLookup::Unique {
                source: source.as_str(),
                target: target.as_str(),
            },
            (Some(_), Some(_)) => PrefixLookup::Ambiguous,
            (None, _) => PrefixLookup::NotFound,
        }
    }

    /// Iterate over `(source, target)` pairs in hash order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(source, target)| (source.as_str(), target.as_str()))
    }

    /// Pairs of source hashes that cannot be told apart by a
    /// [`MIN_PREFIX_LEN`]-character prefix.
    pub fn prefix_collisions(&self) -> Vec<(String, String)> {
        let mut collisions = Vec::new();
        let mut previous: Option<&String> = None;
        for key in self.entries.keys() {
            if let Some(prev) = previous {
                if shared_prefix_len(prev, key) >= MIN_PREFIX_LEN {
                    collisions.push((prev.clone(), key.clone()));
                }
            }
            previous = Some(key);
        }
        collisions
    }
}

/// Length of the common prefix of two hashes.
pub(crate) fn shared_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

fn is_hex(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> CommitMap {
        let mut map = CommitMap::new();
        map.insert(
            "0a1b2c3d4e5f00000000000000000000000000aa",
            "1111111111111111111111111111111111111111",
        );
        map.insert(
            "0a1b2c3effffffffffffffffffffffffffffffff",
            "2222222222222222222222222222222222222222",
        );
        map.insert(
            "fedcba9876543210fedcba9876543210fedcba98",
            "3333333333333333333333333333333333333333",
        );
        map
    }

    #[test]
    fn test_load_and_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widget.map");
        let map = sample_map();
        map.store(&path).unwrap();
        let loaded = CommitMap::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(
            loaded.get("0a1b2c3d4e5f00000000000000000000000000aa"),
            Some("1111111111111111111111111111111111111111")
        );
    }

    #[test]
    fn test_load_rejects_line_without_comma() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.map");
        std::fs::write(&path, "0a1b2c3d4e5f\n").unwrap();
        let err = CommitMap::load(&path).unwrap_err();
        assert!(matches!(err, MapError::MalformedLine { line: 1, .. }));
    }

    #[test]
    fn test_load_rejects_non_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.map");
        std::fs::write(&path, "0a1b2c,111111\nnot a hash,222222\n").unwrap();
        let err = CommitMap::load(&path).unwrap_err();
        assert!(matches!(err, MapError::MalformedLine { line: 2, .. }));
    }

    #[test]
    fn test_load_rejects_extra_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.map");
        std::fs::write(&path, "0a1b2c,111111,333333\n").unwrap();
        assert!(CommitMap::load(&path).is_err());
    }

    #[test]
    fn test_lookup_prefix_unique() {
        let map = sample_map();
        match map.lookup_prefix("fedcba9") {
            PrefixLookup::Unique { source, target } => {
                assert_eq!(source, "fedcba9876543210fedcba9876543210fedcba98");
                assert_eq!(target, "3333333333333333333333333333333333333333");
            }
            other => panic!("unexpected lookup result: {other:?}"),
        }
    }

    #[test]
    fn test_lookup_prefix_is_case_insensitive() {
        let map = sample_map();
        assert!(matches!(
            map.lookup_prefix("FEDCBA98"),
            PrefixLookup::Unique { .. }
        ));
    }

    #[test]
    fn test_lookup_prefix_ambiguous() {
        let map = sample_map();
        assert_eq!(map.lookup_prefix("0a1b2c3"), PrefixLookup::Ambiguous);
        // One more character makes the prefix unique again.
        assert!(matches!(
            map.lookup_prefix("0a1b2c3d"),
            PrefixLookup::Unique { .. }
        ));
    }

    #[test]
    fn test_lookup_prefix_too_short() {
        let map = sample_map();
        assert_eq!(map.lookup_prefix("fedcba"), PrefixLookup::NotFound);
        assert_eq!(map.lookup_prefix(""), PrefixLookup::NotFound);
    }

    #[test]
    fn test_lookup_prefix_rejects_non_hex() {
        let map = sample_map();
        assert_eq!(map.lookup_prefix("fedcba9z"), PrefixLookup::NotFound);
    }

    #[test]
    fn test_prefix_collisions() {
        let mut map = CommitMap::new();
        map.insert("aaaaaaaa1", "1111111");
        map.insert("aaaaaaaa2", "2222222");
        map.insert("bbbbbbbb1", "3333333");
        let collisions = map.prefix_collisions();
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].0, "aaaaaaaa1");
        assert_eq!(collisions[0].1, "aaaaaaaa2");
    }

    #[test]
    fn test_shared_prefix_len() {
        assert_eq!(shared_prefix_len("abcdef", "abcxyz"), 3);
        assert_eq!(shared_prefix_len("abc", "abc"), 3);
        assert_eq!(shared_prefix_len("", "abc"), 0);
    }
}
