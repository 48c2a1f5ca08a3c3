//! Reference rewriting for migrated text.
//!
//! Bitbucket markup is full of references that stop working after a move to
//! GitHub: links to issues and pull requests, `@` mentions, and commit
//! hashes invalidated by the Mercurial-to-Git conversion. The rewriter runs
//! seven passes over each piece of text, one per reference form. Pass order
//! matters: pull-request forms run before issue forms because GitHub numbers
//! both in one sequence and only pull requests are shifted by the issue
//! count, and explicit links run before the looser implicit forms so a
//! rewritten URL is never re-matched by a later pass.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use bb2gh_map::{CommitMapIndex, PrefixLookup};
use bb2gh_types::MigrationConfig;

use crate::error::Result;

/// Tail of a Bitbucket URL after the part that identifies the reference:
/// title slugs, query strings, fragments.
const URL_TAIL: &str = r"[^\s()\[\]{}]*";

static MENTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|\W)@(?:([A-Za-z0-9_\-]+)\b|\{([0-9A-Za-z_:\-]+)\})").expect("Invalid regex")
});

/// A bare hash candidate. The leading class excludes `/` so that hex path
/// segments of already-rewritten commit URLs are not picked up again.
static BARE_HASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^\w/])([0-9a-fA-F]{7,})\b").expect("Invalid regex"));

/// Rewrites cross-references in migrated text into their GitHub forms.
///
/// One rewriter serves one repository migration: implicit references
/// without a repository qualifier resolve against `own_repo`.
pub struct ReferenceRewriter {
    own_repo: String,
    /// Bitbucket full name to GitHub full name.
    targets: BTreeMap<String, String>,
    /// Bitbucket full name to configured issue count.
    issue_counts: BTreeMap<String, u64>,
    /// Lowercased short name to Bitbucket full name.
    short_names: BTreeMap<String, String>,
    /// Bitbucket nickname to GitHub username; `None` marks a user known to
    /// have no GitHub account.
    users: BTreeMap<String, Option<String>>,
    /// GitHub usernames appearing as mapping values. A mention of one of
    /// these is already in its final form and must be left alone, which
    /// keeps the mention pass idempotent.
    mapped_users: BTreeSet<String>,
    index: Arc<CommitMapIndex>,
    pull_link_re: Regex,
    issue_link_re: Regex,
    commit_link_re: Regex,
    implicit_pull_re: Regex,
    implicit_issue_re: Regex,
}

impl ReferenceRewriter {
    pub fn new(
        config: &MigrationConfig,
        index: Arc<CommitMapIndex>,
        own_repo: &str,
    ) -> Result<Self> {
        config.require_mapping(own_repo)?;

        let mut targets = BTreeMap::new();
        let mut issue_counts = BTreeMap::new();
        for mapping in &config.repositories {
            targets.insert(mapping.source.clone(), mapping.target.clone());
            issue_counts.insert(mapping.source.clone(), mapping.issue_count);
        }

        let mut short_names = BTreeMap::new();
        for (short, mapping) in config.short_names() {
            short_names.insert(short, mapping.source.clone());
        }
        for mapping in &config.repositories {
            let short = mapping.short_name().to_lowercase();
            if short_names.get(&short) != Some(&mapping.source) {
                warn!(
                    "Short repository name '{short}' is ambiguous, treating it as '{}'",
                    short_names[&short]
                );
            }
        }

        let repo_alt = alternation(targets.keys());
        let short_alt = alternation(short_names.keys());

        let pull_link_re = Regex::new(&format!(
            r"https://bitbucket\.org/({repo_alt})/pull-requests?/(\d+){URL_TAIL}"
        ))?;
        let issue_link_re = Regex::new(&format!(
            r"https://bitbucket\.org/({repo_alt})/issues?/(\d+){URL_TAIL}"
        ))?;
        let commit_link_re = Regex::new(&format!(
            r"https://bitbucket\.org/({repo_alt})/(?:commits?|changeset|rev)/([0-9a-fA-F]{{7,}}){URL_TAIL}"
        ))?;
        let implicit_pull_re = Regex::new(&format!(
            r"(?i)(^|\W)(?:({short_alt})\s+)?pull request #(\d+)"
        ))?;
        let implicit_issue_re = Regex::new(&format!(
            r"(?i)(^|\W)(?:({short_alt}|issue)\s+)?#(\d+)\b"
        ))?;

        Ok(Self {
            own_repo: own_repo.to_string(),
            targets,
            issue_counts,
            short_names,
            users: config.users.clone(),
            mapped_users: config.users.values().flatten().cloned().collect(),
            index,
            pull_link_re,
            issue_link_re,
            commit_link_re,
            implicit_pull_re,
            implicit_issue_re,
        })
    }

    /// Run all seven passes in order.
    pub fn rewrite(&self, text: &str) -> String {
        let text = self.rewrite_pull_links(text);
        let text = self.rewrite_pull_references(&text);
        let text = self.rewrite_issue_links(&text);
        let text = self.rewrite_issue_references(&text);
        let text = self.rewrite_user_mentions(&text);
        let text = self.rewrite_commit_links(&text);
        self.rewrite_bare_hashes(&text)
    }

    /// Pass 1: explicit links to pull requests of known repositories.
    pub fn rewrite_pull_links(&self, text: &str) -> String {
        rewrite_matches(&self.pull_link_re, text, &[], |caps| {
            let source = &caps[1];
            let number: u64 = caps[2].parse().ok()?;
            let target = self.targets.get(source)?;
            let count = self.issue_counts.get(source)?;
            Some(format!("https://github.com/{target}/pull/{}", number + count))
        })
    }

    /// Pass 2: implicit `pull request #n` references, optionally qualified
    /// by a known short repository name.
    pub fn rewrite_pull_references(&self, text: &str) -> String {
        let spans = bracket_spans(text);
        rewrite_matches(&self.implicit_pull_re, text, &spans, |caps| {
            let prefix = &caps[1];
            let number: u64 = caps[3].parse().ok()?;
            let source = match caps.get(2) {
                Some(short) => self.short_names.get(&short.as_str().to_lowercase())?.as_str(),
                None => self.own_repo.as_str(),
            };
            let target = self.targets.get(source)?;
            let count = self.issue_counts.get(source)?;
            Some(format!(
                "{prefix}https://github.com/{target}/pull/{}",
                number + count
            ))
        })
    }

    /// Pass 3: explicit links to issues of known repositories.
    pub fn rewrite_issue_links(&self, text: &str) -> String {
        rewrite_matches(&self.issue_link_re, text, &[], |caps| {
            let source = &caps[1];
            let number = &caps[2];
            let target = self.targets.get(source)?;
            Some(format!("https://github.com/{target}/issues/{number}"))
        })
    }

    /// Pass 4: implicit `#n` references, optionally qualified by a known
    /// short repository name or the word `issue`.
    pub fn rewrite_issue_references(&self, text: &str) -> String {
        let spans = bracket_spans(text);
        rewrite_matches(&self.implicit_issue_re, text, &spans, |caps| {
            let prefix = &caps[1];
            let number = &caps[3];
            let source = match caps.get(2) {
                Some(qualifier) => {
                    let qualifier = qualifier.as_str().to_lowercase();
                    if qualifier == "issue" {
                        self.own_repo.as_str()
                    } else {
                        self.short_names.get(&qualifier)?.as_str()
                    }
                }
                None => self.own_repo.as_str(),
            };
            let target = self.targets.get(source)?;
            Some(format!("{prefix}https://github.com/{target}/issues/{number}"))
        })
    }

    /// Pass 5: `@` mentions. Mapped nicknames become GitHub mentions,
    /// unmapped ones lose the `@` so GitHub does not ping a stranger who
    /// happens to own the same username.
    pub fn rewrite_user_mentions(&self, text: &str) -> String {
        rewrite_matches(&MENTION_RE, text, &[], |caps| {
            let prefix = &caps[1];
            let nickname = caps.get(2).or_else(|| caps.get(3))?.as_str();
            match self.users.get(nickname) {
                Some(Some(github_user)) => {
                    return Some(format!("{prefix}@{github_user}"));
                }
                Some(None) => {}
                None if self.mapped_users.contains(nickname) => return None,
                None => debug!("Dropping mention of unmapped user '{nickname}'"),
            }
            let whole = &caps[0];
            let rest = &whole[prefix.len() + 1..];
            Some(format!("{prefix}{rest}"))
        })
    }

    /// Pass 6: explicit links to commits of known repositories, looked up
    /// in that repository's commit map.
    pub fn rewrite_commit_links(&self, text: &str) -> String {
        rewrite_matches(&self.commit_link_re, text, &[], |caps| {
            let source = &caps[1];
            let hash = &caps[2];
            let target = self.targets.get(source)?;
            let map = match self.index.map_of(source) {
                Some(map) => map,
                None => {
                    debug!("No commit map for '{source}', leaving commit link unchanged");
                    return None;
                }
            };
            match map.lookup_prefix(hash) {
                PrefixLookup::Unique {
                    target: git_hash, ..
                } => Some(format!("https://github.com/{target}/commit/{git_hash}")),
                PrefixLookup::Ambiguous => {
                    warn!("Commit hash '{hash}' in a link to '{source}' is ambiguous");
                    None
                }
                PrefixLookup::NotFound => {
                    debug!("Commit hash '{hash}' in a link to '{source}' has no mapping");
                    None
                }
            }
        })
    }

    /// Pass 7: bare hex runs that resolve to a mapped commit. Anything the
    /// index cannot resolve uniquely is left untouched, which filters out
    /// ordinary numbers and hex-like words.
    pub fn rewrite_bare_hashes(&self, text: &str) -> String {
        let spans = bracket_spans(text);
        rewrite_matches(&BARE_HASH_RE, text, &spans, |caps| {
            let prefix = &caps[1];
            let hash = &caps[2];
            let hit = match self.index.lookup(hash) {
                Some(hit) => hit,
                None => {
                    debug!("Hex run '{hash}' has no unique commit mapping");
                    return None;
                }
            };
            let target = match self.targets.get(hit.repository) {
                Some(target) => target,
                None => {
                    warn!(
                        "Commit '{hash}' belongs to '{}', which has no migration target",
                        hit.repository
                    );
                    return None;
                }
            };
            Some(format!(
                "{prefix}https://github.com/{target}/commit/{}",
                hit.target
            ))
        })
    }
}

/// Escaped alternation of the given names, longest first.
fn alternation<'a>(names: impl Iterator<Item = &'a String>) -> String {
    let mut escaped: Vec<String> = names.map(|name| regex::escape(name)).collect();
    escaped.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    escaped.join("|")
}

/// Replace every match outside `skip` by what `replace` returns, leaving
/// the match untouched when `replace` returns `None`.
fn rewrite_matches<F>(re: &Regex, text: &str, skip: &[(usize, usize)], mut replace: F) -> String
where
    F: FnMut(&Captures<'_>) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let whole = match caps.get(0) {
            Some(whole) => whole,
            None => continue,
        };
        if overlaps(skip, whole.start(), whole.end()) {
            continue;
        }
        if let Some(replacement) = replace(&caps) {
            out.push_str(&text[last..whole.start()]);
            out.push_str(&replacement);
            last = whole.end();
        }
    }
    out.push_str(&text[last..]);
    out
}

/// Byte spans of `[...]` regions. Implicit references inside them are left
/// alone because they are usually markdown link labels whose URL is handled
/// by an explicit pass. An unclosed `[` suppresses to the end of the text.
fn bracket_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open: Option<usize> = None;
    for (i, c) in text.char_indices() {
        match c {
            '[' if open.is_none() => open = Some(i),
            ']' => {
                if let Some(start) = open.take() {
                    spans.push((start, i + 1));
                }
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        spans.push((start, text.len()));
    }
    spans
}

fn overlaps(spans: &[(usize, usize)], start: usize, end: usize) -> bool {
    spans.iter().any(|&(s, e)| start < e && end > s)
}
