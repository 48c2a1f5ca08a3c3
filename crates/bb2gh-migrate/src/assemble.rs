//! Assembly of GitHub issue, comment and pull-request bodies.
//!
//! GitHub's import API creates everything under the importing account, so
//! original authorship, dates and review activity survive only inside the
//! text itself. Every migrated body therefore starts with a quoted header
//! naming the original author and date, and issue change logs and review
//! activity become quoted pseudo-comments merged into the comment stream.
//!
//! Reference rewriting runs over user-written content only. Headers are
//! rendered directly with already-mapped usernames and commit links, which
//! keeps them stable when migrated text is rewritten again later.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, warn};

use bb2gh_map::{CommitMapIndex, PrefixLookup};
use bb2gh_types::payload::{
    CommentPayload, GistFileContent, GistPayload, IssueImportMeta, IssueImportPayload, PullPayload,
};
use bb2gh_types::record::{
    ActivityRecord, Actor, AttachmentRecord, ChangeRecord, CommentRecord, InlineLocation,
    IssueRecord, PullEndpoint, PullRequestRecord,
};
use bb2gh_types::MigrationConfig;

use crate::error::Result;
use crate::github::Gist;
use crate::mapping::IdentityMapper;
use crate::rewrite::ReferenceRewriter;
use crate::time;

/// Issue change-log fields that never become pseudo-comments: content and
/// title edits carry no old text worth quoting, and account ids duplicate
/// the assignee field.
const SKIPPED_CHANGE_FIELDS: &[&str] = &["content", "title", "assignee_account_id"];

/// Gists hold text; anything bigger than this is summarized instead.
const MAX_GIST_FILE_BYTES: usize = 1024 * 1024;

/// Builds the payloads uploaded to GitHub from exported Bitbucket records.
pub struct ContentAssembler {
    config: Arc<MigrationConfig>,
    index: Arc<CommitMapIndex>,
    mapper: IdentityMapper,
    rewriter: ReferenceRewriter,
    own_repo: String,
}

impl ContentAssembler {
    pub fn new(
        config: Arc<MigrationConfig>,
        index: Arc<CommitMapIndex>,
        own_repo: &str,
    ) -> Result<Self> {
        let rewriter = ReferenceRewriter::new(&config, Arc::clone(&index), own_repo)?;
        let mapper = IdentityMapper::new(Arc::clone(&config), own_repo);
        Ok(Self {
            config,
            index,
            mapper,
            rewriter,
            own_repo: own_repo.to_string(),
        })
    }

    pub fn mapper(&self) -> &IdentityMapper {
        &self.mapper
    }

    pub fn rewriter(&self) -> &ReferenceRewriter {
        &self.rewriter
    }

    /// Build the import payload of one issue.
    pub fn issue_payload(
        &self,
        issue: &IssueRecord,
        comments: &BTreeMap<u64, CommentRecord>,
        changes: &[ChangeRecord],
        attachments: &BTreeMap<String, AttachmentRecord>,
        gist: Option<&Gist>,
    ) -> Result<IssueImportPayload> {
        let created = time::parse_timestamp(&issue.created_on)?;
        let updated = time::parse_timestamp(&issue.updated_on)?;

        let mut body = String::new();
        match &issue.reporter {
            Some(reporter) => body.push_str(&format!(
                "> Created by **{}** on {}\n",
                self.display_user(reporter),
                time::display_date(&created)
            )),
            None => body.push_str(&format!(
                "> Created on {}\n",
                time::display_date(&created)
            )),
        }
        if time::display_date(&created) != time::display_date(&updated) {
            body.push_str(&format!(
                "> Last updated on {}\n",
                time::display_date(&updated)
            ));
        }
        body.push('\n');
        body.push_str(&self.rewriter.rewrite(issue.content.raw.as_deref().unwrap_or("")));
        body.push('\n');
        if !attachments.is_empty() {
            body.push_str("\n---\n\nAttachments:\n");
            for name in attachments.keys() {
                match gist.and_then(|g| g.raw_url(name)) {
                    Some(url) => body.push_str(&format!("* [**`{name}`**]({url})\n")),
                    None => {
                        error!("Attachment '{name}' of issue #{} has no gist file", issue.id);
                        body.push_str(&format!("* **`{name}`** (missing link)\n"));
                    }
                }
            }
        }

        let mut dated = self.dated_comment_bodies(comments)?;
        for change in changes {
            if let Some(entry) = self.change_body(change)? {
                dated.push(entry);
            }
        }

        Ok(IssueImportPayload {
            issue: IssueImportMeta {
                title: issue.title.clone(),
                body,
                created_at: created,
                updated_at: updated,
                assignee: self.mapper.github_user(issue.assignee.as_ref()),
                closed: !self.mapper.is_open(&issue.state),
                labels: self.mapper.issue_labels(issue),
            },
            comments: into_sorted_payloads(dated),
        })
    }

    /// Build the import payload of a pull request migrated as an issue.
    pub fn pull_request_payload(
        &self,
        pull: &PullRequestRecord,
        comments: &BTreeMap<u64, CommentRecord>,
        activity: &[ActivityRecord],
    ) -> Result<IssueImportPayload> {
        let created = time::parse_timestamp(&pull.created_on)?;
        let updated = time::parse_timestamp(&pull.updated_on)?;
        Ok(IssueImportPayload {
            issue: IssueImportMeta {
                title: format!("[PR] {}", pull.title),
                body: self.pull_body(pull)?,
                created_at: created,
                updated_at: updated,
                assignee: self.mapper.github_user(pull.author.as_ref()),
                closed: !pull.is_open(),
                labels: self.mapper.pull_labels(pull),
            },
            comments: self.pull_comment_payloads(comments, activity)?,
        })
    }

    /// Build the payload for recreating one still-open pull request as a
    /// real GitHub pull request.
    pub fn pull_payload(
        &self,
        pull: &PullRequestRecord,
        comments: &BTreeMap<u64, CommentRecord>,
        activity: &[ActivityRecord],
    ) -> Result<PullPayload> {
        if let Some(repository) = &pull.destination.repository {
            if repository.full_name != self.own_repo {
                error!(
                    "Pull request #{} targets '{}', not '{}'",
                    pull.id, repository.full_name, self.own_repo
                );
            }
        }
        let base_branch = branch_or_default(&pull.destination);
        let head_branch = branch_or_default(&pull.source);
        let head_repo = pull
            .source
            .repository
            .as_ref()
            .map(|r| r.full_name.as_str())
            .unwrap_or(self.own_repo.as_str());

        Ok(PullPayload {
            title: pull.title.clone(),
            body: self.pull_body(pull)?,
            head: self.mapper.branch_name(head_branch, head_repo),
            base: self.mapper.branch_name(base_branch, &self.own_repo),
            closed: !pull.is_open(),
            labels: self.mapper.pull_labels(pull),
            assignees: self
                .mapper
                .github_user(pull.author.as_ref())
                .into_iter()
                .collect(),
            reviewers: pull
                .reviewers
                .iter()
                .filter_map(|reviewer| self.mapper.github_user(Some(reviewer)))
                .collect(),
            comments: self.pull_comment_payloads(comments, activity)?,
        })
    }

    /// Description used to find an issue's attachment gist again on a
    /// repeated run. Keyed on the Bitbucket name so re-running against a
    /// renamed GitHub target still finds the old gist.
    pub fn attachment_gist_description(&self, issue_id: u64) -> String {
        format!(
            "Attachments for issue #{issue_id} of bitbucket repo {}",
            self.own_repo
        )
    }

    /// Build the gist storing one issue's attachments. The odd `#` in the
    /// README name makes it sort first in the gist's file list.
    pub fn attachment_gist(&self, issue_id: u64, files: &[(String, Vec<u8>)]) -> GistPayload {
        let description = self.attachment_gist_description(issue_id);
        let mut gist_files = BTreeMap::new();
        gist_files.insert(
            "# README.md".to_string(),
            GistFileContent {
                content: description.clone(),
            },
        );
        for (name, content) in files {
            if content.is_empty() {
                warn!("Attachment '{name}' of issue #{issue_id} is empty");
            } else if content.len() > MAX_GIST_FILE_BYTES {
                warn!(
                    "Attachment '{name}' of issue #{issue_id} is too large for a gist ({} bytes)",
                    content.len()
                );
            }
            gist_files.insert(
                name.clone(),
                GistFileContent {
                    content: attachment_text(content),
                },
            );
        }
        GistPayload {
            description,
            public: true,
            files: gist_files,
        }
    }

    /// Header plus rewritten description of a pull request.
    fn pull_body(&self, pull: &PullRequestRecord) -> Result<String> {
        let created = time::parse_timestamp(&pull.created_on)?;
        let updated = time::parse_timestamp(&pull.updated_on)?;

        let mut body = String::new();
        match &pull.author {
            Some(author) => body.push_str(&format!(
                "> **Pull request** :twisted_rightwards_arrows: created by **{}** on {}\n",
                self.display_user(author),
                time::display_date(&created)
            )),
            None => body.push_str(&format!(
                "> **Pull request** :twisted_rightwards_arrows: created on {}\n",
                time::display_date(&created)
            )),
        }
        if time::display_date(&created) != time::display_date(&updated) {
            body.push_str(&format!(
                "> Last updated on {}\n",
                time::display_date(&updated)
            ));
        }
        if !pull.participants.is_empty() {
            body.push_str(">\n> Participants:\n>\n");
            for participant in &pull.participants {
                body.push_str(&format!(
                    "> * **{}**",
                    self.display_user_opt(participant.user.as_ref())
                ));
                if participant.role == "REVIEWER" {
                    body.push_str(" (reviewer)");
                }
                if participant.approved {
                    body.push_str(" :heavy_check_mark:");
                }
                body.push('\n');
            }
        }
        body.push_str(">\n");
        body.push_str(&self.endpoint_line("Source", &pull.source));
        body.push_str(&self.endpoint_line("Destination", &pull.destination));
        if let Some(merge) = &pull.merge_commit {
            body.push_str(&format!(
                "> Merge commit: {}\n",
                self.commit_reference(&self.own_repo, &merge.hash)
            ));
        }
        body.push_str(">\n");
        body.push_str(&format!("> State: **`{}`**\n", pull.state));
        body.push_str(&format!("> (Bitbucket pull request id: {})\n", pull.id));
        body.push('\n');
        body.push_str(&self.rewriter.rewrite(&pull.description));
        body.push('\n');
        Ok(body)
    }

    /// One `Source:`/`Destination:` line of a pull-request header.
    fn endpoint_line(&self, label: &str, endpoint: &PullEndpoint) -> String {
        let branch = branch_or_default(endpoint);
        match &endpoint.commit {
            Some(commit) => {
                let repository = endpoint
                    .repository
                    .as_ref()
                    .map(|r| r.full_name.as_str())
                    .unwrap_or(self.own_repo.as_str());
                format!(
                    "> {label}: repository `{repository}`, branch `{branch}`, commit {}\n",
                    self.commit_reference(repository, &commit.hash)
                )
            }
            None => format!("> {label}: branch `{branch}`\n"),
        }
    }

    /// Markdown for one commit hash: a link into the converted repository
    /// when the mapping resolves, a plain marker otherwise.
    fn commit_reference(&self, repository: &str, hash: &str) -> String {
        let resolved = self.index.map_of(repository).and_then(|map| {
            match map.lookup_prefix(hash) {
                PrefixLookup::Unique { target, .. } => Some(target.to_string()),
                _ => None,
            }
        });
        if let (Some(git_hash), Some(target)) =
            (resolved, self.config.target_repository(repository))
        {
            format!("[{hash}](https://github.com/{target}/commit/{git_hash})")
        } else {
            warn!("No commit mapping for '{hash}' of '{repository}'");
            format!("`{hash}` (the commit mapping is missing)")
        }
    }

    /// Comments plus review activity of a pull request, in timestamp order.
    fn pull_comment_payloads(
        &self,
        comments: &BTreeMap<u64, CommentRecord>,
        activity: &[ActivityRecord],
    ) -> Result<Vec<CommentPayload>> {
        let mut dated = self.dated_comment_bodies(comments)?;
        for entry in activity {
            if let Some(entry) = self.activity_body(entry)? {
                dated.push(entry);
            }
        }
        Ok(into_sorted_payloads(dated))
    }

    fn dated_comment_bodies(
        &self,
        comments: &BTreeMap<u64, CommentRecord>,
    ) -> Result<Vec<(DateTime<Utc>, String)>> {
        let mut dated = Vec::new();
        for comment in comments.values() {
            if let Some(entry) = self.comment_body(comment, comments)? {
                dated.push(entry);
            }
        }
        Ok(dated)
    }

    /// Body of one migrated comment, or `None` for deleted comments and
    /// comments whose content Bitbucket already pruned.
    fn comment_body(
        &self,
        comment: &CommentRecord,
        all: &BTreeMap<u64, CommentRecord>,
    ) -> Result<Option<(DateTime<Utc>, String)>> {
        if comment.deleted {
            return Ok(None);
        }
        let raw = match comment.content.raw.as_deref() {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let created = time::parse_timestamp(&comment.created_on)?;

        let mut body = format!(
            "> **{}** commented on {}\n",
            self.display_user_opt(comment.user.as_ref()),
            time::display_date(&created)
        );
        if let Some(inline) = &comment.inline {
            body.push_str(&inline_note(inline));
        }
        body.push('\n');
        if let Some(parent) = comment.parent.as_ref().and_then(|p| all.get(&p.id)) {
            if let Some(parent_raw) = parent.content.raw.as_deref() {
                for line in self.rewriter.rewrite(parent_raw).lines() {
                    body.push_str("> ");
                    body.push_str(line);
                    body.push('\n');
                }
                body.push('\n');
            }
        }
        body.push_str(&self.rewriter.rewrite(raw));
        Ok(Some((created, body)))
    }

    /// Pseudo-comment for one issue change-log entry, or `None` when every
    /// changed field is skipped.
    fn change_body(&self, change: &ChangeRecord) -> Result<Option<(DateTime<Utc>, String)>> {
        let created = time::parse_timestamp(&change.created_on)?;
        let date = time::display_date(&created);
        let author = self.display_user_opt(change.user.as_ref());
        let mut body = String::new();
        for (field, values) in &change.changes {
            if SKIPPED_CHANGE_FIELDS.contains(&field.as_str()) {
                continue;
            }
            let old = placeholder_if_empty(&values.old);
            let new = placeholder_if_empty(&values.new);
            body.push_str(&format!(
                "> **{author}** changed `{field}` from `{old}` to `{new}` on {date}\n"
            ));
        }
        if body.is_empty() {
            Ok(None)
        } else {
            Ok(Some((created, body)))
        }
    }

    /// Pseudo-comment for one pull-request activity entry. Comment entries
    /// return `None` here because comments arrive via their own endpoint.
    fn activity_body(&self, activity: &ActivityRecord) -> Result<Option<(DateTime<Utc>, String)>> {
        if let Some(approval) = &activity.approval {
            let date = time::parse_timestamp(&approval.date)?;
            let body = format!(
                "> **{}** approved :heavy_check_mark: the pull request on {}\n",
                self.display_user_opt(approval.user.as_ref()),
                time::display_date(&date)
            );
            return Ok(Some((date, body)));
        }
        if let Some(update) = &activity.update {
            let state = match update.state.as_deref() {
                Some(state) => state,
                None => return Ok(None),
            };
            let date = time::parse_timestamp(&update.date)?;
            let body = match &update.author {
                Some(author) => format!(
                    "> **{}** changed the status to `{state}` on {}\n",
                    self.display_user(author),
                    time::display_date(&date)
                ),
                None => format!(
                    "> The status changed to `{state}` on {}\n",
                    time::display_date(&date)
                ),
            };
            return Ok(Some((date, body)));
        }
        Ok(None)
    }

    /// `@user` for mapped users, the bare nickname otherwise.
    fn display_user(&self, actor: &Actor) -> String {
        match self.mapper.github_user(Some(actor)) {
            Some(github_user) => format!("@{github_user}"),
            None => actor.nickname.clone(),
        }
    }

    fn display_user_opt(&self, actor: Option<&Actor>) -> String {
        match actor {
            Some(actor) => self.display_user(actor),
            None => "(former user)".to_string(),
        }
    }
}

fn branch_or_default(endpoint: &PullEndpoint) -> &str {
    endpoint
        .branch
        .as_ref()
        .map(|b| b.name.as_str())
        .unwrap_or("(none)")
}

fn inline_note(inline: &InlineLocation) -> String {
    match (inline.from, inline.to) {
        (Some(from), Some(to)) => {
            format!("> Inline comment on lines {from}..{to} of `{}`\n", inline.path)
        }
        (Some(line), None) | (None, Some(line)) => {
            format!("> Inline comment on line {line} of `{}`\n", inline.path)
        }
        (None, None) => format!("> Inline comment on `{}`\n", inline.path),
    }
}

fn placeholder_if_empty(value: &str) -> &str {
    if value.is_empty() {
        "(none)"
    } else {
        value
    }
}

fn attachment_text(content: &[u8]) -> String {
    if content.is_empty() {
        return "(empty file)".to_string();
    }
    if content.len() > MAX_GIST_FILE_BYTES {
        return format!("(file too large to migrate: {} bytes)", content.len());
    }
    String::from_utf8_lossy(content).into_owned()
}

fn into_sorted_payloads(mut dated: Vec<(DateTime<Utc>, String)>) -> Vec<CommentPayload> {
    dated.sort_by_key(|(date, _)| *date);
    dated
        .into_iter()
        .map(|(created_at, body)| CommentPayload { created_at, body })
        .collect()
}
