//! Records exported from the Bitbucket REST API.
//!
//! These structs mirror the subset of the Bitbucket 2.0 API payloads the
//! migration needs. Fields that Bitbucket nulls out for deleted accounts or
//! pruned repositories are optional, so one removed user does not abort a
//! whole export.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A Bitbucket user reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

impl Actor {
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            display_name: None,
            account_id: None,
        }
    }
}

/// Rendered-content wrapper; only the raw markup matters for migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContent {
    #[serde(default)]
    pub raw: Option<String>,
}

impl RawContent {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
        }
    }
}

/// Issue tracker component reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRef {
    pub name: String,
}

/// An issue from the Bitbucket issue tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub content: RawContent,
    #[serde(default)]
    pub reporter: Option<Actor>,
    #[serde(default)]
    pub assignee: Option<Actor>,
    pub state: String,
    pub kind: String,
    pub priority: String,
    #[serde(default)]
    pub component: Option<ComponentRef>,
    pub created_on: String,
    pub updated_on: String,
}

/// Reference to the comment a reply answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentParent {
    pub id: u64,
}

/// Position of an inline pull-request comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineLocation {
    #[serde(default)]
    pub from: Option<u64>,
    #[serde(default)]
    pub to: Option<u64>,
    pub path: String,
}

/// A comment on an issue or pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: u64,
    #[serde(default)]
    pub user: Option<Actor>,
    #[serde(default)]
    pub content: RawContent,
    pub created_on: String,
    #[serde(default)]
    pub updated_on: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub parent: Option<CommentParent>,
    #[serde(default)]
    pub inline: Option<InlineLocation>,
}

/// Old and new value of one changed issue field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    #[serde(default)]
    pub old: String,
    #[serde(default)]
    pub new: String,
}

/// One entry of an issue's change log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: u64,
    #[serde(default)]
    pub user: Option<Actor>,
    pub created_on: String,
    #[serde(default)]
    pub changes: BTreeMap<String, FieldChange>,
}

/// A status update in a pull request's activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateActivity {
    #[serde(default)]
    pub state: Option<String>,
    pub date: String,
    #[serde(default)]
    pub author: Option<Actor>,
}

/// An approval in a pull request's activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalActivity {
    pub date: String,
    #[serde(default)]
    pub user: Option<Actor>,
}

/// One entry of a pull request's activity log. Bitbucket tags each entry
/// with exactly one of these keys; comment entries are intentionally not
/// modeled because comments are fetched through their own endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityRecord {
    #[serde(default)]
    pub update: Option<UpdateActivity>,
    #[serde(default)]
    pub approval: Option<ApprovalActivity>,
}

/// A hyperlink in a Bitbucket payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
}

/// Link collection attached to commits and attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    #[serde(default, rename = "self")]
    pub self_link: Option<Link>,
    #[serde(default)]
    pub html: Option<Link>,
}

/// A commit referenced from a pull-request endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub hash: String,
    #[serde(default)]
    pub links: Option<Links>,
}

/// A repository referenced from a pull-request endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub full_name: String,
}

/// A branch referenced from a pull-request endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    pub name: String,
}

/// Source or destination of a pull request. Bitbucket prunes any of these
/// fields once the underlying branch, commit or fork is gone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullEndpoint {
    #[serde(default)]
    pub branch: Option<BranchRef>,
    #[serde(default)]
    pub commit: Option<CommitRef>,
    #[serde(default)]
    pub repository: Option<RepositoryRef>,
}

/// A pull-request participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub user: Option<Actor>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub approved: bool,
}

/// A pull request. The list endpoint returns a reduced form; participants
/// and reviewers are only present when the pull request is fetched
/// individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub state: String,
    #[serde(default)]
    pub author: Option<Actor>,
    #[serde(default)]
    pub source: PullEndpoint,
    #[serde(default)]
    pub destination: PullEndpoint,
    #[serde(default)]
    pub merge_commit: Option<CommitRef>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub reviewers: Vec<Actor>,
    pub created_on: String,
    pub updated_on: String,
}

impl PullRequestRecord {
    /// Whether the pull request is still open on Bitbucket.
    pub fn is_open(&self) -> bool {
        self.state == "OPEN"
    }

    /// The full name of the repository the source branch lives in, when it
    /// differs from `own_repo`.
    pub fn fork_repository(&self, own_repo: &str) -> Option<&str> {
        let name = self.source.repository.as_ref()?.full_name.as_str();
        if name == own_repo {
            None
        } else {
            Some(name)
        }
    }
}

/// An attachment of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub name: String,
    #[serde(default)]
    pub links: Option<Links>,
}

impl AttachmentRecord {
    /// Download URL of the attachment content.
    pub fn content_url(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|l| l.self_link.as_ref())
            .map(|l| l.href.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_with_deleted_reporter() {
        let json = r#"{
            "id": 42,
            "title": "Crash on empty input",
            "content": {"raw": "It crashes.", "markup": "markdown"},
            "reporter": null,
            "assignee": {"nickname": "alice", "display_name": "Alice"},
            "state": "resolved",
            "kind": "bug",
            "priority": "major",
            "component": {"name": "parser"},
            "votes": 3,
            "created_on": "2019-05-02T10:21:39.320003+00:00",
            "updated_on": "2019-06-01T08:00:00.000000+00:00"
        }"#;
        let issue: IssueRecord = serde_json::from_str(json).unwrap();
        assert_eq!(issue.id, 42);
        assert!(issue.reporter.is_none());
        assert_eq!(issue.assignee.unwrap().nickname, "alice");
        assert_eq!(issue.component.unwrap().name, "parser");
        assert_eq!(issue.content.raw.as_deref(), Some("It crashes."));
    }

    #[test]
    fn test_inline_comment_with_parent() {
        let json = r#"{
            "id": 7,
            "user": {"nickname": "bob"},
            "content": {"raw": "Same here."},
            "created_on": "2020-01-01T00:00:00+00:00",
            "parent": {"id": 3},
            "inline": {"from": null, "to": 14, "path": "src/lib.rs"}
        }"#;
        let comment: CommentRecord = serde_json::from_str(json).unwrap();
        assert!(!comment.deleted);
        assert_eq!(comment.parent.unwrap().id, 3);
        let inline = comment.inline.unwrap();
        assert_eq!(inline.to, Some(14));
        assert_eq!(inline.path, "src/lib.rs");
    }

    #[test]
    fn test_pull_request_from_fork() {
        let json = r#"{
            "id": 12,
            "title": "Add widget support",
            "description": "See #3.",
            "state": "MERGED",
            "author": {"nickname": "carol"},
            "source": {
                "branch": {"name": "feature"},
                "commit": {"hash": "0a1b2c3d4e5f", "links": {"self": {"href": "https://api.example.org/commit/0a1b2c3d4e5f"}}},
                "repository": {"full_name": "carol/widget-fork"}
            },
            "destination": {
                "branch": {"name": "default"},
                "commit": {"hash": "f5e4d3c2b1a0"},
                "repository": {"full_name": "acme/widget"}
            },
            "merge_commit": {"hash": "abcdef012345"},
            "participants": [
                {"user": {"nickname": "dave"}, "role": "REVIEWER", "approved": true}
            ],
            "reviewers": [{"nickname": "dave"}],
            "created_on": "2020-02-02T12:00:00+00:00",
            "updated_on": "2020-02-03T12:00:00+00:00"
        }"#;
        let pr: PullRequestRecord = serde_json::from_str(json).unwrap();
        assert!(!pr.is_open());
        assert_eq!(pr.fork_repository("acme/widget"), Some("carol/widget-fork"));
        assert_eq!(pr.merge_commit.unwrap().hash, "abcdef012345");
        assert!(pr.participants[0].approved);
    }

    #[test]
    fn test_pull_request_with_pruned_source() {
        let json = r#"{
            "id": 2,
            "title": "Old fix",
            "state": "DECLINED",
            "source": {"branch": {"name": "fix"}, "commit": null, "repository": null},
            "destination": {"branch": {"name": "default"}},
            "created_on": "2018-01-01T00:00:00+00:00",
            "updated_on": "2018-01-01T00:00:00+00:00"
        }"#;
        let pr: PullRequestRecord = serde_json::from_str(json).unwrap();
        assert!(pr.source.commit.is_none());
        assert!(pr.fork_repository("acme/widget").is_none());
        assert!(pr.author.is_none());
    }

    #[test]
    fn test_activity_entries() {
        let update: ActivityRecord = serde_json::from_str(
            r#"{"update": {"state": "MERGED", "date": "2020-02-03T12:00:00+00:00", "author": {"nickname": "carol"}}}"#,
        )
        .unwrap();
        assert_eq!(update.update.unwrap().state.as_deref(), Some("MERGED"));

        let approval: ActivityRecord = serde_json::from_str(
            r#"{"approval": {"date": "2020-02-02T13:00:00+00:00", "user": {"nickname": "dave"}}}"#,
        )
        .unwrap();
        assert!(approval.update.is_none());
        assert_eq!(approval.approval.unwrap().user.unwrap().nickname, "dave");

        let comment: ActivityRecord = serde_json::from_str(r#"{"comment": {"id": 1}}"#).unwrap();
        assert!(comment.update.is_none() && comment.approval.is_none());
    }

    #[test]
    fn test_attachment_content_url() {
        let json = r#"{
            "name": "trace.log",
            "links": {"self": {"href": "https://api.example.org/attachments/trace.log"}}
        }"#;
        let attachment: AttachmentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(
            attachment.content_url(),
            Some("https://api.example.org/attachments/trace.log")
        );
    }
}
