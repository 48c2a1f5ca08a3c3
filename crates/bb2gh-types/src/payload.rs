//! Payloads uploaded to GitHub.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serde adapter for the timestamp format GitHub expects,
/// e.g. `2020-02-02T12:00:00Z`.
pub mod gh_date {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&text, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

/// A comment uploaded together with its issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentPayload {
    #[serde(with = "gh_date")]
    pub created_at: DateTime<Utc>,
    pub body: String,
}

/// Issue fields of an import request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueImportMeta {
    pub title: String,
    pub body: String,
    #[serde(with = "gh_date")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "gh_date")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub closed: bool,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Wire format of the GitHub bulk issue-import endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueImportPayload {
    pub issue: IssueImportMeta,
    #[serde(default)]
    pub comments: Vec<CommentPayload>,
}

/// A pull request recreated on GitHub. Unlike issue imports this is applied
/// through several ordinary API calls, so the struct is not a wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullPayload {
    pub title: String,
    pub body: String,
    /// Head branch in the converted Git repository.
    pub head: String,
    /// Base branch in the converted Git repository.
    pub base: String,
    pub closed: bool,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub reviewers: Vec<String>,
    #[serde(default)]
    pub comments: Vec<CommentPayload>,
}

/// One file of a gist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistFileContent {
    pub content: String,
}

/// Wire format of the gist creation endpoint, used to store issue
/// attachments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GistPayload {
    pub description: String,
    pub public: bool,
    pub files: BTreeMap<String, GistFileContent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 2, 2, 12, 30, 45).unwrap()
    }

    #[test]
    fn test_issue_payload_serialization() {
        let payload = IssueImportPayload {
            issue: IssueImportMeta {
                title: "Crash on empty input".to_string(),
                body: "It crashes.".to_string(),
                created_at: sample_date(),
                updated_at: sample_date(),
                assignee: None,
                closed: true,
                labels: vec!["bug".to_string()],
            },
            comments: vec![CommentPayload {
                created_at: sample_date(),
                body: "Same here.".to_string(),
            }],
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["issue"]["created_at"], "2020-02-02T12:30:45Z");
        assert_eq!(value["issue"]["closed"], true);
        // An absent assignee must be omitted, not serialized as null.
        assert!(value["issue"].get("assignee").is_none());
        assert_eq!(value["comments"][0]["body"], "Same here.");
    }

    #[test]
    fn test_assignee_serialized_when_present() {
        let meta = IssueImportMeta {
            title: "t".to_string(),
            body: "b".to_string(),
            created_at: sample_date(),
            updated_at: sample_date(),
            assignee: Some("alice-gh".to_string()),
            closed: false,
            labels: Vec::new(),
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["assignee"], "alice-gh");
    }

    #[test]
    fn test_gh_date_round_trip() {
        let payload = CommentPayload {
            created_at: sample_date(),
            body: "x".to_string(),
        };
        let text = serde_json::to_string(&payload).unwrap();
        let parsed: CommentPayload = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.created_at, payload.created_at);
    }

    #[test]
    fn test_gist_payload_shape() {
        let mut files = BTreeMap::new();
        files.insert(
            "trace.log".to_string(),
            GistFileContent {
                content: "boom".to_string(),
            },
        );
        let payload = GistPayload {
            description: "Attachments of issue #4".to_string(),
            public: true,
            files,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["files"]["trace.log"]["content"], "boom");
    }
}
