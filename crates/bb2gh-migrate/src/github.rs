//! GitHub REST client for the import side of the migration.
//!
//! Issues travel through GitHub's bulk import API, which preserves creation
//! dates and does not trip the anti-abuse limits the regular issue API
//! enforces. Everything else (pull requests, comment edits, gists) uses the
//! regular v3 endpoints. All writes are shaped so a repeated run converges
//! instead of duplicating: issues are patched in place, comments are
//! reconciled by position and gists are matched by description.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use bb2gh_types::payload::{
    CommentPayload, GistPayload, IssueImportMeta, IssueImportPayload, PullPayload,
};

use crate::error::{MigrateError, Result};

const GITHUB_API_URL: &str = "https://api.github.com";
const GOLDEN_COMET_ACCEPT: &str = "application/vnd.github.golden-comet-preview+json";
const USER_AGENT: &str = concat!("bb2gh/", env!("CARGO_PKG_VERSION"));
const PER_PAGE: usize = 100;

/// Longest pause between two polls of a pending bulk import.
const MAX_IMPORT_POLL_SECS: u64 = 5;

/// An issue as returned by the GitHub issue list. Pull requests appear in
/// this list too, tagged with a `pull_request` key.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueInfo {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

impl IssueInfo {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// A comment on a GitHub issue or pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentInfo {
    pub id: u64,
    #[serde(default)]
    pub body: String,
}

/// A branch endpoint of a GitHub pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct GitRefInfo {
    #[serde(rename = "ref")]
    pub ref_name: String,
}

/// A pull request as returned by the GitHub pull list.
#[derive(Debug, Clone, Deserialize)]
pub struct PullInfo {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub head: GitRefInfo,
    pub base: GitRefInfo,
}

/// One file of a gist.
#[derive(Debug, Clone, Deserialize)]
pub struct GistFileInfo {
    pub raw_url: String,
}

/// A gist of the authenticated user.
#[derive(Debug, Clone, Deserialize)]
pub struct Gist {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub html_url: String,
    #[serde(default)]
    pub files: BTreeMap<String, GistFileInfo>,
}

impl Gist {
    /// Direct download URL of one gist file.
    pub fn raw_url(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(|f| f.raw_url.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct ImportStatus {
    status: String,
    url: String,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct ReviewRequests {
    #[serde(default)]
    users: Vec<UserInfo>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    core: RateLimitCore,
}

#[derive(Debug, Deserialize)]
struct RateLimitCore {
    remaining: u64,
}

/// Client for the GitHub repository receiving the migration.
#[derive(Clone)]
pub struct GithubImport {
    base_url: String,
    token: String,
    repo: String,
    http: Client,
}

impl GithubImport {
    pub fn new(token: impl Into<String>, repo: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: GITHUB_API_URL.to_string(),
            token: token.into(),
            repo: repo.into(),
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(USER_AGENT)
                .build()?,
        })
    }

    /// Points the client at a different API root. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Full name of the target repository.
    pub fn repository(&self) -> &str {
        &self.repo
    }

    /// Resolve the repository, confirming the token can see it.
    pub async fn verify_repository(&self) -> Result<String> {
        let res = self
            .request(Method::GET, &format!("/repos/{}", self.repo))
            .send()
            .await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Err(MigrateError::RepositoryNotFound(self.repo.clone()));
        }
        let res = self.checked(res).await?;
        let info: RepositoryInfo = res.json().await?;
        Ok(info.full_name)
    }

    /// All issues of the repository, ascending by number, pull requests
    /// included.
    pub async fn get_issues(&self) -> Result<Vec<IssueInfo>> {
        let mut issues: Vec<IssueInfo> = self
            .paged_get(&format!("/repos/{}/issues", self.repo), &[("state", "all")])
            .await?;
        issues.sort_by_key(|issue| issue.number);
        Ok(issues)
    }

    /// Number of issues (pull requests included) the repository holds.
    pub async fn issue_count(&self) -> Result<u64> {
        Ok(self.get_issues().await?.len() as u64)
    }

    /// All pull requests of the repository, ascending by number.
    pub async fn get_pulls(&self) -> Result<Vec<PullInfo>> {
        let mut pulls: Vec<PullInfo> = self
            .paged_get(&format!("/repos/{}/pulls", self.repo), &[("state", "all")])
            .await?;
        pulls.sort_by_key(|pull| pull.number);
        Ok(pulls)
    }

    /// Comments of one issue or pull request, in creation order.
    pub async fn get_issue_comments(&self, number: u64) -> Result<Vec<IssueCommentInfo>> {
        self.paged_get(
            &format!("/repos/{}/issues/{number}/comments", self.repo),
            &[],
        )
        .await
    }

    /// Create one issue with its comments through the bulk import API,
    /// polling the status URL until the import settles. A failed import
    /// falls back to [`Self::slow_create_issue_with_comments`].
    pub async fn create_issue_with_comments(&self, payload: &IssueImportPayload) -> Result<()> {
        let res = self
            .request(Method::POST, &format!("/repos/{}/import/issues", self.repo))
            .header(header::ACCEPT, GOLDEN_COMET_ACCEPT)
            .json(payload)
            .send()
            .await?;
        let res = self.checked(res).await?;
        let mut import: ImportStatus = res.json().await?;

        let mut delay = 1;
        while import.status == "pending" {
            debug!("Issue import pending, checking again in {delay}s");
            tokio::time::sleep(Duration::from_secs(delay)).await;
            delay = (delay + 1).min(MAX_IMPORT_POLL_SECS);
            let res = self
                .request_url(Method::GET, &import.url)
                .header(header::ACCEPT, GOLDEN_COMET_ACCEPT)
                .send()
                .await?;
            let res = self.checked(res).await?;
            import = res.json().await?;
        }

        match import.status.as_str() {
            "imported" => Ok(()),
            "failed" => {
                warn!(
                    "Import of '{}' failed ({:?}), retrying through the regular API",
                    payload.issue.title, import.errors
                );
                self.slow_create_issue_with_comments(payload).await?;
                Ok(())
            }
            other => {
                warn!("Import of '{}' ended with status '{other}'", payload.issue.title);
                Ok(())
            }
        }
    }

    /// Create one issue through the regular API. Slower and subject to
    /// anti-abuse limits; only used when the bulk import rejects an issue.
    pub async fn slow_create_issue_with_comments(
        &self,
        payload: &IssueImportPayload,
    ) -> Result<u64> {
        let meta = &payload.issue;
        let res = self
            .request(Method::POST, &format!("/repos/{}/issues", self.repo))
            .json(&json!({
                "title": meta.title,
                "body": meta.body,
                "labels": meta.labels,
                "assignees": assignees(meta),
            }))
            .send()
            .await?;
        let res = self.checked(res).await?;
        let issue: IssueInfo = res.json().await?;
        if meta.closed {
            let res = self
                .request(
                    Method::PATCH,
                    &format!("/repos/{}/issues/{}", self.repo, issue.number),
                )
                .json(&json!({"state": "closed"}))
                .send()
                .await?;
            self.checked(res).await?;
        }
        self.update_issue_comments(issue.number, &payload.comments)
            .await?;
        Ok(issue.number)
    }

    /// Overwrite an existing issue with the assembled payload, then
    /// reconcile its comments.
    pub async fn update_issue_with_comments(
        &self,
        number: u64,
        payload: &IssueImportPayload,
    ) -> Result<()> {
        let meta = &payload.issue;
        let res = self
            .request(Method::PATCH, &format!("/repos/{}/issues/{number}", self.repo))
            .json(&json!({
                "title": meta.title,
                "body": meta.body,
                "labels": meta.labels,
                "state": if meta.closed { "closed" } else { "open" },
                "assignees": assignees(meta),
            }))
            .send()
            .await?;
        self.checked(res).await?;
        self.update_issue_comments(number, &payload.comments).await
    }

    /// Reconcile the live comments of one issue with the assembled list:
    /// comments are matched by position, edited when their text differs,
    /// created when missing and deleted when in excess.
    pub async fn update_issue_comments(
        &self,
        number: u64,
        comments: &[CommentPayload],
    ) -> Result<()> {
        let existing = self.get_issue_comments(number).await?;
        for (position, comment) in comments.iter().enumerate() {
            match existing.get(position) {
                Some(current) if current.body == comment.body => {
                    debug!(
                        "Comment {}/{} of issue #{number} is up to date",
                        position + 1,
                        comments.len()
                    );
                }
                Some(current) => {
                    debug!(
                        "Updating comment {}/{} of issue #{number}",
                        position + 1,
                        comments.len()
                    );
                    self.edit_comment_body(current.id, &comment.body).await?;
                }
                None => {
                    debug!(
                        "Creating comment {}/{} of issue #{number}",
                        position + 1,
                        comments.len()
                    );
                    let res = self
                        .request(
                            Method::POST,
                            &format!("/repos/{}/issues/{number}/comments", self.repo),
                        )
                        .json(&json!({"body": comment.body}))
                        .send()
                        .await?;
                    self.checked(res).await?;
                }
            }
        }
        for extra in existing.iter().skip(comments.len()) {
            debug!("Deleting extra comment {} of issue #{number}", extra.id);
            let res = self
                .request(
                    Method::DELETE,
                    &format!("/repos/{}/issues/comments/{}", self.repo, extra.id),
                )
                .send()
                .await?;
            self.checked(res).await?;
        }
        Ok(())
    }

    /// Create a real pull request with labels, assignees, review requests
    /// and comments.
    pub async fn create_pull_with_comments(&self, payload: &PullPayload) -> Result<u64> {
        let res = self
            .request(Method::POST, &format!("/repos/{}/pulls", self.repo))
            .json(&json!({
                "title": payload.title,
                "body": payload.body,
                "head": payload.head,
                "base": payload.base,
            }))
            .send()
            .await?;
        let res = self.checked(res).await?;
        let pull: PullInfo = res.json().await?;
        self.decorate_pull(pull.number, payload).await?;
        if !payload.reviewers.is_empty() {
            self.request_reviewers(pull.number, &payload.reviewers).await?;
        }
        for comment in &payload.comments {
            let res = self
                .request(
                    Method::POST,
                    &format!("/repos/{}/issues/{}/comments", self.repo, pull.number),
                )
                .json(&json!({"body": comment.body}))
                .send()
                .await?;
            self.checked(res).await?;
        }
        if payload.closed {
            let res = self
                .request(Method::PATCH, &format!("/repos/{}/pulls/{}", self.repo, pull.number))
                .json(&json!({"state": "closed"}))
                .send()
                .await?;
            self.checked(res).await?;
        }
        Ok(pull.number)
    }

    /// Overwrite an existing pull request, replacing its review requests
    /// and reconciling its comments.
    pub async fn update_pull_with_comments(
        &self,
        number: u64,
        payload: &PullPayload,
    ) -> Result<()> {
        let res = self
            .request(Method::PATCH, &format!("/repos/{}/pulls/{number}", self.repo))
            .json(&json!({
                "title": payload.title,
                "body": payload.body,
                "base": payload.base,
                "state": if payload.closed { "closed" } else { "open" },
            }))
            .send()
            .await?;
        self.checked(res).await?;
        self.decorate_pull(number, payload).await?;

        let res = self
            .request(
                Method::GET,
                &format!("/repos/{}/pulls/{number}/requested_reviewers", self.repo),
            )
            .send()
            .await?;
        let res = self.checked(res).await?;
        let requested: ReviewRequests = res.json().await?;
        if !requested.users.is_empty() {
            let logins: Vec<String> = requested.users.into_iter().map(|u| u.login).collect();
            let res = self
                .request(
                    Method::DELETE,
                    &format!("/repos/{}/pulls/{number}/requested_reviewers", self.repo),
                )
                .json(&json!({"reviewers": logins}))
                .send()
                .await?;
            self.checked(res).await?;
        }
        if !payload.reviewers.is_empty() {
            self.request_reviewers(number, &payload.reviewers).await?;
        }
        self.update_issue_comments(number, &payload.comments).await
    }

    /// Find the authenticated user's gist carrying the payload description
    /// and bring it up to date, or create it.
    pub async fn get_or_create_gist_by_description(&self, payload: &GistPayload) -> Result<Gist> {
        let gists: Vec<Gist> = self.paged_get("/gists", &[]).await?;
        let res = match gists.into_iter().find(|g| g.description == payload.description) {
            Some(gist) => {
                debug!("Updating existing gist '{}'", payload.description);
                self.request(Method::PATCH, &format!("/gists/{}", gist.id))
                    .json(payload)
                    .send()
                    .await?
            }
            None => {
                debug!("Creating gist '{}'", payload.description);
                self.request(Method::POST, "/gists")
                    .json(payload)
                    .send()
                    .await?
            }
        };
        let res = self.checked(res).await?;
        Ok(res.json().await?)
    }

    /// Close one issue without touching anything else on it.
    pub async fn close_issue(&self, number: u64) -> Result<()> {
        let res = self
            .request(Method::PATCH, &format!("/repos/{}/issues/{number}", self.repo))
            .json(&json!({"state": "closed"}))
            .send()
            .await?;
        self.checked(res).await?;
        Ok(())
    }

    /// Replace the body of one issue. Used by the relink pass.
    pub async fn edit_issue_body(&self, number: u64, body: &str) -> Result<()> {
        let res = self
            .request(Method::PATCH, &format!("/repos/{}/issues/{number}", self.repo))
            .json(&json!({"body": body}))
            .send()
            .await?;
        self.checked(res).await?;
        Ok(())
    }

    /// Replace the body of one comment. Used by the relink pass.
    pub async fn edit_comment_body(&self, comment_id: u64, body: &str) -> Result<()> {
        let res = self
            .request(
                Method::PATCH,
                &format!("/repos/{}/issues/comments/{comment_id}", self.repo),
            )
            .json(&json!({"body": body}))
            .send()
            .await?;
        self.checked(res).await?;
        Ok(())
    }

    /// Remaining core API quota of the token.
    pub async fn remaining_rate_limit(&self) -> Result<u64> {
        let res = self.request(Method::GET, "/rate_limit").send().await?;
        let res = self.checked(res).await?;
        let rate: RateLimitResponse = res.json().await?;
        Ok(rate.resources.core.remaining)
    }

    /// Labels and assignees live on the issue side of a pull request.
    async fn decorate_pull(&self, number: u64, payload: &PullPayload) -> Result<()> {
        let res = self
            .request(Method::PATCH, &format!("/repos/{}/issues/{number}", self.repo))
            .json(&json!({
                "labels": payload.labels,
                "assignees": payload.assignees,
            }))
            .send()
            .await?;
        self.checked(res).await?;
        Ok(())
    }

    async fn request_reviewers(&self, number: u64, reviewers: &[String]) -> Result<()> {
        let res = self
            .request(
                Method::POST,
                &format!("/repos/{}/pulls/{number}/requested_reviewers", self.repo),
            )
            .json(&json!({"reviewers": reviewers}))
            .send()
            .await?;
        self.checked(res).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, &format!("{}{path}", self.base_url))
    }

    fn request_url(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(header::AUTHORIZATION, format!("token {}", self.token))
    }

    async fn paged_get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut all = Vec::new();
        for page in 1.. {
            let res = self
                .request(Method::GET, path)
                .query(query)
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
                .send()
                .await?;
            let res = self.checked(res).await?;
            let batch: Vec<T> = res.json().await?;
            let batch_len = batch.len();
            all.extend(batch);
            if batch_len < PER_PAGE {
                break;
            }
        }
        Ok(all)
    }

    async fn checked(&self, res: Response) -> Result<Response> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let url = res.url().to_string();
        let body = res.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED => {
                MigrateError::AuthenticationFailed(format!("GitHub rejected the token: {body}"))
            }
            _ => MigrateError::ApiError(format!("GitHub API error {status} for {url}: {body}")),
        })
    }
}

fn assignees(meta: &IssueImportMeta) -> Vec<&str> {
    meta.assignee.iter().map(String::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GithubImport {
        GithubImport::new("test-token", "acme-org/widget")
            .unwrap()
            .with_base_url(server.uri())
    }

    fn import_payload(closed: bool) -> IssueImportPayload {
        IssueImportPayload {
            issue: IssueImportMeta {
                title: "Crash on empty input".to_string(),
                body: "It crashes.".to_string(),
                created_at: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
                updated_at: Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap(),
                assignee: None,
                closed,
                labels: vec!["bug".to_string()],
            },
            comments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_verify_repository() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme-org/widget"))
            .and(header("Authorization", "token test-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"full_name": "acme-org/widget"})),
            )
            .mount(&server)
            .await;

        let full_name = client(&server).verify_repository().await.unwrap();
        assert_eq!(full_name, "acme-org/widget");
    }

    #[tokio::test]
    async fn test_verify_repository_missing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme-org/widget"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).verify_repository().await.unwrap_err();
        assert!(matches!(err, MigrateError::RepositoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_bad_token_is_authentication_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme-org/widget/issues"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;

        let err = client(&server).get_issues().await.unwrap_err();
        assert!(matches!(err, MigrateError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn test_import_polls_until_imported() {
        let server = MockServer::start().await;
        let status_url = format!("{}/import-status/7", server.uri());

        Mock::given(method("POST"))
            .and(path("/repos/acme-org/widget/import/issues"))
            .and(header("Accept", GOLDEN_COMET_ACCEPT))
            .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
                "id": 7,
                "status": "pending",
                "url": status_url,
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/import-status/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 7,
                "status": "imported",
                "url": status_url,
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .create_issue_with_comments(&import_payload(true))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_import_falls_back_to_regular_api() {
        let server = MockServer::start().await;
        let status_url = format!("{}/import-status/8", server.uri());

        Mock::given(method("POST"))
            .and(path("/repos/acme-org/widget/import/issues"))
            .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
                "id": 8,
                "status": "failed",
                "url": status_url,
                "errors": [{"code": "invalid"}],
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/acme-org/widget/issues"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "number": 5,
                "title": "Crash on empty input",
                "state": "open",
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme-org/widget/issues/5/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        client(&server)
            .create_issue_with_comments(&import_payload(false))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_issue_comments_reconciles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme-org/widget/issues/3/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 11, "body": "unchanged"},
                {"id": 12, "body": "stale"},
                {"id": 13, "body": "extra"},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/repos/acme-org/widget/issues/comments/12"))
            .and(body_partial_json(serde_json::json!({"body": "fresh"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/repos/acme-org/widget/issues/comments/13"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let comments = vec![
            CommentPayload {
                created_at: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
                body: "unchanged".to_string(),
            },
            CommentPayload {
                created_at: Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap(),
                body: "fresh".to_string(),
            },
        ];
        client(&server)
            .update_issue_comments(3, &comments)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_gist_is_created_when_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/gists"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "abc123",
                "description": "Attachments for issue #1 of bitbucket repo acme/widget",
                "html_url": "https://gist.github.com/abc123",
                "files": {
                    "trace.log": {"raw_url": "https://gist.github.com/raw/trace.log"},
                },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let payload = GistPayload {
            description: "Attachments for issue #1 of bitbucket repo acme/widget".to_string(),
            public: true,
            files: BTreeMap::new(),
        };
        let gist = client(&server)
            .get_or_create_gist_by_description(&payload)
            .await
            .unwrap();
        assert_eq!(gist.id, "abc123");
        assert_eq!(
            gist.raw_url("trace.log"),
            Some("https://gist.github.com/raw/trace.log")
        );
    }

    #[tokio::test]
    async fn test_gist_is_updated_when_present() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "id": "abc123",
                    "description": "Attachments for issue #1 of bitbucket repo acme/widget",
                    "html_url": "https://gist.github.com/abc123",
                    "files": {},
                },
            ])))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/gists/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "abc123",
                "description": "Attachments for issue #1 of bitbucket repo acme/widget",
                "html_url": "https://gist.github.com/abc123",
                "files": {},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let payload = GistPayload {
            description: "Attachments for issue #1 of bitbucket repo acme/widget".to_string(),
            public: true,
            files: BTreeMap::new(),
        };
        let gist = client(&server)
            .get_or_create_gist_by_description(&payload)
            .await
            .unwrap();
        assert_eq!(gist.id, "abc123");
    }

    #[tokio::test]
    async fn test_get_issues_sorts_and_flags_pulls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme-org/widget/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"number": 3, "title": "newest", "state": "open",
                 "pull_request": {"url": "https://api.github.com/repos/acme-org/widget/pulls/3"}},
                {"number": 1, "title": "oldest", "state": "closed", "body": "text"},
            ])))
            .mount(&server)
            .await;

        let issues = client(&server).get_issues().await.unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].number, 1);
        assert!(!issues[0].is_pull_request());
        assert!(issues[1].is_pull_request());
    }

    #[tokio::test]
    async fn test_remaining_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resources": {"core": {"remaining": 4321, "limit": 5000}},
            })))
            .mount(&server)
            .await;

        assert_eq!(client(&server).remaining_rate_limit().await.unwrap(), 4321);
    }
}
