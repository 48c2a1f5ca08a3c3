//! Bitbucket Cloud REST client for the export side of the migration.
//!
//! Everything is read-only. List endpoints use Bitbucket's cursor
//! pagination, where each page carries the absolute URL of the next one.
//! Pull requests are fetched twice on purpose: the list endpoint returns a
//! reduced record without participants and reviewers, so the migration
//! fetches each pull request individually when it needs the full form.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use bb2gh_types::record::{
    ActivityRecord, AttachmentRecord, ChangeRecord, CommentRecord, IssueRecord, PullRequestRecord,
};

use crate::error::{MigrateError, Result};

const BITBUCKET_API_URL: &str = "https://api.bitbucket.org/2.0";
const USER_AGENT: &str = concat!("bb2gh/", env!("CARGO_PKG_VERSION"));

/// Bitbucket hands out pull requests per state; these four cover every
/// state the API knows.
const PULL_STATES: [(&str, &str); 4] = [
    ("state", "MERGED"),
    ("state", "SUPERSEDED"),
    ("state", "OPEN"),
    ("state", "DECLINED"),
];

/// One page of a cursor-paginated Bitbucket response.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Page<T> {
    #[serde(default)]
    values: Vec<T>,
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

/// Client for the Bitbucket repository being exported.
#[derive(Clone)]
pub struct BitbucketExport {
    base_url: String,
    repo: String,
    credentials: Option<(String, String)>,
    http: Client,
}

impl BitbucketExport {
    pub fn new(repo: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: BITBUCKET_API_URL.to_string(),
            repo: repo.into(),
            credentials: None,
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(USER_AGENT)
                .build()?,
        })
    }

    /// Authenticate with a username and app password. Needed for private
    /// repositories and for attachment downloads.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        app_password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), app_password.into()));
        self
    }

    /// Points the client at a different API root. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Full name of the source repository.
    pub fn repository(&self) -> &str {
        &self.repo
    }

    /// All issues of the tracker, ascending by id.
    pub async fn get_issues(&self) -> Result<Vec<IssueRecord>> {
        debug!("Fetching all issues of '{}'", self.repo);
        let mut issues: Vec<IssueRecord> = self
            .paged_get(&format!("/repositories/{}/issues", self.repo), &[])
            .await?;
        issues.sort_by_key(|issue| issue.id);
        Ok(issues)
    }

    /// Comments of one issue, keyed by comment id.
    pub async fn get_issue_comments(&self, issue_id: u64) -> Result<BTreeMap<u64, CommentRecord>> {
        let comments: Vec<CommentRecord> = self
            .paged_get(
                &format!("/repositories/{}/issues/{issue_id}/comments", self.repo),
                &[],
            )
            .await?;
        Ok(comments.into_iter().map(|c| (c.id, c)).collect())
    }

    /// Change log of one issue, ascending by change id.
    pub async fn get_issue_changes(&self, issue_id: u64) -> Result<Vec<ChangeRecord>> {
        let mut changes: Vec<ChangeRecord> = self
            .paged_get(
                &format!("/repositories/{}/issues/{issue_id}/changes", self.repo),
                &[],
            )
            .await?;
        changes.sort_by_key(|change| change.id);
        Ok(changes)
    }

    /// Attachments of one issue, keyed by file name.
    pub async fn get_issue_attachments(
        &self,
        issue_id: u64,
    ) -> Result<BTreeMap<String, AttachmentRecord>> {
        let attachments: Vec<AttachmentRecord> = self
            .paged_get(
                &format!("/repositories/{}/issues/{issue_id}/attachments", self.repo),
                &[],
            )
            .await?;
        Ok(attachments
            .into_iter()
            .map(|a| (a.name.clone(), a))
            .collect())
    }

    /// Raw bytes of one attachment. The name lands in a path segment, so it
    /// is percent-encoded rather than formatted in.
    pub async fn get_issue_attachment_content(
        &self,
        issue_id: u64,
        name: &str,
    ) -> Result<Vec<u8>> {
        let issue_segment = issue_id.to_string();
        let mut url = Url::parse(&self.base_url)?;
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                MigrateError::ApiError(format!("Invalid base URL '{}'", self.base_url))
            })?;
            segments.push("repositories");
            segments.extend(self.repo.split('/'));
            segments.extend(["issues", issue_segment.as_str(), "attachments", name]);
        }
        let res = self.request_url(Method::GET, url.as_str()).send().await?;
        let res = self.checked(res).await?;
        Ok(res.bytes().await?.to_vec())
    }

    /// All pull requests in their reduced list form, ascending by id.
    pub async fn get_pulls_summary(&self) -> Result<Vec<PullRequestRecord>> {
        debug!("Fetching all pull request summaries of '{}'", self.repo);
        let mut pulls: Vec<PullRequestRecord> = self
            .paged_get(
                &format!("/repositories/{}/pullrequests", self.repo),
                &PULL_STATES,
            )
            .await?;
        pulls.sort_by_key(|pull| pull.id);
        Ok(pulls)
    }

    /// Number of pull requests the repository has ever had.
    pub async fn pull_count(&self) -> Result<u64> {
        let res = self
            .request(
                Method::GET,
                &format!("/repositories/{}/pullrequests", self.repo),
            )
            .query(&PULL_STATES)
            .send()
            .await?;
        let res = self.checked(res).await?;
        let page: Page<PullRequestRecord> = res.json().await?;
        page.size.ok_or_else(|| {
            MigrateError::ApiError("Pull request listing carries no size field".to_string())
        })
    }

    /// One pull request in its full form.
    pub async fn get_pull(&self, pull_id: u64) -> Result<PullRequestRecord> {
        let res = self
            .request(
                Method::GET,
                &format!("/repositories/{}/pullrequests/{pull_id}", self.repo),
            )
            .send()
            .await?;
        let res = self.checked(res).await?;
        Ok(res.json().await?)
    }

    /// All pull requests in their full form, ascending by id. Bitbucket ids
    /// are dense, so this walks `1..=count`.
    pub async fn get_pulls(&self) -> Result<Vec<PullRequestRecord>> {
        let count = self.pull_count().await?;
        debug!("Fetching {count} detailed pull requests of '{}'", self.repo);
        let mut pulls = Vec::with_capacity(count as usize);
        for pull_id in 1..=count {
            if pull_id % 10 == 0 {
                debug!("Fetched {pull_id}/{count} pull requests");
            }
            pulls.push(self.get_pull(pull_id).await?);
        }
        Ok(pulls)
    }

    /// Comments of one pull request, keyed by comment id.
    pub async fn get_pull_comments(&self, pull_id: u64) -> Result<BTreeMap<u64, CommentRecord>> {
        let comments: Vec<CommentRecord> = self
            .paged_get(
                &format!("/repositories/{}/pullrequests/{pull_id}/comments", self.repo),
                &[],
            )
            .await?;
        Ok(comments.into_iter().map(|c| (c.id, c)).collect())
    }

    /// Activity log of one pull request, in API order.
    pub async fn get_pull_activity(&self, pull_id: u64) -> Result<Vec<ActivityRecord>> {
        self.paged_get(
            &format!("/repositories/{}/pullrequests/{pull_id}/activity", self.repo),
            &[],
        )
        .await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, &format!("{}{path}", self.base_url))
    }

    fn request_url(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.credentials {
            Some((username, app_password)) => builder.basic_auth(username, Some(app_password)),
            None => builder,
        }
    }

    async fn paged_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut all = Vec::new();
        let mut next: Option<String> = None;
        loop {
            let builder = match &next {
                // The next URL already carries the cursor and query.
                Some(url) => self.request_url(Method::GET, url),
                None => self.request(Method::GET, path).query(query),
            };
            let res = builder.send().await?;
            let res = self.checked(res).await?;
            let page: Page<T> = res.json().await?;
            all.extend(page.values);
            match page.next {
                Some(url) => next = Some(url),
                None => break,
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
            StatusCode::UNAUTHORIZED => MigrateError::AuthenticationFailed(format!(
                "Bitbucket rejected the credentials: {body}"
            )),
            StatusCode::NOT_FOUND => MigrateError::RepositoryNotFound(self.repo.clone()),
            _ => MigrateError::ApiError(format!("Bitbucket API error {status} for {url}: {body}")),
        })
    }
}
