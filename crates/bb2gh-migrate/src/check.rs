//! Pre-migration consistency checks.
//!
//! A real run refuses to start on a wrong issue count, but everything else
//! here only produces findings. The check walks both repositories without
//! writing anything, so it is safe to run as often as needed while the
//! configuration is being put together.

use std::collections::BTreeSet;

use tracing::{error, info, warn};

use bb2gh_types::record::{CommentRecord, PullRequestRecord};
use bb2gh_types::MigrationConfig;

use crate::bitbucket::BitbucketExport;
use crate::error::Result;
use crate::github::GithubImport;

/// Findings of one consistency check.
#[derive(Debug, Default)]
pub struct CheckReport {
    /// Issues in the Bitbucket tracker.
    pub bitbucket_issues: usize,
    /// Pull requests in the Bitbucket repository.
    pub bitbucket_pulls: usize,
    /// Issues (pull requests included) already on GitHub.
    pub github_issues: u64,
    /// Nicknames appearing in the export without a user-table entry.
    pub unmapped_users: BTreeSet<String>,
    /// Problems that would make a migration produce wrong numbering.
    pub errors: Vec<String>,
    /// Problems a migration would survive, at a quality cost.
    pub warnings: Vec<String>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty() && self.unmapped_users.is_empty()
    }

    fn error(&mut self, message: String) {
        error!("{message}");
        self.errors.push(message);
    }

    fn warning(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

/// Compare the configuration against the live state of both repositories
/// and sweep the export for unmapped users.
pub async fn check_migration(
    bexport: &BitbucketExport,
    gimport: &GithubImport,
    config: &MigrationConfig,
) -> Result<CheckReport> {
    let own_repo = bexport.repository();
    let mut report = CheckReport::default();

    let issues = bexport.get_issues().await?;
    let pulls = bexport.get_pulls().await?;
    let github_issues = gimport.issue_count().await?;
    report.bitbucket_issues = issues.len();
    report.bitbucket_pulls = pulls.len();
    report.github_issues = github_issues;
    info!(
        "'{own_repo}' has {} issues and {} pull requests, '{}' has {github_issues} issues",
        issues.len(),
        pulls.len(),
        gimport.repository()
    );

    if github_issues != 0 {
        report.warning(format!(
            "GitHub repository '{}' already has issues, so the migration cannot \
             preserve creation dates of issues and pull requests",
            gimport.repository()
        ));
    }
    let expected_max = issues.len() + pulls.len();
    if github_issues > expected_max as u64 {
        report.error(format!(
            "GitHub repository '{}' has {github_issues} issues, but the maximum \
             should be {expected_max} ({} issues and {} pull requests)",
            gimport.repository(),
            issues.len(),
            pulls.len()
        ));
    }

    match config.mapping(own_repo) {
        None => report.error(format!(
            "Bitbucket repository '{own_repo}' is not configured"
        )),
        Some(mapping) => {
            if mapping.issue_count != issues.len() as u64 {
                report.error(format!(
                    "Repository '{own_repo}' is configured with {} issues, but the \
                     tracker has {}",
                    mapping.issue_count,
                    issues.len()
                ));
            }
            if mapping.target != gimport.repository() {
                report.error(format!(
                    "Repository '{own_repo}' is configured to migrate to '{}', but \
                     the GitHub repository is '{}'",
                    mapping.target,
                    gimport.repository()
                ));
            }
        }
    }

    // Sweep every nickname the migrated text will attribute.
    let mut nicknames = BTreeSet::new();
    for issue in &issues {
        if let Some(reporter) = &issue.reporter {
            nicknames.insert(reporter.nickname.clone());
        }
        if let Some(assignee) = &issue.assignee {
            nicknames.insert(assignee.nickname.clone());
        }
        collect_comment_users(&mut nicknames, bexport.get_issue_comments(issue.id).await?);
    }
    for pull in &pulls {
        collect_pull_users(&mut nicknames, pull);
        collect_comment_users(&mut nicknames, bexport.get_pull_comments(pull.id).await?);
    }
    for nickname in nicknames {
        if !config.users.contains_key(&nickname) {
            warn!("Bitbucket user '{nickname}' is not configured in the user table");
            report.unmapped_users.insert(nickname);
        }
    }

    Ok(report)
}

fn collect_comment_users(
    nicknames: &mut BTreeSet<String>,
    comments: std::collections::BTreeMap<u64, CommentRecord>,
) {
    for comment in comments.values() {
        if let Some(user) = &comment.user {
            nicknames.insert(user.nickname.clone());
        }
    }
}

fn collect_pull_users(nicknames: &mut BTreeSet<String>, pull: &PullRequestRecord) {
    if let Some(author) = &pull.author {
        nicknames.insert(author.nickname.clone());
    }
    for participant in &pull.participants {
        if let Some(user) = &participant.user {
            nicknames.insert(user.nickname.clone());
        }
    }
    for reviewer in &pull.reviewers {
        nicknames.insert(reviewer.nickname.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bb2gh_types::RepositoryMapping;
    use std::collections::BTreeMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(issue_count: u64) -> MigrationConfig {
        MigrationConfig {
            repositories: vec![RepositoryMapping {
                source: "acme/widget".to_string(),
                target: "acme-org/widget".to_string(),
                issue_count,
                commit_map: None,
            }],
            users: [("alice".to_string(), Some("alice-gh".to_string()))].into(),
            kinds: BTreeMap::new(),
            priorities: BTreeMap::new(),
            components: BTreeMap::new(),
            states: BTreeMap::new(),
            open_states: ["new".to_string()].into(),
            default_branch_rename: None,
        }
    }

    async fn mock_bitbucket(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/repositories/acme/widget/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [{
                    "id": 1,
                    "title": "One",
                    "reporter": {"nickname": "alice"},
                    "assignee": {"nickname": "stranger"},
                    "state": "new",
                    "kind": "bug",
                    "priority": "major",
                    "created_on": "2020-01-01T00:00:00+00:00",
                    "updated_on": "2020-01-01T00:00:00+00:00",
                }],
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/acme/widget/issues/1/comments"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"values": []})),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/acme/widget/pullrequests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [],
                "size": 0,
            })))
            .mount(server)
            .await;
    }

    async fn mock_github(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/repos/acme-org/widget/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_check_reports_count_mismatch_and_unmapped_user() {
        let bserver = MockServer::start().await;
        let gserver = MockServer::start().await;
        mock_bitbucket(&bserver).await;
        mock_github(&gserver).await;

        let bexport = BitbucketExport::new("acme/widget")
            .unwrap()
            .with_base_url(bserver.uri());
        let gimport = GithubImport::new("token", "acme-org/widget")
            .unwrap()
            .with_base_url(gserver.uri());

        let report = check_migration(&bexport, &gimport, &config(99))
            .await
            .unwrap();

        assert_eq!(report.bitbucket_issues, 1);
        assert_eq!(report.bitbucket_pulls, 0);
        assert_eq!(report.github_issues, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("configured with 99 issues"));
        assert_eq!(
            report.unmapped_users,
            ["stranger".to_string()].into_iter().collect()
        );
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_check_passes_on_consistent_setup() {
        let bserver = MockServer::start().await;
        let gserver = MockServer::start().await;
        mock_bitbucket(&bserver).await;
        mock_github(&gserver).await;

        let bexport = BitbucketExport::new("acme/widget")
            .unwrap()
            .with_base_url(bserver.uri());
        let gimport = GithubImport::new("token", "acme-org/widget")
            .unwrap()
            .with_base_url(gserver.uri());

        let mut config = config(1);
        config
            .users
            .insert("stranger".to_string(), Some("stranger-gh".to_string()));

        let report = check_migration(&bexport, &gimport, &config).await.unwrap();
        assert!(report.errors.is_empty());
        assert!(report.is_clean());
    }
}
