//! Post-migration relink pass.
//!
//! Bodies uploaded early in a migration wave may still carry Bitbucket
//! links and commit hashes that only became resolvable once the remaining
//! repositories were converted. This pass pulls every issue and comment
//! body back from GitHub, runs it through the reference rewriter again and
//! uploads only what changed.

use similar::TextDiff;
use tracing::{debug, info};

use crate::error::Result;
use crate::github::GithubImport;
use crate::rewrite::ReferenceRewriter;

/// Counters of one relink run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RelinkReport {
    pub issues_scanned: usize,
    pub issues_changed: usize,
    pub comments_changed: usize,
}

/// Rewrites already-uploaded issue and comment bodies in place.
pub struct Relinker {
    gimport: GithubImport,
    rewriter: ReferenceRewriter,
    dry_run: bool,
}

impl Relinker {
    pub fn new(gimport: GithubImport, rewriter: ReferenceRewriter, dry_run: bool) -> Self {
        Self {
            gimport,
            rewriter,
            dry_run,
        }
    }

    /// Rewrite all issue and comment bodies of the target repository. In
    /// dry-run mode the diffs are printed instead of applied; the report
    /// counts what a real run would change either way.
    pub async fn relink(&self) -> Result<RelinkReport> {
        let mut report = RelinkReport::default();
        let issues = self.gimport.get_issues().await?;
        info!(
            "Relinking {} issues on '{}'",
            issues.len(),
            self.gimport.repository()
        );

        for issue in &issues {
            report.issues_scanned += 1;
            if let Some(body) = &issue.body {
                let rewritten = self.rewriter.rewrite(body);
                if rewritten != *body {
                    info!("Relinking issue #{}", issue.number);
                    report.issues_changed += 1;
                    if self.dry_run {
                        print_diff(body, &rewritten);
                    } else {
                        self.gimport.edit_issue_body(issue.number, &rewritten).await?;
                    }
                } else {
                    debug!("Issue #{} is already fully linked", issue.number);
                }
            }
            for comment in self.gimport.get_issue_comments(issue.number).await? {
                let rewritten = self.rewriter.rewrite(&comment.body);
                if rewritten == comment.body {
                    continue;
                }
                info!(
                    "Relinking comment {} of issue #{}",
                    comment.id, issue.number
                );
                report.comments_changed += 1;
                if self.dry_run {
                    print_diff(&comment.body, &rewritten);
                } else {
                    self.gimport.edit_comment_body(comment.id, &rewritten).await?;
                }
            }
        }
        Ok(report)
    }
}

/// Print a unified diff between the stored and the rewritten body.
fn print_diff(old: &str, new: &str) {
    let separator = "#".repeat(50);
    println!("{separator}");
    print!("{}", TextDiff::from_lines(old, new).unified_diff());
    println!("{separator}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bb2gh_map::CommitMapIndex;
    use bb2gh_types::{MigrationConfig, RepositoryMapping};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rewriter() -> ReferenceRewriter {
        let config = MigrationConfig {
            repositories: vec![RepositoryMapping {
                source: "acme/widget".to_string(),
                target: "acme-org/widget".to_string(),
                issue_count: 100,
                commit_map: None,
            }],
            users: BTreeMap::new(),
            kinds: BTreeMap::new(),
            priorities: BTreeMap::new(),
            components: BTreeMap::new(),
            states: BTreeMap::new(),
            open_states: ["new".to_string()].into(),
            default_branch_rename: None,
        };
        ReferenceRewriter::new(&config, Arc::new(CommitMapIndex::new(Vec::new())), "acme/widget")
            .unwrap()
    }

    async fn mock_bodies(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/repos/acme-org/widget/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"number": 1, "title": "t", "body": "see #7 for details", "state": "open"},
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme-org/widget/issues/1/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 11, "body": "ping #8"},
            ])))
            .mount(server)
            .await;
    }

    fn relinker(server: &MockServer, dry_run: bool) -> Relinker {
        let gimport = GithubImport::new("token", "acme-org/widget")
            .unwrap()
            .with_base_url(server.uri());
        Relinker::new(gimport, rewriter(), dry_run)
    }

    #[tokio::test]
    async fn test_relink_rewrites_issue_and_comment_bodies() {
        let server = MockServer::start().await;
        mock_bodies(&server).await;
        Mock::given(method("PATCH"))
            .and(path("/repos/acme-org/widget/issues/1"))
            .and(body_partial_json(serde_json::json!({
                "body": "see https://github.com/acme-org/widget/issues/7 for details",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/repos/acme-org/widget/issues/comments/11"))
            .and(body_partial_json(serde_json::json!({
                "body": "ping https://github.com/acme-org/widget/issues/8",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let report = relinker(&server, false).relink().await.unwrap();
        assert_eq!(
            report,
            RelinkReport {
                issues_scanned: 1,
                issues_changed: 1,
                comments_changed: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_relink_dry_run_only_reads() {
        let server = MockServer::start().await;
        mock_bodies(&server).await;

        let report = relinker(&server, true).relink().await.unwrap();
        assert_eq!(report.issues_changed, 1);
        assert_eq!(report.comments_changed, 1);

        let requests = server.received_requests().await.unwrap();
        assert!(!requests.is_empty());
        assert!(requests.iter().all(|r| r.method.as_str() == "GET"));
    }
}
