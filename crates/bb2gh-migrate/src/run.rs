//! End-to-end migration of one repository's discussions.
//!
//! The run mirrors attachments into gists first, then assembles every issue
//! and pull request into import payloads, and finally uploads them in
//! Bitbucket order so issue numbers survive the move. Re-running against a
//! partially migrated repository updates what already exists instead of
//! duplicating it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use bb2gh_map::CommitMapIndex;
use bb2gh_types::record::IssueRecord;
use bb2gh_types::MigrationConfig;

use crate::assemble::ContentAssembler;
use crate::bitbucket::BitbucketExport;
use crate::error::{MigrateError, Result};
use crate::github::{Gist, GithubImport};
use crate::progress::{MigrationPhase, MigrationProgress};

/// Knobs of one migration run.
#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    /// Leave attachments where they are instead of mirroring them into
    /// gists. Attachment sections still render, with dead links flagged.
    pub skip_attachments: bool,
}

/// Counters of one completed run of [`DiscussionMigrator::migrate`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub issues_created: usize,
    pub issues_updated: usize,
    /// GitHub issues beyond the Bitbucket range, closed as strays.
    pub issues_closed: usize,
    pub attachment_gists: usize,
}

/// Counters of one run of [`DiscussionMigrator::recreate_open_pulls`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PullRecreationReport {
    pub pulls_created: usize,
    pub pulls_updated: usize,
}

/// Drives a full discussion migration between one Bitbucket repository and
/// its GitHub target.
pub struct DiscussionMigrator {
    bexport: BitbucketExport,
    gimport: GithubImport,
    config: Arc<MigrationConfig>,
    assembler: ContentAssembler,
    options: MigrationOptions,
    progress: Arc<MigrationProgress>,
}

impl DiscussionMigrator {
    pub fn new(
        bexport: BitbucketExport,
        gimport: GithubImport,
        config: Arc<MigrationConfig>,
        index: Arc<CommitMapIndex>,
        options: MigrationOptions,
    ) -> Result<Self> {
        let assembler = ContentAssembler::new(Arc::clone(&config), index, bexport.repository())?;
        Ok(Self {
            bexport,
            gimport,
            config,
            assembler,
            options,
            progress: Arc::new(MigrationProgress::new()),
        })
    }

    /// Attach a shared progress tracker, e.g. one feeding a console bar.
    pub fn with_progress(mut self, progress: Arc<MigrationProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn assembler(&self) -> &ContentAssembler {
        &self.assembler
    }

    /// Migrate all issues and pull requests of the repository.
    ///
    /// Refuses to run when the configured issue count does not match the
    /// live tracker: numbering of every cross-repository link depends on
    /// that count, so a mismatch would corrupt references in other
    /// repositories as well.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        let own_repo = self.bexport.repository();
        self.progress.set_phase(MigrationPhase::Initializing, 0);
        self.gimport.verify_repository().await?;

        self.progress.set_phase(MigrationPhase::FetchingIssues, 0);
        let bissues = self.bexport.get_issues().await?;
        let mapping = self.config.require_mapping(own_repo)?;
        if mapping.issue_count != bissues.len() as u64 {
            return Err(MigrateError::IssueCountMismatch {
                repository: own_repo.to_string(),
                configured: mapping.issue_count,
                actual: bissues.len() as u64,
            });
        }

        self.progress.set_phase(MigrationPhase::FetchingPullRequests, 0);
        let bpulls = self.bexport.get_pulls().await?;
        info!(
            "Migrating {} issues and {} pull requests from '{own_repo}' to '{}'",
            bissues.len(),
            bpulls.len(),
            self.gimport.repository()
        );

        let gists = if self.options.skip_attachments {
            BTreeMap::new()
        } else {
            self.migrate_attachments(&bissues).await?
        };

        self.progress.set_phase(
            MigrationPhase::PreparingIssues,
            (bissues.len() + bpulls.len()) as u64,
        );
        let mut payloads = Vec::with_capacity(bissues.len() + bpulls.len());
        for issue in &bissues {
            let comments = self.bexport.get_issue_comments(issue.id).await?;
            let changes = self.bexport.get_issue_changes(issue.id).await?;
            let attachments = self.bexport.get_issue_attachments(issue.id).await?;
            payloads.push(self.assembler.issue_payload(
                issue,
                &comments,
                &changes,
                &attachments,
                gists.get(&issue.id),
            )?);
            self.progress.increment(Some(&format!("issue #{}", issue.id)));
        }
        for pull in &bpulls {
            let comments = self.bexport.get_pull_comments(pull.id).await?;
            let activity = self.bexport.get_pull_activity(pull.id).await?;
            payloads.push(self.assembler.pull_request_payload(pull, &comments, &activity)?);
            self.progress
                .increment(Some(&format!("pull request #{}", pull.id)));
        }

        self.progress
            .set_phase(MigrationPhase::UploadingIssues, payloads.len() as u64);
        let mut report = MigrationReport {
            attachment_gists: gists.len(),
            ..Default::default()
        };
        let gissues = self.gimport.get_issues().await?;
        for (idx, payload) in payloads.iter().enumerate() {
            let number = (idx + 1) as u64;
            match gissues.get(idx) {
                Some(existing) => {
                    // Issue numbers are assigned by arrival order, so any
                    // gap here means the target was tampered with and every
                    // later number would land wrong.
                    if existing.number != number {
                        return Err(MigrateError::ApiError(format!(
                            "issue numbering on '{}' is not dense: expected #{number}, found #{}",
                            self.gimport.repository(),
                            existing.number
                        )));
                    }
                    debug!("Updating issue #{number}: {}", payload.issue.title);
                    self.gimport
                        .update_issue_with_comments(number, payload)
                        .await?;
                    report.issues_updated += 1;
                }
                None => {
                    debug!("Creating issue #{number}: {}", payload.issue.title);
                    self.gimport.create_issue_with_comments(payload).await?;
                    report.issues_created += 1;
                }
            }
            self.progress.increment(Some(&payload.issue.title));
        }
        for stray in gissues.iter().skip(payloads.len()) {
            error!(
                "Issue #{} '{}' on '{}' has no Bitbucket counterpart, closing it",
                stray.number,
                stray.title,
                self.gimport.repository()
            );
            self.gimport.close_issue(stray.number).await?;
            report.issues_closed += 1;
        }

        let final_count = self.gimport.issue_count().await?;
        if final_count != payloads.len() as u64 {
            error!(
                "'{}' has {final_count} issues after migration, expected {}",
                self.gimport.repository(),
                payloads.len()
            );
        }

        self.progress.set_phase(MigrationPhase::Complete, 0);
        Ok(report)
    }

    /// Recreate every still-open pull request as a real GitHub pull
    /// request, on top of the converted Git branches. Pull requests whose
    /// head branch already carries a GitHub pull request are updated in
    /// place.
    pub async fn recreate_open_pulls(&self) -> Result<PullRecreationReport> {
        self.progress
            .set_phase(MigrationPhase::RecreatingPullRequests, 0);
        let bpulls = self.bexport.get_pulls().await?;
        let open: Vec<_> = bpulls.iter().filter(|pull| pull.is_open()).collect();
        info!(
            "Recreating {} open pull requests on '{}'",
            open.len(),
            self.gimport.repository()
        );
        self.progress
            .set_phase(MigrationPhase::RecreatingPullRequests, open.len() as u64);

        let gpulls = self.gimport.get_pulls().await?;
        let mut report = PullRecreationReport::default();
        for pull in open {
            let comments = self.bexport.get_pull_comments(pull.id).await?;
            let activity = self.bexport.get_pull_activity(pull.id).await?;
            let payload = self.assembler.pull_payload(pull, &comments, &activity)?;
            match gpulls.iter().find(|g| g.head.ref_name == payload.head) {
                Some(existing) => {
                    info!(
                        "Updating pull request #{} for head '{}'",
                        existing.number, payload.head
                    );
                    self.gimport
                        .update_pull_with_comments(existing.number, &payload)
                        .await?;
                    report.pulls_updated += 1;
                }
                None => {
                    let number = self.gimport.create_pull_with_comments(&payload).await?;
                    info!("Created pull request #{number} for head '{}'", payload.head);
                    report.pulls_created += 1;
                }
            }
            self.progress
                .increment(Some(&format!("pull request #{}", pull.id)));
        }

        self.progress.set_phase(MigrationPhase::Complete, 0);
        Ok(report)
    }

    /// Mirror every issue's attachments into one gist per issue. Returns
    /// the gists keyed by issue id, for link resolution while assembling
    /// issue bodies.
    async fn migrate_attachments(&self, issues: &[IssueRecord]) -> Result<BTreeMap<u64, Gist>> {
        self.progress
            .set_phase(MigrationPhase::MigratingAttachments, issues.len() as u64);
        let mut gists = BTreeMap::new();
        for issue in issues {
            let attachments = self.bexport.get_issue_attachments(issue.id).await?;
            if attachments.is_empty() {
                self.progress.increment(None);
                continue;
            }
            let mut files = Vec::with_capacity(attachments.len());
            for name in attachments.keys() {
                let content = match self
                    .bexport
                    .get_issue_attachment_content(issue.id, name)
                    .await
                {
                    Ok(content) => content,
                    Err(err) => {
                        warn!(
                            "Could not download attachment '{name}' of issue #{}: {err}",
                            issue.id
                        );
                        Vec::new()
                    }
                };
                files.push((name.clone(), content));
            }
            let payload = self.assembler.attachment_gist(issue.id, &files);
            let gist = self.gimport.get_or_create_gist_by_description(&payload).await?;
            info!(
                "Attachments of issue #{} are mirrored at {}",
                issue.id, gist.html_url
            );
            gists.insert(issue.id, gist);
            self.progress.increment(Some(&format!("issue #{}", issue.id)));
        }
        Ok(gists)
    }
}

/// Load and cross-check the commit maps of every configured repository
/// that names one.
pub fn load_commit_index(config: &MigrationConfig) -> Result<CommitMapIndex> {
    let pairs: Vec<(String, PathBuf)> = config
        .repositories
        .iter()
        .filter_map(|mapping| {
            mapping
                .commit_map
                .as_ref()
                .map(|path| (mapping.source.clone(), path.clone()))
        })
        .collect();
    let index = CommitMapIndex::load(&pairs)?;
    let problems = index.check();
    if problems > 0 {
        warn!("The loaded commit maps have {problems} consistency problems");
    }
    debug!("Loaded {} commit mappings", index.len());
    Ok(index)
}
