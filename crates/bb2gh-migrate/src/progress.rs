//! Progress tracking for migration runs.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Progress update information.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current phase of the migration.
    pub phase: MigrationPhase,

    /// Current item being processed.
    pub current_item: Option<String>,

    /// Items completed in the current phase.
    pub completed: u64,

    /// Total items in the current phase.
    pub total: u64,

    /// Optional message.
    pub message: Option<String>,
}

/// Phases of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    /// Loading configuration and commit maps.
    Initializing,
    /// Fetching issues from Bitbucket.
    FetchingIssues,
    /// Fetching pull requests from Bitbucket.
    FetchingPullRequests,
    /// Uploading attachments to gists.
    MigratingAttachments,
    /// Assembling issue payloads.
    PreparingIssues,
    /// Uploading issues to GitHub.
    UploadingIssues,
    /// Recreating open pull requests.
    RecreatingPullRequests,
    /// Rewriting references in migrated issues.
    Relinking,
    /// Migration complete.
    Complete,
}

impl std::fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "Initializing"),
            Self::FetchingIssues => write!(f, "Fetching Bitbucket issues"),
            Self::FetchingPullRequests => write!(f, "Fetching Bitbucket pull requests"),
            Self::MigratingAttachments => write!(f, "Migrating attachments"),
            Self::PreparingIssues => write!(f, "Preparing issues"),
            Self::UploadingIssues => write!(f, "Uploading issues"),
            Self::RecreatingPullRequests => write!(f, "Recreating pull requests"),
            Self::Relinking => write!(f, "Rewriting references"),
            Self::Complete => write!(f, "Complete"),
        }
    }
}

/// Progress tracker shared across migration steps.
pub struct MigrationProgress {
    phase: AtomicU8,
    completed: AtomicU64,
    total: AtomicU64,
    callback: Option<Arc<ProgressCallback>>,
}

impl MigrationProgress {
    /// Create a new progress tracker.
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(0),
            completed: AtomicU64::new(0),
            total: AtomicU64::new(0),
            callback: None,
        }
    }

    /// Create a progress tracker with a callback.
    pub fn with_callback(callback: ProgressCallback) -> Self {
        Self {
            phase: AtomicU8::new(0),
            completed: AtomicU64::new(0),
            total: AtomicU64::new(0),
            callback: Some(Arc::new(callback)),
        }
    }

    /// Enter a phase, resetting the counters.
    pub fn set_phase(&self, phase: MigrationPhase, total: u64) {
        self.phase.store(phase as u8, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
        self.notify(None, None);
    }

    /// Mark one item of the current phase as done.
    pub fn increment(&self, item: Option<&str>) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.notify(item.map(|s| s.to_string()), None);
    }

    /// Publish a message without advancing.
    pub fn message(&self, msg: &str) {
        self.notify(None, Some(msg.to_string()));
    }

    /// Current progress percentage of the phase.
    pub fn percentage(&self) -> f64 {
        let total = self.total.load(Ordering::SeqCst);
        if total == 0 {
            return 0.0;
        }
        let completed = self.completed.load(Ordering::SeqCst);
        (completed as f64 / total as f64) * 100.0
    }

    /// Current phase.
    pub fn current_phase(&self) -> MigrationPhase {
        match self.phase.load(Ordering::SeqCst) {
            0 => MigrationPhase::Initializing,
            1 => MigrationPhase::FetchingIssues,
            2 => MigrationPhase::FetchingPullRequests,
            3 => MigrationPhase::MigratingAttachments,
            4 => MigrationPhase::PreparingIssues,
            5 => MigrationPhase::UploadingIssues,
            6 => MigrationPhase::RecreatingPullRequests,
            7 => MigrationPhase::Relinking,
            _ => MigrationPhase::Complete,
        }
    }

    fn notify(&self, current_item: Option<String>, message: Option<String>) {
        if let Some(callback) = &self.callback {
            let update = ProgressUpdate {
                phase: self.current_phase(),
                current_item,
                completed: self.completed.load(Ordering::SeqCst),
                total: self.total.load(Ordering::SeqCst),
                message,
            };
            callback(update);
        }
    }
}

impl Default for MigrationProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Console progress reporter using indicatif.
pub struct ConsoleProgressReporter {
    progress_bar: indicatif::ProgressBar,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter.
    pub fn new() -> Self {
        let progress_bar = indicatif::ProgressBar::new(100);
        progress_bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        Self { progress_bar }
    }

    /// Create a progress callback for use with a migration run.
    pub fn callback(&self) -> ProgressCallback {
        let pb = self.progress_bar.clone();
        Box::new(move |update: ProgressUpdate| {
            pb.set_length(update.total);
            pb.set_position(update.completed);

            let mut msg = update.phase.to_string();
            if let Some(item) = &update.current_item {
                msg = format!("{msg}: {item}");
            }
            if let Some(message) = &update.message {
                msg = format!("{msg} - {message}");
            }
            pb.set_message(msg);
        })
    }

    /// Finish the progress bar.
    pub fn finish(&self, message: &str) {
        self.progress_bar.finish_with_message(message.to_string());
    }
}

impl Default for ConsoleProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
