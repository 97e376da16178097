//! Download coordinator: one task per distinct reference, bounded concurrency.
//!
//! # Concurrency Model
//!
//! - Each download runs in its own Tokio task
//! - A semaphore permit is acquired before spawning each task
//! - Permits are released automatically when tasks finish (RAII)
//! - Results are collected only after every task has finished
//!
//! Same-name races between tasks are settled inside the [`DedupStore`] by
//! no-clobber renames, so the coordinator holds no locks of its own.

mod task;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use self::task::{TaskOutcome, TaskPipeline};
pub use self::task::TaskState;
use super::{
    ContentFetcher, DedupStore, FailureKind, HttpClient, MediaTypeFilter, StoreDisposition,
};
use crate::config::LocalizeConfig;
use crate::reference::{ResourceReference, dedupe_references};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Errors that abort a whole run.
///
/// Individual task failures never surface here; they are recorded in the
/// [`RunReport`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The target directory does not exist when the run starts.
    #[error("target directory does not exist: {path}")]
    TargetDirectoryMissing {
        /// The configured target directory.
        path: PathBuf,
    },

    /// The target directory disappeared while the run was in progress.
    #[error("target directory became unavailable during the run: {path}")]
    TargetDirectoryUnavailable {
        /// The configured target directory.
        path: PathBuf,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Counters for one run.
///
/// Task outcomes are tallied by the coordinator; the running gauge is
/// updated from inside spawned tasks.
#[derive(Debug, Default)]
struct DownloadStats {
    completed: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    running: AtomicUsize,
    peak_running: AtomicUsize,
}

impl DownloadStats {
    fn enter_running(self: &Arc<Self>) -> RunningGuard {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_running.fetch_max(now, Ordering::SeqCst);
        RunningGuard(Arc::clone(self))
    }

    fn record(&self, state: TaskState) {
        let counter = match state {
            TaskState::Completed => &self.completed,
            TaskState::Skipped => &self.skipped,
            TaskState::Failed => &self.failed,
            TaskState::Pending | TaskState::Running => return,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self, scheduled: usize) -> RunStats {
        RunStats {
            scheduled,
            completed: self.completed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            peak_running: self.peak_running.load(Ordering::SeqCst),
        }
    }
}

/// Decrements the running gauge on drop.
struct RunningGuard(Arc<DownloadStats>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Summary counts for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Distinct references scheduled.
    pub scheduled: usize,
    /// Tasks whose bytes are in the target directory.
    pub completed: usize,
    /// Tasks rejected by the media type allow-list.
    pub skipped: usize,
    /// Tasks that failed.
    pub failed: usize,
    /// Highest number of tasks running at the same time.
    pub peak_running: usize,
}

/// Reference text to local path, for every completed task whose path
/// differs from its reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultMapping(HashMap<String, PathBuf>);

impl ResultMapping {
    /// Local path for a reference, if one was produced.
    #[must_use]
    pub fn get(&self, reference: &str) -> Option<&Path> {
        self.0.get(reference).map(PathBuf::as_path)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no reference was mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    fn insert(&mut self, reference: String, path: PathBuf) {
        self.0.insert(reference, path);
    }
}

impl FromIterator<(String, PathBuf)> for ResultMapping {
    fn from_iter<T: IntoIterator<Item = (String, PathBuf)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One distinct reference and what became of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadTask {
    /// Reference text as found in the document.
    pub reference: String,
    /// URL the bytes were (or would be) fetched from.
    pub fetch_url: String,
    /// Directory the bytes are stored in.
    pub target_dir: PathBuf,
    /// Terminal state; `Pending` in a dry run.
    pub state: TaskState,
    /// Final path for completed tasks, retained temp path for kept skips.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// How a completed payload was stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposition: Option<StoreDisposition>,
    /// Rejected media type for skipped tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Failure message for failed tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure classification; absent when a task panicked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
}

impl DownloadTask {
    fn pending(reference: &ResourceReference, target_dir: &Path) -> Self {
        Self {
            reference: reference.reference().to_string(),
            fetch_url: reference.fetch_url().to_string(),
            target_dir: target_dir.to_path_buf(),
            state: TaskState::Pending,
            path: None,
            disposition: None,
            media_type: None,
            error: None,
            failure_kind: None,
        }
    }

    fn finish(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Completed(stored) => {
                self.state = TaskState::Completed;
                self.path = Some(stored.path);
                self.disposition = Some(stored.disposition);
            }
            TaskOutcome::Skipped {
                media_type,
                retained,
            } => {
                self.state = TaskState::Skipped;
                self.media_type = Some(media_type);
                self.path = retained;
            }
            TaskOutcome::Failed(error) => {
                self.state = TaskState::Failed;
                self.failure_kind = Some(error.kind());
                self.error = Some(error.to_string());
            }
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// One report per distinct reference, in first-seen order.
    pub tasks: Vec<DownloadTask>,
    /// Reference to local path entries.
    pub mapping: ResultMapping,
    /// Summary counts.
    pub stats: RunStats,
}

impl RunReport {
    /// Reference to local path entries.
    #[must_use]
    pub fn mapping(&self) -> &ResultMapping {
        &self.mapping
    }

    /// Per-reference reports in first-seen order.
    #[must_use]
    pub fn tasks(&self) -> &[DownloadTask] {
        &self.tasks
    }

    /// Summary counts.
    #[must_use]
    pub fn stats(&self) -> RunStats {
        self.stats
    }
}

/// Runs download tasks for a set of references.
pub struct DownloadEngine {
    /// Semaphore for concurrency control.
    semaphore: Arc<Semaphore>,
    /// Configured concurrency limit.
    concurrency: usize,
    fetcher: Arc<dyn ContentFetcher>,
    media_filter: MediaTypeFilter,
    keep_all_files: bool,
    dry_run: bool,
}

impl fmt::Debug for DownloadEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadEngine")
            .field("concurrency", &self.concurrency)
            .field("media_filter", &self.media_filter)
            .field("keep_all_files", &self.keep_all_files)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl DownloadEngine {
    /// Creates an engine with the default media filter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    #[instrument(level = "debug", skip(fetcher))]
    pub fn new(concurrency: usize, fetcher: Arc<dyn ContentFetcher>) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(concurrency, "creating download engine");

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            fetcher,
            media_filter: MediaTypeFilter::default(),
            keep_all_files: false,
            dry_run: false,
        })
    }

    /// Creates an engine backed by an [`HttpClient`] built from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] for an out-of-range
    /// `max_concurrency`.
    pub fn from_config(config: &LocalizeConfig) -> Result<Self, EngineError> {
        let client =
            HttpClient::new_with_timeouts(config.connect_timeout_secs, config.read_timeout_secs);
        Ok(Self::new(config.max_concurrency, Arc::new(client))?
            .with_media_filter(config.allowed_media_types.clone())
            .with_keep_all_files(config.keep_all_files)
            .with_dry_run(config.dry_run))
    }

    /// Replaces the media type allow-list.
    #[must_use]
    pub fn with_media_filter(mut self, filter: MediaTypeFilter) -> Self {
        self.media_filter = filter;
        self
    }

    /// Keeps rejected payloads under their temporary names.
    #[must_use]
    pub fn with_keep_all_files(mut self, keep: bool) -> Self {
        self.keep_all_files = keep;
        self
    }

    /// Reports tasks without fetching or touching the filesystem.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Downloads every distinct reference into `target_dir`.
    ///
    /// Duplicate reference strings share one task. Task failures are
    /// recorded in the report and never abort the run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TargetDirectoryMissing`] if `target_dir` is
    /// not a directory when the run starts (no task is scheduled), and
    /// [`EngineError::TargetDirectoryUnavailable`] if it disappears before
    /// every task was started; tasks already running are awaited first.
    #[instrument(skip(self, references), fields(target_dir = %target_dir.display()))]
    pub async fn run<I, S>(&self, references: I, target_dir: &Path) -> Result<RunReport, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !target_dir.is_dir() {
            return Err(EngineError::TargetDirectoryMissing {
                path: target_dir.to_path_buf(),
            });
        }

        let references = dedupe_references(references);
        let mut reports: Vec<DownloadTask> = references
            .iter()
            .map(|reference| DownloadTask::pending(reference, target_dir))
            .collect();
        let stats = Arc::new(DownloadStats::default());

        info!(tasks = references.len(), dry_run = self.dry_run, "starting run");

        if self.dry_run {
            for reference in &references {
                info!(
                    reference = reference.reference(),
                    fetch_url = reference.fetch_url(),
                    "would download"
                );
            }
            return Ok(RunReport {
                dry_run: true,
                tasks: reports,
                mapping: ResultMapping::default(),
                stats: stats.snapshot(references.len()),
            });
        }

        let pipeline = TaskPipeline {
            fetcher: Arc::clone(&self.fetcher),
            store: Arc::new(DedupStore::new(target_dir)),
            media_filter: self.media_filter.clone(),
            keep_all_files: self.keep_all_files,
        };
        let mut handles = Vec::with_capacity(references.len());
        let mut vanished = false;

        for (index, reference) in references.into_iter().enumerate() {
            // Acquire semaphore permit (blocks if at concurrency limit)
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| EngineError::SemaphoreClosed)?;

            if !target_dir.is_dir() {
                warn!("target directory disappeared, not starting remaining tasks");
                vanished = true;
                break;
            }

            reports[index].state = TaskState::Running;
            let pipeline = pipeline.clone();
            let stats = Arc::clone(&stats);

            handles.push((
                index,
                tokio::spawn(async move {
                    let _permit = permit;
                    let _running = stats.enter_running();
                    pipeline.run(&reference).await
                }),
            ));
        }

        debug!(task_count = handles.len(), "waiting for downloads to complete");

        let mut mapping = ResultMapping::default();
        for (index, handle) in handles {
            let report = &mut reports[index];
            match handle.await {
                Ok(outcome) => report.finish(outcome),
                Err(e) => {
                    report.state = TaskState::Failed;
                    report.error = Some(format!("download task panicked: {e}"));
                }
            }
            stats.record(report.state);

            match report.state {
                TaskState::Completed => {
                    if let Some(path) = &report.path {
                        info!(reference = %report.reference, path = %path.display(), "download completed");
                        if path.to_string_lossy() != report.reference {
                            mapping.insert(report.reference.clone(), path.clone());
                        }
                    }
                }
                TaskState::Failed => {
                    warn!(
                        reference = %report.reference,
                        fetch_url = %report.fetch_url,
                        error = report.error.as_deref().unwrap_or_default(),
                        "download failed"
                    );
                }
                _ => {}
            }
        }

        if vanished {
            return Err(EngineError::TargetDirectoryUnavailable {
                path: target_dir.to_path_buf(),
            });
        }

        let stats = stats.snapshot(reports.len());
        info!(
            completed = stats.completed,
            skipped = stats.skipped,
            failed = stats.failed,
            peak_running = stats.peak_running,
            "run complete"
        );

        Ok(RunReport {
            dry_run: false,
            tasks: reports,
            mapping,
            stats,
        })
    }
}
