//! A single reference's trip through fetch, media gating and the store.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::download::{
    ContentFetcher, DedupStore, DownloadError, MediaTypeFilter, StoredFile, resolve_filename,
    resolve_media_type,
};
use crate::reference::ResourceReference;

/// Lifecycle state of a download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Scheduled but not started (dry runs stop here).
    Pending,
    /// Holding a concurrency permit.
    Running,
    /// Bytes are available at a path inside the target directory.
    Completed,
    /// Rejected by the media type allow-list.
    Skipped,
    /// Fetch, store or the task itself failed.
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// What a finished task produced.
#[derive(Debug)]
pub(crate) enum TaskOutcome {
    Completed(StoredFile),
    Skipped {
        media_type: String,
        retained: Option<PathBuf>,
    },
    Failed(DownloadError),
}

/// Shared, cloneable inputs for running tasks.
#[derive(Clone)]
pub(crate) struct TaskPipeline {
    pub(crate) fetcher: Arc<dyn ContentFetcher>,
    pub(crate) store: Arc<DedupStore>,
    pub(crate) media_filter: MediaTypeFilter,
    pub(crate) keep_all_files: bool,
}

impl TaskPipeline {
    /// Runs one task to completion. Never panics on task-level errors.
    pub(crate) async fn run(&self, reference: &ResourceReference) -> TaskOutcome {
        let payload = match self
            .fetcher
            .fetch(reference.fetch_url(), self.store.dir())
            .await
        {
            Ok(payload) => payload,
            Err(e) => return TaskOutcome::Failed(e),
        };

        let file_name = resolve_filename(payload.metadata(), reference.fetch_url());
        let media_type =
            resolve_media_type(payload.metadata().content_type.as_deref(), &file_name);
        debug!(
            reference = reference.reference(),
            file_name = %file_name,
            media_type = media_type.as_deref().unwrap_or("unknown"),
            bytes = payload.bytes(),
            "resolved payload"
        );

        match media_type {
            Some(media_type) if !self.media_filter.allows(&media_type) => {
                info!(
                    reference = reference.reference(),
                    media_type = %media_type,
                    "skipping unsupported media type"
                );
                let retained = if self.keep_all_files {
                    match payload.retain() {
                        Ok(path) => Some(path),
                        Err(e) => return TaskOutcome::Failed(e),
                    }
                } else {
                    if let Err(e) = payload.discard() {
                        return TaskOutcome::Failed(e);
                    }
                    None
                };
                return TaskOutcome::Skipped {
                    media_type,
                    retained,
                };
            }
            Some(_) => {}
            None => {
                warn!(
                    reference = reference.reference(),
                    file_name = %file_name,
                    "unable to determine media type, keeping file"
                );
            }
        }

        match self.store.store(payload, &file_name).await {
            Ok(stored) => TaskOutcome::Completed(stored),
            Err(e) => TaskOutcome::Failed(e),
        }
    }
}
