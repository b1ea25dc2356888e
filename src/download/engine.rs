//! Download engine for concurrent URL downloads.
//!
//! The [`DownloadEngine`] fans a list of URLs out across a bounded pool of
//! tokio tasks, one task per URL. Each task acquires a pool slot, opens the
//! response, resolves a filename and streams the body to disk. A failing task
//! never aborts its siblings; every task ends in exactly one
//! [`TransferOutcome`], collected into a [`DownloadReport`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use urlgrab_core::{CancellationToken, DownloadEngine, HttpClient, TerminalProgress};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(4)?;
//! let urls = vec!["https://example.com/a.zip".to_string()];
//! let report = engine
//!     .run(
//!         &urls,
//!         Path::new("./downloads"),
//!         &HttpClient::new(),
//!         Arc::new(TerminalProgress::new()),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! println!("Completed: {}, Failed: {}", report.completed(), report.failed());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::HttpClient;
use super::copier::copy_stream;
use super::error::DownloadError;
use super::filename::{self, FilenameHints};
use super::task::{DownloadReport, DownloadTask, TransferOutcome};
use crate::progress::{ProgressSink, TaskId};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Error type for run-level failures, raised before any task is scheduled.
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

    /// The destination directory does not exist.
    #[error("destination directory does not exist: {}", path.display())]
    DestinationDoesNotExist {
        /// The missing path.
        path: PathBuf,
    },

    /// The destination exists but is not a directory.
    #[error("destination is not a directory: {}", path.display())]
    DestinationIsNotDirectory {
        /// The offending path.
        path: PathBuf,
    },
}

/// Download engine with a fixed-size pool.
///
/// # Concurrency Model
///
/// - Every URL gets its own tokio task and progress row up front
/// - A semaphore permit is acquired before the task opens its response
/// - The permit is held until the body is fully copied, so at most
///   `concurrency` streams are open at once
/// - Waiting for a permit and waiting on the network both race the
///   cancellation token
#[derive(Debug)]
pub struct DownloadEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    fail_on_http_error: bool,
}

impl DownloadEngine {
    /// Creates an engine allowing `concurrency` simultaneous downloads.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    ///
    /// # Example
    ///
    /// ```
    /// use urlgrab_core::DownloadEngine;
    ///
    /// let engine = DownloadEngine::new(4).unwrap();
    /// assert_eq!(engine.concurrency(), 4);
    /// ```
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }
        debug!(concurrency, "creating download engine");
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            fail_on_http_error: false,
        })
    }

    /// Treats non-2xx responses as failures instead of saving their body.
    #[must_use]
    pub fn with_fail_on_http_error(mut self, enabled: bool) -> Self {
        self.fail_on_http_error = enabled;
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Downloads every URL into `destination`.
    ///
    /// The destination is checked once, before any request is sent. After
    /// that, individual download failures do NOT cause this method to error:
    /// each one is logged through the sink and recorded in the report, which
    /// lists outcomes in completion order.
    ///
    /// # Errors
    ///
    /// - [`EngineError::DestinationDoesNotExist`] if `destination` is missing
    /// - [`EngineError::DestinationIsNotDirectory`] if it is not a directory
    #[instrument(
        skip_all,
        fields(destination = %destination.display(), urls = urls.len())
    )]
    pub async fn run(
        &self,
        urls: &[String],
        destination: &Path,
        client: &HttpClient,
        progress: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<DownloadReport, EngineError> {
        validate_destination(destination).await?;

        info!(concurrency = self.concurrency, "starting downloads");

        let mut tasks = JoinSet::new();
        let mut pending = HashMap::new();
        for url in urls {
            let fallback_filename = filename::url_filename(url);
            let task_id = progress.add_task(fallback_filename.as_deref().unwrap_or(url));
            let task = DownloadTask {
                url: url.clone(),
                destination: destination.to_path_buf(),
                fallback_filename,
                task_id,
            };
            let ctx = TaskContext {
                semaphore: Arc::clone(&self.semaphore),
                client: client.clone(),
                progress: Arc::clone(&progress),
                cancel: cancel.clone(),
                fail_on_http_error: self.fail_on_http_error,
            };
            let handle = tasks.spawn(download_one(task, ctx));
            pending.insert(handle.id(), (url.clone(), task_id));
        }

        debug!(task_count = pending.len(), "waiting for downloads to complete");

        let mut report = DownloadReport::default();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(e) => {
                    warn!(error = %e, "download task panicked");
                    let url = pending.get(&e.id()).map(|(url, _)| url.clone());
                    let outcome = TransferOutcome::failed(DownloadError::task_aborted(
                        url.unwrap_or_default(),
                        e.to_string(),
                    ));
                    (e.id(), outcome)
                }
            };
            let Some((url, task_id)) = pending.remove(&id) else {
                continue;
            };
            if outcome.is_failed() {
                progress.remove_task(task_id);
            }
            log_outcome(progress.as_ref(), &url, &outcome);
            report.record(url, outcome);
        }

        info!(
            completed = report.completed(),
            failed = report.failed(),
            cancelled = report.cancelled(),
            total = report.total(),
            "downloads finished"
        );
        Ok(report)
    }
}

async fn validate_destination(destination: &Path) -> Result<(), EngineError> {
    match tokio::fs::metadata(destination).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::DestinationIsNotDirectory {
            path: destination.to_path_buf(),
        }),
        Err(_) => Err(EngineError::DestinationDoesNotExist {
            path: destination.to_path_buf(),
        }),
    }
}

/// Everything a spawned task shares with the engine.
struct TaskContext {
    semaphore: Arc<Semaphore>,
    client: HttpClient,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    fail_on_http_error: bool,
}

#[instrument(skip(task, ctx), fields(url = %task.url))]
async fn download_one(task: DownloadTask, ctx: TaskContext) -> TransferOutcome {
    let progress = ctx.progress.as_ref();

    let _permit = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return cancelled(progress, task.task_id),
        permit = Arc::clone(&ctx.semaphore).acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => {
                return TransferOutcome::failed(DownloadError::task_aborted(
                    &task.url,
                    "download pool closed",
                ));
            }
        },
    };
    debug!("acquired download slot");

    let opened = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return cancelled(progress, task.task_id),
        opened = ctx.client.open(&task.url) => match opened {
            Ok(opened) => opened,
            Err(e) => return TransferOutcome::failed(e),
        },
    };

    let meta = opened.meta().clone();
    if !meta.is_success() {
        if ctx.fail_on_http_error {
            return TransferOutcome::failed(DownloadError::http_status(&task.url, meta.status));
        }
        warn!(status = meta.status, "server returned an error status, saving body anyway");
    }

    let hints = FilenameHints {
        content_disposition: meta.content_disposition.as_deref(),
        url_filename: task.fallback_filename.as_deref(),
        content_type: meta.content_type.as_deref(),
    };
    let resolved = filename::resolve_filename(&hints, &task.destination);
    debug!(filename = %resolved, source = ?resolved.source(), "resolved filename");
    progress.set_name(task.task_id, resolved.as_str());

    let path = task.destination.join(resolved.as_str());
    copy_stream(
        opened.into_body(),
        &path,
        meta.content_length,
        progress,
        task.task_id,
        &ctx.cancel,
    )
    .await
}

fn cancelled(progress: &dyn ProgressSink, task: TaskId) -> TransferOutcome {
    progress.remove_task(task);
    TransferOutcome::Cancelled
}

fn log_outcome(progress: &dyn ProgressSink, url: &str, outcome: &TransferOutcome) {
    match outcome {
        TransferOutcome::Success {
            bytes_written,
            path,
        } => {
            info!(url, path = %path.display(), bytes = bytes_written, "download completed");
            progress.log(&format!("Downloaded {url} to '{}'", path.display()));
        }
        TransferOutcome::Failed { reason } => {
            warn!(url, error = %reason, "download failed");
            progress.error(&format!("Failed to download '{url}': {reason}"));
        }
        TransferOutcome::Cancelled => debug!(url, "download cancelled"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::progress::RecordingProgress;
    use tempfile::TempDir;

    #[test]
    fn test_engine_new_accepts_bounds() {
        assert_eq!(DownloadEngine::new(1).unwrap().concurrency(), 1);
        assert_eq!(DownloadEngine::new(100).unwrap().concurrency(), 100);
    }

    #[test]
    fn test_engine_new_rejects_out_of_range() {
        assert!(matches!(
            DownloadEngine::new(0),
            Err(EngineError::InvalidConcurrency { value: 0 })
        ));
        assert!(matches!(
            DownloadEngine::new(101),
            Err(EngineError::InvalidConcurrency { value: 101 })
        ));
    }

    #[test]
    fn test_default_concurrency_is_sequential() {
        assert_eq!(DEFAULT_CONCURRENCY, 1);
        assert!(DownloadEngine::new(DEFAULT_CONCURRENCY).is_ok());
    }

    #[tokio::test]
    async fn test_run_missing_destination_fails_before_scheduling() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let progress = Arc::new(RecordingProgress::new());
        let engine = DownloadEngine::new(2).unwrap();

        let result = engine
            .run(
                &["http://127.0.0.1:1/a".to_string()],
                &missing,
                &HttpClient::new(),
                progress.clone(),
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(EngineError::DestinationDoesNotExist { .. })
        ));
        assert!(progress.events().is_empty());
    }

    #[tokio::test]
    async fn test_run_file_destination_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();
        let engine = DownloadEngine::new(1).unwrap();

        let result = engine
            .run(
                &[],
                &file,
                &HttpClient::new(),
                Arc::new(RecordingProgress::new()),
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(EngineError::DestinationIsNotDirectory { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_empty_url_list_returns_empty_report() {
        let dir = TempDir::new().unwrap();
        let engine = DownloadEngine::new(1).unwrap();

        let report = engine
            .run(
                &[],
                dir.path(),
                &HttpClient::new(),
                Arc::new(RecordingProgress::new()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.total(), 0);
    }

    #[tokio::test]
    async fn test_run_invalid_url_fails_and_is_logged() {
        let dir = TempDir::new().unwrap();
        let progress = Arc::new(RecordingProgress::new());
        let engine = DownloadEngine::new(1).unwrap();
        let url = "not a url".to_string();

        let report = engine
            .run(
                std::slice::from_ref(&url),
                dir.path(),
                &HttpClient::new(),
                progress.clone(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.outcome_for(&url),
            Some(TransferOutcome::Failed {
                reason: DownloadError::InvalidUrl { .. }
            })
        ));
        assert_eq!(
            progress.logs(),
            vec![format!("Failed to download '{url}': invalid URL: {url}")]
        );
    }

    #[tokio::test]
    async fn test_run_precancelled_token_cancels_every_task() {
        let dir = TempDir::new().unwrap();
        let engine = DownloadEngine::new(2).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let urls = vec![
            "http://127.0.0.1:1/a".to_string(),
            "http://127.0.0.1:1/b".to_string(),
        ];

        let report = engine
            .run(
                &urls,
                dir.path(),
                &HttpClient::new(),
                Arc::new(RecordingProgress::new()),
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(report.cancelled(), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
