//! Per-URL task description, outcome, and the aggregated run report.

use std::path::PathBuf;

use super::error::DownloadError;
use crate::progress::TaskId;

/// One URL scheduled for download. Immutable once created.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    /// The URL to fetch.
    pub url: String,
    /// Validated destination directory.
    pub destination: PathBuf,
    /// Name derived from the URL path, if it has one.
    pub fallback_filename: Option<String>,
    /// Progress row for this task.
    pub task_id: TaskId,
}

/// Terminal state of one [`DownloadTask`].
#[derive(Debug)]
pub enum TransferOutcome {
    /// The whole body was written to `path`.
    Success {
        /// Bytes written to disk.
        bytes_written: u64,
        /// Final output path.
        path: PathBuf,
    },
    /// Stopped by the cancellation token; any partial file is left in place.
    Cancelled,
    /// The download failed; siblings are unaffected.
    Failed {
        /// Why it failed.
        reason: DownloadError,
    },
}

impl TransferOutcome {
    /// Wraps an error as a failed outcome.
    #[must_use]
    pub fn failed(reason: DownloadError) -> Self {
        Self::Failed { reason }
    }

    /// True for [`TransferOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// True for [`TransferOutcome::Cancelled`].
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True for [`TransferOutcome::Failed`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Outcomes of one engine run, in completion order.
#[derive(Debug, Default)]
pub struct DownloadReport {
    outcomes: Vec<(String, TransferOutcome)>,
}

impl DownloadReport {
    pub(crate) fn record(&mut self, url: String, outcome: TransferOutcome) {
        self.outcomes.push((url, outcome));
    }

    /// `(url, outcome)` pairs in the order tasks finished.
    #[must_use]
    pub fn outcomes(&self) -> &[(String, TransferOutcome)] {
        &self.outcomes
    }

    /// Outcome for `url`. With duplicate input URLs, the first to finish.
    #[must_use]
    pub fn outcome_for(&self, url: &str) -> Option<&TransferOutcome> {
        self.outcomes
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, outcome)| outcome)
    }

    /// Number of successful downloads.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.count(TransferOutcome::is_success)
    }

    /// Number of failed downloads.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(TransferOutcome::is_failed)
    }

    /// Number of cancelled downloads.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.count(TransferOutcome::is_cancelled)
    }

    /// Total number of tasks that reached a terminal state.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    fn count(&self, pred: fn(&TransferOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts_and_lookup() {
        let mut report = DownloadReport::default();
        report.record(
            "https://a/x".to_string(),
            TransferOutcome::Success {
                bytes_written: 3,
                path: PathBuf::from("x"),
            },
        );
        report.record("https://a/y".to_string(), TransferOutcome::Cancelled);
        report.record(
            "https://a/z".to_string(),
            TransferOutcome::failed(DownloadError::timeout("https://a/z")),
        );

        assert_eq!(report.completed(), 1);
        assert_eq!(report.cancelled(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.total(), 3);
        assert!(report.outcome_for("https://a/y").is_some_and(TransferOutcome::is_cancelled));
        assert!(report.outcome_for("https://a/missing").is_none());
    }
}
