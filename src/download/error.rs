//! Error types for the download module.
//!
//! [`DownloadError`] is scoped to a single URL and ends up inside
//! [`TransferOutcome::Failed`](super::TransferOutcome::Failed). Run-level
//! precondition failures live in [`EngineError`](super::EngineError).

use std::path::PathBuf;

use thiserror::Error;

/// Errors that end a single download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, reset mid-body).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Connect or read timed out.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP status, only raised when status checking is enabled.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while creating or writing the output file.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or uses an unsupported scheme.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The resolved output path is already taken; existing files are never overwritten.
    #[error("refusing to overwrite existing file {path}")]
    DestinationExists {
        /// The path that already exists.
        path: PathBuf,
    },

    /// The task running this download panicked or was aborted.
    #[error("download task for {url} aborted: {message}")]
    TaskAborted {
        /// The URL whose task ended abnormally.
        url: String,
        /// Join error description.
        message: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::timeout(url);
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error, mapping `AlreadyExists` to [`Self::DestinationExists`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::AlreadyExists {
            return Self::DestinationExists { path };
        }
        Self::Io { path, source }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an aborted-task error.
    pub fn task_aborted(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TaskAborted {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns true for failures raised by the transport rather than the local disk.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path that the source error does not carry.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_timeout_display() {
        let error = DownloadError::timeout("https://example.com/file.pdf");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://example.com/file.pdf"));
        assert!(error.is_transport());
    }

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://example.com/file.pdf", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("https://example.com/file.pdf"));
        assert!(!error.is_transport());
    }

    #[test]
    fn test_download_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = DownloadError::io(PathBuf::from("/tmp/test.pdf"), io_error);
        let msg = error.to_string();
        assert!(msg.contains("/tmp/test.pdf"), "Expected path in: {msg}");
        assert!(matches!(error, DownloadError::Io { .. }));
    }

    #[test]
    fn test_download_error_io_already_exists_becomes_destination_exists() {
        let io_error = std::io::Error::new(std::io::ErrorKind::AlreadyExists, "exists");
        let error = DownloadError::io(PathBuf::from("/tmp/report.pdf"), io_error);
        assert!(matches!(error, DownloadError::DestinationExists { .. }));
        assert!(error.to_string().contains("refusing to overwrite"));
    }

    #[test]
    fn test_download_error_invalid_url_display() {
        let msg = DownloadError::invalid_url("not-a-url").to_string();
        assert!(msg.contains("invalid URL"), "Expected 'invalid URL' in: {msg}");
        assert!(msg.contains("not-a-url"));
    }

    #[test]
    fn test_download_error_task_aborted_display() {
        let msg = DownloadError::task_aborted("https://example.com/a", "panicked").to_string();
        assert!(msg.contains("https://example.com/a"));
        assert!(msg.contains("panicked"));
    }
}
