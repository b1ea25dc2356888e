//! HTTP downloading: naming, streaming to disk, and the concurrent engine.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - Filename selection from Content-Disposition, the URL path, or the
//!   Content-Type, never overwriting an existing file
//! - Bounded concurrency (1 download at a time by default)
//! - Cooperative cancellation through a shared [`CancellationToken`](tokio_util::sync::CancellationToken)
//! - Configurable timeouts (30s connect, 5min read by default)
//! - Structured error types with full context
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use urlgrab_core::download::{DownloadEngine, HttpClient};
//! use urlgrab_core::{CancellationToken, RecordingProgress};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(2)?;
//! let report = engine
//!     .run(
//!         &["https://example.com/paper.pdf".to_string()],
//!         Path::new("./downloads"),
//!         &HttpClient::new(),
//!         Arc::new(RecordingProgress::new()),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! for (url, outcome) in report.outcomes() {
//!     println!("{url}: {outcome:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod cancel;
mod client;
mod constants;
pub mod copier;
mod engine;
mod error;
pub mod filename;
mod task;

pub use cancel::cancel_on_ctrl_c;
pub use client::{ClientConfig, HttpClient, OpenedResponse, ResponseMeta};
pub use constants::{CHUNK_SIZE, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use copier::copy_stream;
pub use engine::{DEFAULT_CONCURRENCY, DownloadEngine, EngineError};
pub use error::DownloadError;
pub use filename::{FilenameHints, FilenameSource, ResolvedFilename, resolve_filename};
pub use task::{DownloadReport, DownloadTask, TransferOutcome};
