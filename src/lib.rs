//! urlgrab Core Library
//!
//! This library provides the core functionality for the `urlgrab` tool,
//! which streams one or more URLs into a local directory while rendering
//! live per-file progress.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`auth`] - Netscape cookie file loading into a shared cookie jar
//! - [`download`] - Filename resolution, stream copying and the download engine
//! - [`progress`] - Progress sink contract and its terminal/headless implementations

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod download;
pub mod progress;
mod user_agent;

// Re-export commonly used types
pub use auth::{CookieFileError, load_cookie_file};
pub use download::{
    ClientConfig, DEFAULT_CONCURRENCY, DownloadEngine, DownloadError, DownloadReport,
    DownloadTask, EngineError, HttpClient, TransferOutcome, cancel_on_ctrl_c,
};
pub use progress::{ProgressSink, RecordingProgress, TaskId, TerminalProgress};
pub use tokio_util::sync::CancellationToken;
pub use user_agent::DEFAULT_USER_AGENT;
