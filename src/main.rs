//! CLI entry point for the urlgrab tool.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use urlgrab_core::{
    CancellationToken, ClientConfig, DownloadEngine, HttpClient, ProgressSink, TerminalProgress,
    cancel_on_ctrl_c, load_cookie_file,
};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose/debug flags > default (warn)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let engine = DownloadEngine::new(usize::from(args.concurrency))?
        .with_fail_on_http_error(args.fail_on_http_error);

    let cookie_jar = args
        .cookies
        .as_deref()
        .map(load_cookie_file)
        .transpose()
        .context("Failed to load cookies")?;

    let client = HttpClient::from_config(&ClientConfig {
        user_agent: args.user_agent.clone(),
        cookie_jar,
        connect_timeout: ClientConfig::timeout_from_secs(args.connect_timeout),
        read_timeout: ClientConfig::timeout_from_secs(args.read_timeout),
    })
    .context("Failed to build HTTP client")?;

    let progress: Arc<dyn ProgressSink> = if args.quiet {
        Arc::new(TerminalProgress::hidden())
    } else {
        Arc::new(TerminalProgress::new())
    };

    let cancel = CancellationToken::new();
    let listener = cancel_on_ctrl_c(cancel.clone());

    let result = engine
        .run(&args.urls, &args.dest, &client, Arc::clone(&progress), &cancel)
        .await;
    listener.abort();
    let report = result?;

    info!(
        completed = report.completed(),
        failed = report.failed(),
        cancelled = report.cancelled(),
        "Download complete"
    );
    progress.log(&format!(
        "{} downloaded, {} failed, {} cancelled",
        report.completed(),
        report.failed(),
        report.cancelled()
    ));

    Ok(())
}
