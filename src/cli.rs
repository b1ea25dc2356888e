//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use urlgrab_core::DEFAULT_CONCURRENCY;
use urlgrab_core::download::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};

/// Download one or more URLs into a directory with live progress.
///
/// Filenames come from the server's Content-Disposition header, the URL
/// path, or the response Content-Type. Existing files are never overwritten.
#[derive(Parser, Debug)]
#[command(name = "urlgrab")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to download
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Directory to save files into (must already exist)
    #[arg(short, long, default_value = ".")]
    pub dest: PathBuf,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Netscape-format cookie file sent with every request
    #[arg(long, value_name = "FILE")]
    pub cookies: Option<PathBuf>,

    /// Override the User-Agent header
    #[arg(long, value_name = "UA")]
    pub user_agent: Option<String>,

    /// Connect timeout in seconds (0 to disable)
    #[arg(long, value_name = "SECS", default_value_t = CONNECT_TIMEOUT_SECS)]
    pub connect_timeout: u64,

    /// Read timeout in seconds between received bytes (0 to disable)
    #[arg(long, value_name = "SECS", default_value_t = READ_TIMEOUT_SECS)]
    pub read_timeout: u64,

    /// Treat non-2xx HTTP responses as failures instead of saving the body
    #[arg(long)]
    pub fail_on_http_error: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Enable debug logging (same as -v)
    #[arg(long)]
    pub debug: bool,

    /// Suppress progress bars and non-error output
    #[arg(short, long, conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,
}

impl Args {
    /// Default tracing filter when `RUST_LOG` is unset.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match (self.verbose, self.debug) {
            (0, false) => "warn",
            (0 | 1, _) => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("urlgrab").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = parse(&["https://example.com/a"]);
        assert_eq!(args.urls, vec!["https://example.com/a".to_string()]);
        assert_eq!(args.dest, PathBuf::from("."));
        assert_eq!(args.concurrency, 1);
        assert_eq!(args.connect_timeout, 30);
        assert_eq!(args.read_timeout, 300);
        assert!(args.cookies.is_none());
        assert!(args.user_agent.is_none());
        assert!(!args.fail_on_http_error);
        assert!(!args.quiet);
        assert_eq!(args.log_level(), "warn");
    }

    #[test]
    fn test_cli_requires_at_least_one_url() {
        let err = Args::try_parse_from(["urlgrab"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_accepts_multiple_urls_and_options() {
        let args = parse(&[
            "--dest",
            "/tmp/out",
            "-c",
            "4",
            "--cookies",
            "cookies.txt",
            "--user-agent",
            "agent/1",
            "--connect-timeout",
            "0",
            "--read-timeout",
            "10",
            "--fail-on-http-error",
            "https://a.example/1",
            "https://b.example/2",
        ]);
        assert_eq!(args.urls.len(), 2);
        assert_eq!(args.dest, PathBuf::from("/tmp/out"));
        assert_eq!(args.concurrency, 4);
        assert_eq!(args.cookies, Some(PathBuf::from("cookies.txt")));
        assert_eq!(args.user_agent.as_deref(), Some("agent/1"));
        assert_eq!(args.connect_timeout, 0);
        assert_eq!(args.read_timeout, 10);
        assert!(args.fail_on_http_error);
    }

    #[test]
    fn test_cli_concurrency_out_of_range_rejected() {
        for value in ["0", "101"] {
            let err = Args::try_parse_from(["urlgrab", "-c", value, "https://a/b"]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn test_cli_verbosity_levels() {
        assert_eq!(parse(&["-v", "u"]).log_level(), "debug");
        assert_eq!(parse(&["--debug", "u"]).log_level(), "debug");
        assert_eq!(parse(&["-vv", "u"]).log_level(), "trace");
        assert_eq!(parse(&["-q", "u"]).log_level(), "error");
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        let err = Args::try_parse_from(["urlgrab", "-q", "-v", "u"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["urlgrab", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["urlgrab", "--invalid-flag", "u"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
