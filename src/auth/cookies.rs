//! Netscape cookie file loading.
//!
//! Browser extensions export cookies as a text file with one cookie per line
//! and seven TAB-separated fields:
//! `domain`, `include_subdomains`, `path`, `secure`, `expires`, `name`, `value`.
//! Lines prefixed with `#HttpOnly_` are HTTP-only cookies; other `#` lines
//! are comments.
//!
//! Loading is all-or-nothing: any malformed line fails the whole file, so a
//! truncated export never silently drops the session cookies a download needs.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::cookie::Jar;
use tracing::{debug, info, instrument, warn};
use url::Url;

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// Errors raised while loading a cookie file.
#[derive(Debug, thiserror::Error)]
pub enum CookieFileError {
    /// The file could not be opened.
    #[error("cannot open cookie file {path}: {source}")]
    Open {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the file failed part-way.
    #[error("failed to read cookie file: {0}")]
    Read(#[from] std::io::Error),

    /// A line is not a valid Netscape cookie record.
    #[error("invalid cookie file, line {line}: {reason}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it. Never includes the cookie value.
        reason: String,
    },
}

/// One cookie parsed from a Netscape cookie file.
///
/// The value is redacted in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct CookieRecord {
    /// Domain the cookie belongs to, possibly with a leading dot.
    pub domain: String,
    /// Whether subdomains of `domain` also receive the cookie.
    pub include_subdomains: bool,
    /// URL path scope.
    pub path: String,
    /// Only sent over HTTPS.
    pub secure: bool,
    /// Marked with the `#HttpOnly_` prefix.
    pub http_only: bool,
    /// Expiry as a Unix timestamp; `None` for session cookies.
    pub expires: Option<u64>,
    /// Cookie name.
    pub name: String,
    value: String,
}

impl CookieRecord {
    /// The cookie value. Avoid logging it.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// True if the cookie expired before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        let now_secs = now
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        self.expires.is_some_and(|expires| expires <= now_secs)
    }

    fn origin(&self) -> Option<Url> {
        let scheme = if self.secure { "https" } else { "http" };
        let host = self.domain.trim_start_matches('.');
        Url::parse(&format!("{scheme}://{host}{}", self.path)).ok()
    }

    fn set_cookie_header(&self) -> String {
        let mut header = format!("{}={}; Path={}", self.name, self.value, self.path);
        if self.include_subdomains {
            header.push_str("; Domain=");
            header.push_str(self.domain.trim_start_matches('.'));
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        if let Some(expires) = self
            .expires
            .and_then(|secs| UNIX_EPOCH.checked_add(Duration::from_secs(secs)))
        {
            header.push_str("; Expires=");
            header.push_str(&httpdate::fmt_http_date(expires));
        }
        header
    }
}

impl fmt::Debug for CookieRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieRecord")
            .field("domain", &self.domain)
            .field("include_subdomains", &self.include_subdomains)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .field("expires", &self.expires)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Parses every cookie record from `reader`.
///
/// # Errors
///
/// Returns [`CookieFileError::Read`] on IO failure and
/// [`CookieFileError::Malformed`] for the first invalid line.
pub fn parse_cookie_file(reader: impl BufRead) -> Result<Vec<CookieRecord>, CookieFileError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        let (line_body, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => (rest, true),
            None if line.starts_with('#') => continue,
            None => (line, false),
        };
        let record = parse_record(line_body, http_only).map_err(|reason| {
            CookieFileError::Malformed {
                line: idx + 1,
                reason,
            }
        })?;
        records.push(record);
    }
    Ok(records)
}

fn parse_record(line: &str, http_only: bool) -> Result<CookieRecord, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [domain, include_subdomains, path, secure, expires, name, value] = fields[..] else {
        return Err(format!(
            "expected 7 TAB-separated fields, found {}",
            fields.len()
        ));
    };

    if domain.is_empty() {
        return Err("empty domain".to_string());
    }
    if name.is_empty() {
        return Err("empty cookie name".to_string());
    }
    let expires = match expires.trim() {
        "" | "0" => None,
        raw => Some(
            raw.parse::<u64>()
                .map_err(|_| format!("expiry must be a Unix timestamp, got '{raw}'"))?,
        ),
    };

    Ok(CookieRecord {
        domain: domain.to_string(),
        include_subdomains: parse_flag(include_subdomains, "include_subdomains")?,
        path: if path.is_empty() { "/" } else { path }.to_string(),
        secure: parse_flag(secure, "secure")?,
        http_only,
        expires,
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(raw: &str, field: &str) -> Result<bool, String> {
    if raw.eq_ignore_ascii_case("TRUE") {
        Ok(true)
    } else if raw.eq_ignore_ascii_case("FALSE") {
        Ok(false)
    } else {
        Err(format!("{field} must be TRUE or FALSE, got '{raw}'"))
    }
}

/// Builds a cookie jar from parsed records, skipping expired cookies.
#[must_use]
pub fn cookie_jar(records: &[CookieRecord]) -> Arc<Jar> {
    let jar = Jar::default();
    let now = SystemTime::now();
    for record in records {
        if record.is_expired_at(now) {
            debug!(domain = %record.domain, name = %record.name, "skipping expired cookie");
            continue;
        }
        let Some(origin) = record.origin() else {
            warn!(domain = %record.domain, name = %record.name, "skipping cookie with unusable domain");
            continue;
        };
        jar.add_cookie_str(&record.set_cookie_header(), &origin);
    }
    Arc::new(jar)
}

/// Loads a Netscape cookie file into a jar ready for the HTTP client.
///
/// # Errors
///
/// Any failure to open, read or parse the file.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_cookie_file(path: &Path) -> Result<Arc<Jar>, CookieFileError> {
    let file = File::open(path).map_err(|source| CookieFileError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_cookie_file(BufReader::new(file))?;
    info!(count = records.len(), "loaded cookies");
    Ok(cookie_jar(&records))
}
