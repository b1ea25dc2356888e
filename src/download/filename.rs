//! Filename resolution for downloads.
//!
//! A download's on-disk name comes from the first signal that yields one:
//!
//! 1. the `Content-Disposition` filename, used as-is (path separators aside);
//! 2. the last segment of the URL path;
//! 3. the response `Content-Type`, mapped to `index.<ext>` and probed for
//!    collisions, or `index.bin.<random>` when the type has no known extension.

use std::fmt;
use std::path::Path;

use rand::Rng;
use tracing::debug;
use url::Url;

use super::constants::{COLLISION_SUFFIX_LEN, MAX_COLLISION_PROBES, UNKNOWN_TYPE_SUFFIX_LEN};

/// Response and request signals available when naming a download.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilenameHints<'a> {
    /// Raw `Content-Disposition` header value.
    pub content_disposition: Option<&'a str>,
    /// Name derived from the URL path (see [`url_filename`]).
    pub url_filename: Option<&'a str>,
    /// Raw `Content-Type` header value.
    pub content_type: Option<&'a str>,
}

/// Which signal produced a [`ResolvedFilename`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilenameSource {
    /// Server-provided `Content-Disposition` filename.
    ContentDisposition,
    /// Last segment of the URL path.
    UrlPath,
    /// `index.<ext>` from a known content type, after collision probing.
    ContentType,
    /// `index.bin.<random>` for an unknown or missing content type.
    Random,
}

/// A filename chosen for one download, relative to the destination directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFilename {
    name: String,
    source: FilenameSource,
}

impl ResolvedFilename {
    /// The bare file name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Which naming strategy produced this name.
    #[must_use]
    pub fn source(&self) -> FilenameSource {
        self.source
    }
}

impl fmt::Display for ResolvedFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Resolves the output filename for a response saved into `dir`.
///
/// Never fails: a malformed disposition header falls through to the URL
/// name, and an unusable content type falls through to a random name.
#[must_use]
pub fn resolve_filename(hints: &FilenameHints<'_>, dir: &Path) -> ResolvedFilename {
    if let Some(name) = hints
        .content_disposition
        .and_then(parse_content_disposition)
        .and_then(|name| path_safe_name(&name))
    {
        return ResolvedFilename {
            name,
            source: FilenameSource::ContentDisposition,
        };
    }

    if let Some(name) = hints.url_filename.and_then(path_safe_name) {
        return ResolvedFilename {
            name,
            source: FilenameSource::UrlPath,
        };
    }

    match hints.content_type.and_then(extension_for_content_type) {
        Some(ext) => ResolvedFilename {
            name: next_free_name(dir, &format!("index.{ext}")),
            source: FilenameSource::ContentType,
        },
        None => {
            debug!(content_type = ?hints.content_type, "no extension for content type");
            ResolvedFilename {
                name: format!("index.bin.{}", random_lowercase(UNKNOWN_TYPE_SUFFIX_LEN)),
                source: FilenameSource::Random,
            }
        }
    }
}

/// Derives a candidate filename from the last segment of a URL path.
///
/// Returns `None` for unparseable URLs and for paths ending in `/`.
#[must_use]
pub fn url_filename(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    path_safe_name(&decoded)
}

/// Extracts the filename parameter from a `Content-Disposition` value.
///
/// `filename*` (RFC 5987) takes precedence over `filename`. Returns `None`
/// when no usable parameter exists or the header is malformed.
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    for (key, value) in disposition_params(header)? {
        if key.eq_ignore_ascii_case("filename*") {
            if let Some(decoded) = decode_ext_value(&value) {
                return Some(decoded);
            }
        } else if key.eq_ignore_ascii_case("filename") && plain.is_none() {
            plain = Some(value);
        }
    }
    plain.filter(|name| !name.trim().is_empty())
}

/// Splits a disposition value into `key=value` parameters.
///
/// Bare tokens (the disposition type) are skipped. An unterminated quoted
/// string makes the whole header unusable.
fn disposition_params(header: &str) -> Option<Vec<(String, String)>> {
    let mut params = Vec::new();
    let mut chars = header.chars().peekable();

    loop {
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ';' {
                break;
            }
            key.push(c);
            chars.next();
        }
        match chars.next() {
            None => break,
            Some(';') => continue,
            Some(_) => {}
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => value.extend(chars.next()),
                    '"' => {
                        closed = true;
                        break;
                    }
                    other => value.push(other),
                }
            }
            if !closed {
                return None;
            }
            for c in chars.by_ref() {
                if c == ';' {
                    break;
                }
            }
        } else {
            for c in chars.by_ref() {
                if c == ';' {
                    break;
                }
                value.push(c);
            }
            value = value.trim().to_string();
        }

        let key = key.trim();
        if !key.is_empty() {
            params.push((key.to_string(), value));
        }
    }

    Some(params)
}

/// Decodes an RFC 5987 `charset'language'percent-encoded` value.
fn decode_ext_value(value: &str) -> Option<String> {
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;

    let decoded = if charset.eq_ignore_ascii_case("utf-8") {
        urlencoding::decode(encoded).ok()?.into_owned()
    } else if charset.eq_ignore_ascii_case("iso-8859-1") {
        urlencoding::decode_binary(encoded.as_bytes())
            .iter()
            .map(|&b| char::from(b))
            .collect()
    } else {
        return None;
    };
    (!decoded.trim().is_empty()).then_some(decoded)
}

/// Makes a server- or URL-provided name safe to join onto the output directory.
///
/// Separators and control characters become `_`; `.`/`..` lose their dots.
fn path_safe_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        return Some(cleaned.replace('.', "_"));
    }
    Some(cleaned)
}

/// Maps a MIME type to a file extension (without the dot).
///
/// Parameters such as `; charset=utf-8` are ignored. Returns `None` for a
/// malformed type or one with no known extension.
pub(crate) fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let (kind, subtype) = mime.split_once('/')?;
    if kind.is_empty() || subtype.is_empty() || subtype.contains('/') {
        return None;
    }

    let ext = match mime.as_str() {
        "text/plain" => "txt",
        "text/html" => "html",
        "text/css" => "css",
        "text/csv" => "csv",
        "text/markdown" => "md",
        "text/xml" | "application/xml" => "xml",
        "text/javascript" | "application/javascript" => "js",
        "application/json" => "json",
        "application/pdf" => "pdf",
        "application/rtf" => "rtf",
        "application/zip" => "zip",
        "application/gzip" | "application/x-gzip" => "gz",
        "application/x-tar" => "tar",
        "application/x-bzip2" => "bz2",
        "application/x-7z-compressed" => "7z",
        "application/x-xz" => "xz",
        "application/octet-stream" => "bin",
        "application/wasm" => "wasm",
        "application/epub+zip" => "epub",
        "application/msword" => "doc",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "oga",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/flac" => "flac",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/mpeg" => "mpeg",
        "font/woff" => "woff",
        "font/woff2" => "woff2",
        _ => return None,
    };
    Some(ext)
}

/// Returns `name` if free in `dir`, else the first free `name.N` for N in
/// `1..=999`, else `name.<random>`.
pub(crate) fn next_free_name(dir: &Path, name: &str) -> String {
    if !path_taken(&dir.join(name)) {
        return name.to_string();
    }
    for i in 1..=MAX_COLLISION_PROBES {
        let candidate = format!("{name}.{i}");
        if !path_taken(&dir.join(&candidate)) {
            return candidate;
        }
    }
    debug!(name, "numeric suffixes exhausted, using random suffix");
    format!("{name}.{}", random_lowercase(COLLISION_SUFFIX_LEN))
}

// Dangling symlinks count as taken: create_new would fail on them.
fn path_taken(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

fn random_lowercase(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| char::from(rng.gen_range(b'a'..=b'z'))).collect()
}
