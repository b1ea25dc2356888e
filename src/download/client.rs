//! HTTP client wrapper that opens streaming responses.
//!
//! [`HttpClient`] owns a pooled reqwest client configured with the
//! User-Agent, cookie jar and timeouts for a run. Opening a URL yields an
//! [`OpenedResponse`]: the headers the filename resolver and progress display
//! need, plus a lazy body stream for the copier.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::user_agent;

/// Transport settings for an [`HttpClient`].
#[derive(Clone, Default)]
pub struct ClientConfig {
    /// User-Agent override; the browser default is used when `None`.
    pub user_agent: Option<String>,
    /// Cookie jar attached to every request.
    pub cookie_jar: Option<Arc<Jar>>,
    /// Connect timeout; `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Maximum wait for each read of the body; `None` waits indefinitely.
    pub read_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Default settings: browser User-Agent, no cookies, 30s connect and
    /// 300s read timeouts.
    #[must_use]
    pub fn with_default_timeouts() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(CONNECT_TIMEOUT_SECS)),
            read_timeout: Some(Duration::from_secs(READ_TIMEOUT_SECS)),
            ..Self::default()
        }
    }

    /// Converts a seconds value where `0` means "no timeout".
    #[must_use]
    pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("user_agent", &self.user_agent)
            .field("cookie_jar", &self.cookie_jar.as_ref().map(|_| "[cookies]"))
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

/// HTTP client for streaming downloads.
///
/// Cheap to clone; clones share the connection pool and cookie jar.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with [`ClientConfig::with_default_timeouts`].
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized. Use
    /// [`HttpClient::from_config`] to handle that case.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::from_config(&ClientConfig::with_default_timeouts())
            .expect("failed to build HTTP client with default configuration")
    }

    /// Creates a client from explicit settings.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error when the client cannot be built.
    #[instrument(level = "debug")]
    pub fn from_config(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .gzip(true)
            .user_agent(user_agent::effective_user_agent(config.user_agent.as_deref()));
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.read_timeout {
            builder = builder.read_timeout(timeout);
        }
        if let Some(jar) = &config.cookie_jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Sends a GET for `url` and returns once the response headers arrive.
    ///
    /// Non-success statuses are returned as-is; the caller decides whether
    /// to treat them as failures.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] for unparseable or non-HTTP(S) URLs
    /// - [`DownloadError::Network`] / [`DownloadError::Timeout`] when the
    ///   connection cannot be established
    #[instrument(skip(self))]
    pub async fn open(&self, url: &str) -> Result<OpenedResponse, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let meta = ResponseMeta::from_response(&response);
        debug!(
            status = meta.status,
            content_length = ?meta.content_length,
            content_type = ?meta.content_type,
            "response headers received"
        );
        Ok(OpenedResponse {
            url: url.to_string(),
            meta,
            response,
        })
    }
}

/// Header-level view of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Disposition`, if present and valid UTF-8/ASCII.
    pub content_disposition: Option<String>,
    /// Declared body length, if present and numeric.
    pub content_length: Option<u64>,
    /// `Content-Type`, if present.
    pub content_type: Option<String>,
}

impl ResponseMeta {
    fn from_response(response: &reqwest::Response) -> Self {
        let headers = response.headers();
        Self {
            status: response.status().as_u16(),
            content_disposition: header_string(headers, CONTENT_DISPOSITION.as_str()),
            content_length: header_string(headers, CONTENT_LENGTH.as_str())
                .and_then(|v| v.trim().parse::<u64>().ok()),
            content_type: header_string(headers, CONTENT_TYPE.as_str()),
        }
    }

    /// True for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// A response whose headers have arrived and whose body is not yet read.
#[derive(Debug)]
pub struct OpenedResponse {
    url: String,
    meta: ResponseMeta,
    response: reqwest::Response,
}

impl OpenedResponse {
    /// Header-level metadata.
    #[must_use]
    pub fn meta(&self) -> &ResponseMeta {
        &self.meta
    }

    /// Consumes the response into its body stream.
    ///
    /// Transport failures mid-body surface as [`DownloadError::Network`] or
    /// [`DownloadError::Timeout`] items.
    pub fn into_body(self) -> impl Stream<Item = Result<Bytes, DownloadError>> {
        let url = self.url;
        self.response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| DownloadError::network(url.clone(), e)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_open_invalid_url_is_rejected() {
        let client = HttpClient::new();
        let result = tokio_test::block_on(client.open("not-a-valid-url"));
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[test]
    fn test_open_non_http_scheme_is_rejected() {
        let client = HttpClient::new();
        let result = tokio_test::block_on(client.open("ftp://example.com/file.txt"));
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[test]
    fn test_timeout_from_secs_zero_disables() {
        assert_eq!(ClientConfig::timeout_from_secs(0), None);
        assert_eq!(
            ClientConfig::timeout_from_secs(5),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_client_config_debug_redacts_cookie_jar() {
        let config = ClientConfig {
            cookie_jar: Some(Arc::new(Jar::default())),
            ..ClientConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(rendered.contains("[cookies]"));
    }

    #[tokio::test]
    async fn test_open_exposes_headers_and_streams_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Disposition", "attachment; filename=\"a.txt\"")
                    .set_body_raw(b"body".to_vec(), "text/plain"),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new();
        let opened = client.open(&format!("{}/file", server.uri())).await.unwrap();
        let meta = opened.meta().clone();
        assert_eq!(meta.status, 200);
        assert!(meta.is_success());
        assert_eq!(
            meta.content_disposition.as_deref(),
            Some("attachment; filename=\"a.txt\"")
        );
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
        assert_eq!(meta.content_length, Some(4));

        let chunks: Vec<Bytes> = opened
            .into_body()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.concat(), b"body");
    }

    #[tokio::test]
    async fn test_open_sends_configured_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", "custom-agent/1.0"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = ClientConfig {
            user_agent: Some("custom-agent/1.0".to_string()),
            ..ClientConfig::with_default_timeouts()
        };
        let client = HttpClient::from_config(&config).unwrap();
        let opened = client.open(&server.uri()).await.unwrap();
        assert_eq!(opened.meta().status, 200);
    }

    #[tokio::test]
    async fn test_open_returns_error_status_without_failing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let client = HttpClient::new();
        let opened = client.open(&format!("{}/gone", server.uri())).await.unwrap();
        assert_eq!(opened.meta().status, 404);
        assert!(!opened.meta().is_success());
    }

    #[tokio::test]
    async fn test_open_connection_refused_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = HttpClient::new();
        let result = client.open(&format!("http://127.0.0.1:{port}/x")).await;
        let error = result.unwrap_err();
        assert!(error.is_transport(), "expected transport error, got {error}");
    }
}
