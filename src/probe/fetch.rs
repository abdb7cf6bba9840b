//! Network access used by the size probes.
//!
//! [`Fetcher`] is the seam between the probes and the network. The crate
//! ships [`HttpFetcher`] over `reqwest`, and [`StaticFetcher`], which serves
//! pre-registered resources from memory.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use parking_lot::RwLock;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default per-request timeout for [`HttpFetcher`].
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// HeadInfo
// ============================================================================

/// Headers returned by a header-only probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadInfo {
    /// HTTP status code.
    pub status: u16,
    /// Declared `Content-Type`.
    pub content_type: Option<String>,
    /// Declared `Content-Length`.
    pub content_length: Option<u64>,
}

impl HeadInfo {
    /// Declared size if the response is a successful image response.
    ///
    /// A missing or unparseable length counts as 0.
    #[must_use]
    pub fn image_size(&self) -> Option<u64> {
        let is_image = self
            .content_type
            .as_deref()
            .is_some_and(|ty| ty.starts_with("image"));
        if (200..300).contains(&self.status) && is_image {
            Some(self.content_length.unwrap_or(0))
        } else {
            None
        }
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// Network operations needed by [`SizeOracle`](super::SizeOracle).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issues a header-only request.
    async fn head(&self, url: &Url) -> Result<HeadInfo>;

    /// Downloads the full resource.
    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>>;
}

// ============================================================================
// HttpFetcher
// ============================================================================

/// [`Fetcher`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a default client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        let client = Client::builder().timeout(DEFAULT_REQUEST_TIMEOUT).build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[inline]
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn head(&self, url: &Url) -> Result<HeadInfo> {
        let response = self.client.head(url.clone()).send().await?;
        if response.url().origin() != url.origin() {
            return Err(Error::cross_origin_denied(response.url().as_str()));
        }
        let headers = response.headers();

        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        trace!(url = %url, status = response.status().as_u16(), ?content_type, ?content_length, "HEAD probe");

        Ok(HeadInfo {
            status: response.status().as_u16(),
            content_type,
            content_length,
        })
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::probe(url.as_str(), format!("status {}", status.as_u16())));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

// ============================================================================
// StaticFetcher
// ============================================================================

#[derive(Debug, Clone)]
struct StaticResource {
    content_type: String,
    declared_length: Option<u64>,
    bytes: Vec<u8>,
    delay: Option<Duration>,
}

/// In-memory [`Fetcher`] serving registered resources.
///
/// Unknown URLs answer 404. Useful for hosts that already hold the bytes and
/// for deterministic tests.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    resources: RwLock<FxHashMap<String, StaticResource>>,
    refused: RwLock<FxHashSet<String>>,
    requests: RwLock<FxHashMap<String, usize>>,
}

impl StaticFetcher {
    /// Creates an empty fetcher.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource with its bytes.
    pub fn insert(&self, url: &str, content_type: &str, bytes: Vec<u8>) {
        self.resources.write().insert(
            url.to_string(),
            StaticResource {
                content_type: content_type.to_string(),
                declared_length: None,
                bytes,
                delay: None,
            },
        );
    }

    /// Registers a resource that only declares a length.
    pub fn insert_declared(&self, url: &str, content_type: &str, length: u64) {
        self.resources.write().insert(
            url.to_string(),
            StaticResource {
                content_type: content_type.to_string(),
                declared_length: Some(length),
                bytes: Vec::new(),
                delay: None,
            },
        );
    }

    /// Makes header probes of `url` fail as if redirected off-origin.
    pub fn refuse(&self, url: &str) {
        self.refused.write().insert(url.to_string());
    }

    /// Delays every answer for `url`.
    pub fn set_delay(&self, url: &str, delay: Duration) {
        if let Some(resource) = self.resources.write().get_mut(url) {
            resource.delay = Some(delay);
        }
    }

    /// Number of requests seen for `url`.
    #[must_use]
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.read().get(url).copied().unwrap_or(0)
    }

    fn lookup(&self, url: &Url) -> Option<StaticResource> {
        *self
            .requests
            .write()
            .entry(url.as_str().to_string())
            .or_insert(0) += 1;
        self.resources.read().get(url.as_str()).cloned()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn head(&self, url: &Url) -> Result<HeadInfo> {
        if self.refused.read().contains(url.as_str()) {
            let _ = self.lookup(url);
            return Err(Error::cross_origin_denied(url.as_str()));
        }
        let Some(resource) = self.lookup(url) else {
            return Ok(HeadInfo {
                status: 404,
                ..HeadInfo::default()
            });
        };
        if let Some(delay) = resource.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(HeadInfo {
            status: 200,
            content_type: Some(resource.content_type),
            content_length: Some(
                resource
                    .declared_length
                    .unwrap_or(resource.bytes.len() as u64),
            ),
        })
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        let resource = self
            .lookup(url)
            .ok_or_else(|| Error::probe(url.as_str(), "status 404"))?;
        if let Some(delay) = resource.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(resource.bytes)
    }
}

// ============================================================================
// Data URLs
// ============================================================================

/// Decodes the payload of a `data:` URL.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the URL is not a well-formed data URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| Error::decode(url, "not a data URL"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::decode(url, "missing payload separator"))?;

    if header.ends_with(";base64") {
        Base64Standard
            .decode(payload.trim())
            .map_err(|e| Error::decode(url, e))
    } else {
        Ok(urlencoding::decode_binary(payload.as_bytes()).into_owned())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_image_size_requires_image_type() {
        let head = HeadInfo {
            status: 200,
            content_type: Some("text/html".into()),
            content_length: Some(500),
        };
        assert_eq!(head.image_size(), None);

        let head = HeadInfo {
            content_type: Some("image/jpeg".into()),
            ..head
        };
        assert_eq!(head.image_size(), Some(500));
    }

    #[test]
    fn test_image_size_rejects_failed_status() {
        let head = HeadInfo {
            status: 404,
            content_type: Some("image/png".into()),
            content_length: Some(10),
        };
        assert_eq!(head.image_size(), None);
    }

    #[test]
    fn test_decode_base64_data_url() {
        let bytes = decode_data_url("data:text/plain;base64,aGVsbG8=").expect("decode");
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_decode_percent_encoded_data_url() {
        let bytes = decode_data_url("data:image/svg+xml,%3Csvg%3E").expect("decode");
        assert_eq!(bytes, b"<svg>");
    }

    #[test]
    fn test_decode_rejects_non_data_url() {
        assert!(decode_data_url("https://a.test/x.png").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
    }

    #[tokio::test]
    async fn test_static_fetcher_counts_requests() {
        let fetcher = StaticFetcher::new();
        fetcher.insert_declared("https://a.test/x.jpg", "image/jpeg", 4096);
        let url = Url::parse("https://a.test/x.jpg").unwrap();

        let head = fetcher.head(&url).await.expect("head");
        assert_eq!(head.image_size(), Some(4096));
        assert_eq!(fetcher.request_count("https://a.test/x.jpg"), 1);

        let missing = Url::parse("https://a.test/missing.jpg").unwrap();
        assert_eq!(fetcher.head(&missing).await.unwrap().status, 404);
        assert!(fetcher.fetch_bytes(&missing).await.is_err());
    }

    #[tokio::test]
    async fn test_http_head_reads_declared_headers() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/photo.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/jpeg")
                    .insert_header("Content-Length", "8000"),
            )
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().expect("client");
        let url = Url::parse(&format!("{}/photo.jpg", mock_server.uri())).unwrap();
        let head = fetcher.head(&url).await.expect("head");

        assert_eq!(head.status, 200);
        assert_eq!(head.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(head.image_size(), Some(8000));
    }

    #[tokio::test]
    async fn test_http_head_refuses_off_origin_redirect() {
        let cdn = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/real.jpg"))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Type", "image/jpeg"))
            .mount(&cdn)
            .await;

        let site = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/short.jpg"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/real.jpg", cdn.uri()).as_str()),
            )
            .mount(&site)
            .await;

        let fetcher = HttpFetcher::new().expect("client");
        let url = Url::parse(&format!("{}/short.jpg", site.uri())).unwrap();
        let err = fetcher.head(&url).await.unwrap_err();
        assert!(err.is_cross_origin());
        assert!(err.is_probe_failure());
    }

    #[tokio::test]
    async fn test_http_fetch_bytes_fails_on_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gone.png"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().expect("client");
        let url = Url::parse(&format!("{}/gone.png", mock_server.uri())).unwrap();
        let err = fetcher.fetch_bytes(&url).await.unwrap_err();
        assert!(err.is_probe_failure());
    }

    #[tokio::test]
    async fn test_http_fetch_bytes_returns_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tiny.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().expect("client");
        let url = Url::parse(&format!("{}/tiny.bin", mock_server.uri())).unwrap();
        assert_eq!(fetcher.fetch_bytes(&url).await.unwrap(), vec![1, 2, 3]);
    }
}
