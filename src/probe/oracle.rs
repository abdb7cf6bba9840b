//! Size oracle: byte size and natural width of image URLs.
//!
//! Byte size is the cheap signal (one header round trip, no decode), natural
//! width the robust fallback when byte probing is blocked or inconclusive.
//! Both are memoized in the session's [`ResolutionCache`].
//!
//! Every failure is folded into a zero size here; callers treat 0 as
//! "unknown" and never see a probe error.

// ============================================================================
// Imports
// ============================================================================

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::ImageReader;
use tokio::time::timeout;
use tracing::{debug, trace};
use url::Url;

use crate::bridge::HostBridge;
use crate::error::{Error, Result};
use crate::options::DEFAULT_DECODE_TIMEOUT;

use super::{Fetcher, ResolutionCache, decode_data_url};

// ============================================================================
// SizeOracle
// ============================================================================

/// Measures byte size and natural width of image URLs.
///
/// Same-origin byte sizes come from a header-only probe. Cross-origin byte
/// sizes are delegated to the host bridge, which is not bound by the
/// document's origin policy.
pub struct SizeOracle {
    cache: Arc<ResolutionCache>,
    fetcher: Arc<dyn Fetcher>,
    bridge: Arc<dyn HostBridge>,
    base: Url,
    decode_timeout: Duration,
}

impl std::fmt::Debug for SizeOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SizeOracle")
            .field("base", &self.base.as_str())
            .field("decode_timeout", &self.decode_timeout)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl SizeOracle {
    /// Creates an oracle for a document rooted at `base`.
    #[must_use]
    pub fn new(
        base: Url,
        cache: Arc<ResolutionCache>,
        fetcher: Arc<dyn Fetcher>,
        bridge: Arc<dyn HostBridge>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            bridge,
            base,
            decode_timeout: DEFAULT_DECODE_TIMEOUT,
        }
    }

    /// Sets the ceiling on a single decode probe.
    #[must_use]
    pub fn with_decode_timeout(mut self, decode_timeout: Duration) -> Self {
        self.decode_timeout = decode_timeout;
        self
    }

    /// Returns the shared cache.
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    /// Byte size of `src`, 0 when unknown.
    ///
    /// Same-origin answers that are not images, or that fail, yield 0 and are
    /// not memoized, so a later probe may still succeed.
    pub async fn byte_size(&self, src: &str) -> u64 {
        if src.is_empty() || src == "about:blank" || src.starts_with("data") {
            return 0;
        }
        if let Some(size) = self.cache.byte_size(src) {
            return size;
        }

        match self.probe_bytes(src).await {
            Ok(Some(size)) if size > 0 => self.cache.record_byte_size(src, size),
            Ok(_) => 0,
            Err(e) => {
                debug!(url = %src, error = %e, "Byte size probe failed");
                0
            }
        }
    }

    /// Natural width of `src`, 0 when the decode fails or times out.
    ///
    /// Unlike byte sizes, every outcome is memoized, failures included.
    pub async fn pixel_width(&self, src: &str) -> u32 {
        if let Some(width) = self.cache.pixel_width(src) {
            return width;
        }

        let width = match timeout(self.decode_timeout, self.decode_width(src)).await {
            Ok(Ok(width)) => width,
            Ok(Err(e)) => {
                debug!(url = %src, error = %e, "Decode probe failed");
                0
            }
            Err(_) => {
                debug!(
                    url = %src,
                    timeout_ms = self.decode_timeout.as_millis() as u64,
                    "Decode probe timed out"
                );
                0
            }
        };

        self.cache.record_pixel_width(src, width)
    }

    /// Resolves `src` and reports whether it shares the document's host.
    fn locate(&self, src: &str) -> Result<(Url, bool)> {
        let url = self.base.join(src).map_err(|e| Error::invalid_url(src, e))?;
        let same_origin = url.host_str() == self.base.host_str();
        Ok((url, same_origin))
    }

    async fn probe_bytes(&self, src: &str) -> Result<Option<u64>> {
        let (url, same_origin) = self.locate(src)?;

        if !same_origin {
            trace!(url = %url, "Delegating cross-origin byte size");
            return self.bridge.size_lookup(url.as_str()).await.map(Some);
        }

        match self.fetcher.head(&url).await {
            Ok(head) => Ok(head.image_size()),
            Err(e) if e.is_cross_origin() => {
                trace!(url = %url, error = %e, "Same-origin probe refused, delegating");
                self.bridge.size_lookup(url.as_str()).await.map(Some)
            }
            Err(e) => Err(e),
        }
    }

    async fn decode_width(&self, src: &str) -> Result<u32> {
        let bytes = if src.starts_with("data:") {
            decode_data_url(src)?
        } else {
            let (url, _) = self.locate(src)?;
            self.fetcher.fetch_bytes(&url).await?
        };

        let (width, _) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| Error::decode(src, e))?
            .into_dimensions()
            .map_err(|e| Error::decode(src, e))?;
        Ok(width)
    }
}

// ============================================================================
// Tests
// ============================================================================
