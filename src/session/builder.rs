//! Builder pattern for discovery session configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use image_discovery::{DiscoverySession, StaticDocument};
//!
//! # fn example() -> image_discovery::Result<()> {
//! let document = Arc::new(StaticDocument::new("https://example.com/")?);
//! let session = DiscoverySession::builder()
//!     .document(document)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::bridge::{HostBridge, StaticBridge};
use crate::dom::Document;
use crate::error::{Error, Result};
use crate::options::ResolverConfig;
use crate::probe::{Fetcher, HttpFetcher, ResolutionCache};
use crate::resolve::RawPatternSet;

use super::core::DiscoverySession;

// ============================================================================
// DiscoverySessionBuilder
// ============================================================================

/// Builder for configuring a [`DiscoverySession`].
///
/// Use [`DiscoverySession::builder()`] to create a new builder.
#[derive(Default)]
pub struct DiscoverySessionBuilder {
    /// Document the session scans.
    document: Option<Arc<dyn Document>>,
    /// Host collaborators.
    bridge: Option<Arc<dyn HostBridge>>,
    /// Same-origin fetcher.
    fetcher: Option<Arc<dyn Fetcher>>,
    /// Resolver timing.
    config: ResolverConfig,
    /// Raw-source rules.
    patterns: Option<RawPatternSet>,
    /// Probe cache shared with other sessions.
    cache: Option<Arc<ResolutionCache>>,
}

impl fmt::Debug for DiscoverySessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoverySessionBuilder")
            .field("has_document", &self.document.is_some())
            .field("has_bridge", &self.bridge.is_some())
            .field("has_fetcher", &self.fetcher.is_some())
            .field("config", &self.config)
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// DiscoverySessionBuilder Implementation
// ============================================================================

impl DiscoverySessionBuilder {
    /// Creates a builder with no document and default timing.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the document to scan. Required.
    #[inline]
    #[must_use]
    pub fn document(mut self, document: Arc<dyn Document>) -> Self {
        self.document = Some(document);
        self
    }

    /// Sets the host bridge.
    ///
    /// Defaults to a [`StaticBridge`] with no answers, which makes
    /// cross-origin sizes 0 and yields no frame candidates.
    #[inline]
    #[must_use]
    pub fn bridge(mut self, bridge: Arc<dyn HostBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Sets the same-origin fetcher. Defaults to an [`HttpFetcher`].
    #[inline]
    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Sets the resolver timing.
    #[inline]
    #[must_use]
    pub fn resolver_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the raw-source rules.
    #[inline]
    #[must_use]
    pub fn patterns(mut self, patterns: RawPatternSet) -> Self {
        self.patterns = Some(patterns);
        self
    }

    /// Reuses an existing probe cache instead of starting empty.
    #[inline]
    #[must_use]
    pub fn cache(mut self, cache: Arc<ResolutionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Builds the session with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no document is set or the timing is invalid
    /// - [`Error::Http`] if the default HTTP client cannot be created
    pub fn build(self) -> Result<DiscoverySession> {
        let document = self.validate_document()?;
        self.config.validate()?;

        let bridge: Arc<dyn HostBridge> = match self.bridge {
            Some(bridge) => bridge,
            None => Arc::new(StaticBridge::new()),
        };
        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new()?),
        };
        let cache = self.cache.unwrap_or_default();
        let patterns = self.patterns.unwrap_or_default();

        Ok(DiscoverySession::new(
            document,
            bridge,
            fetcher,
            cache,
            patterns,
            self.config,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl DiscoverySessionBuilder {
    /// Validates the document configuration.
    fn validate_document(&self) -> Result<Arc<dyn Document>> {
        self.document.clone().ok_or_else(|| {
            Error::config(
                "Document is required. Use .document() to set it.\n\
                 Example: DiscoverySession::builder().document(document)",
            )
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::dom::StaticDocument;
    use crate::probe::StaticFetcher;

    fn document() -> Arc<dyn Document> {
        Arc::new(StaticDocument::new("https://example.com/").expect("document"))
    }

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = DiscoverySessionBuilder::new();
        assert!(builder.document.is_none());
        assert!(builder.bridge.is_none());
        assert!(builder.fetcher.is_none());
        assert_eq!(builder.config, ResolverConfig::default());
    }

    #[test]
    fn test_build_without_document_fails() {
        let err = DiscoverySessionBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_rejects_invalid_timing() {
        let err = DiscoverySessionBuilder::new()
            .document(document())
            .fetcher(Arc::new(StaticFetcher::new()))
            .resolver_config(ResolverConfig::new().with_settle_poll_interval(Duration::ZERO))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_shares_given_cache() {
        let cache = Arc::new(ResolutionCache::new());
        cache.record_byte_size("https://example.com/a.jpg", 10);

        let session = DiscoverySessionBuilder::new()
            .document(document())
            .fetcher(Arc::new(StaticFetcher::new()))
            .cache(Arc::clone(&cache))
            .build()
            .expect("session");

        assert!(Arc::ptr_eq(session.resolver().oracle().cache(), &cache));
    }
}
