//! Discovery session: the pipeline entry point and its published state.
//!
//! A [`DiscoverySession`] owns everything one document needs: the probe
//! cache, the resolver, the scanning stages and the last published
//! [`OrderedList`]. Passes are serialised by a [`ScanMutex`], so a trigger
//! that arrives mid-pass waits and then merges against the list the earlier
//! pass published.
//!
//! # Example
//!
//! ```ignore
//! use image_discovery::{DiscoveryOptions, DiscoverySession};
//!
//! # async fn example(session: DiscoverySession) {
//! let options = DiscoveryOptions::new().with_min_size(180, 150);
//! let list = session.run_discovery_pass(&options).await;
//!
//! for entry in &list {
//!     println!("{}", entry.address());
//! }
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::bridge::HostBridge;
use crate::dom::Document;
use crate::identifiers::{NodeId, ScanId};
use crate::merge;
use crate::options::{DiscoveryOptions, ResolverConfig};
use crate::probe::{Fetcher, ResolutionCache, SizeOracle};
use crate::resolve::{RawPatternSet, SourceResolver, UpgradeSource};
use crate::scan::{CandidateScanner, FrameMapper, OrderSorter, OrderedList, displayed_url};

use super::builder::DiscoverySessionBuilder;
use super::mutex::ScanMutex;

// ============================================================================
// ImageIdentifier
// ============================================================================

/// What the viewer knows about the image it wants to locate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageIdentifier {
    /// An image URL.
    Url(String),
    /// An element; its displayed URL is derived from its tag.
    Node(NodeId),
}

impl From<&str> for ImageIdentifier {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<String> for ImageIdentifier {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<NodeId> for ImageIdentifier {
    fn from(node: NodeId) -> Self {
        Self::Node(node)
    }
}

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the session.
pub(crate) struct SessionInner {
    /// Log identity.
    pub id: ScanId,

    /// Document being scanned.
    pub document: Arc<dyn Document>,

    /// Lazy-image resolution.
    pub resolver: SourceResolver,

    /// Element enumeration.
    pub scanner: CandidateScanner,

    /// Sub-document extraction and mapping.
    pub frames: FrameMapper,

    /// Document-order sorting.
    pub sorter: OrderSorter,

    /// Last published list, held for the whole pass.
    pub state: ScanMutex<OrderedList>,

    /// Broadcast of every published list.
    pub published: watch::Sender<OrderedList>,
}

// ============================================================================
// DiscoverySession
// ============================================================================

/// Ordered image discovery over one document.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct DiscoverySession {
    /// Shared inner state.
    pub(crate) inner: Arc<SessionInner>,
}

// ============================================================================
// DiscoverySession - Display
// ============================================================================

impl fmt::Debug for DiscoverySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoverySession")
            .field("id", &self.inner.id)
            .field("base", &self.inner.document.base_url().as_str())
            .field("published", &self.inner.published.borrow().len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// DiscoverySession - Public API
// ============================================================================

impl DiscoverySession {
    /// Creates a configuration builder for the session.
    #[inline]
    #[must_use]
    pub fn builder() -> DiscoverySessionBuilder {
        DiscoverySessionBuilder::new()
    }

    /// Returns the session's log identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ScanId {
        self.inner.id
    }

    /// Returns the scanned document.
    #[inline]
    #[must_use]
    pub fn document(&self) -> &Arc<dyn Document> {
        &self.inner.document
    }

    /// Returns the source resolver.
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &SourceResolver {
        &self.inner.resolver
    }

    /// Runs one scan-resolve-merge-publish cycle.
    ///
    /// Waits for any pass already in flight, then merges the fresh list into
    /// the previously published one, stores and broadcasts the result. Never
    /// fails: probe and bridge problems only make the list less complete.
    pub async fn run_discovery_pass(&self, options: &DiscoveryOptions) -> OrderedList {
        let mut state = self.inner.state.acquire().await;
        let started = Instant::now();

        let fresh = self.collect(options).await;
        let merged = merge::combine(&fresh, &state);

        info!(
            session = %self.inner.id,
            found = fresh.len(),
            previous = state.len(),
            published = merged.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Discovery pass complete"
        );

        *state = merged.clone();
        self.inner.published.send_replace(merged.clone());
        merged
    }

    /// Runs the pipeline without merging or publishing.
    ///
    /// Still waits for, and blocks, other passes, since resolution rewrites
    /// the document.
    pub async fn ordered_image_urls(&self, options: &DiscoveryOptions) -> OrderedList {
        let _guard = self.inner.state.acquire().await;
        self.collect(options).await
    }

    /// Returns the last published list.
    #[must_use]
    pub fn published(&self) -> OrderedList {
        self.inner.published.borrow().clone()
    }

    /// Subscribes to published lists.
    ///
    /// The receiver starts at the current list and is notified after every
    /// pass.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OrderedList> {
        self.inner.published.subscribe()
    }

    /// Position of an image in the last published list.
    ///
    /// Elements are looked up by the URL they currently display.
    #[must_use]
    pub fn index_of(&self, identifier: impl Into<ImageIdentifier>) -> Option<usize> {
        let url = match identifier.into() {
            ImageIdentifier::Url(url) => url,
            ImageIdentifier::Node(node) => displayed_url(self.inner.document.as_ref(), node)?,
        };
        merge::index_of(&self.inner.published.borrow(), &url)
    }

    /// Re-resolves an image whose source changed after it was scanned.
    ///
    /// See [`SourceResolver::recheck`].
    pub async fn recheck(&self, node: NodeId) -> Option<UpgradeSource> {
        self.inner.resolver.recheck(node).await
    }
}

// ============================================================================
// DiscoverySession - Internal
// ============================================================================

impl DiscoverySession {
    /// Wires the pipeline stages around one document.
    pub(crate) fn new(
        document: Arc<dyn Document>,
        bridge: Arc<dyn HostBridge>,
        fetcher: Arc<dyn Fetcher>,
        cache: Arc<ResolutionCache>,
        patterns: RawPatternSet,
        config: ResolverConfig,
    ) -> Self {
        let id = ScanId::next();
        let oracle = SizeOracle::new(document.base_url(), cache, fetcher, Arc::clone(&bridge))
            .with_decode_timeout(config.decode_timeout);
        let resolver = SourceResolver::new(Arc::clone(&document), Arc::new(oracle), config)
            .with_patterns(patterns);
        let (published, _) = watch::channel(OrderedList::new());

        debug!(session = %id, base = %document.base_url(), "Discovery session created");

        Self {
            inner: Arc::new(SessionInner {
                id,
                scanner: CandidateScanner::new(Arc::clone(&document)),
                frames: FrameMapper::new(Arc::clone(&document), bridge),
                sorter: OrderSorter::new(Arc::clone(&document)),
                resolver,
                document,
                state: ScanMutex::new(OrderedList::new()),
                published,
            }),
        }
    }

    /// Resolve, scan, extract frames, map and sort. Caller holds the mutex.
    async fn collect(&self, options: &DiscoveryOptions) -> OrderedList {
        let inner = &self.inner;

        let report = inner.resolver.unlazy_document().await;
        debug!(
            session = %inner.id,
            pending = report.pending,
            upgraded = report.upgraded(),
            "Unlazy finished"
        );

        let mut candidates = inner.scanner.scan(options);
        candidates.extend(inner.frames.extract(options).await);
        if candidates.is_empty() {
            return OrderedList::new();
        }

        let mapped = inner.frames.map(candidates).await;
        inner.sorter.sort(mapped)
    }
}

// ============================================================================
// Tests
// ============================================================================
