//! Per-element source upgrades and the whole-document unlazy pass.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};

use crate::dom::{Document, Marker};
use crate::identifiers::NodeId;
use crate::options::ResolverConfig;
use crate::probe::SizeOracle;

use super::pattern::{RawPatternSet, extract_urls, is_pass_listed, normalize_protocol};

// ============================================================================
// UpgradeSource
// ============================================================================

/// Which signal produced an upgrade. Diagnostic only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpgradeSource {
    /// A raw-source rule rewrote the displayed URL.
    RawUrl,
    /// A URL embedded in the named attribute.
    Attribute(String),
}

impl fmt::Display for UpgradeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RawUrl => f.write_str("rawUrl"),
            Self::Attribute(name) => f.write_str(name),
        }
    }
}

// ============================================================================
// UnlazyReport
// ============================================================================

/// Outcome of [`SourceResolver::unlazy_document`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlazyReport {
    /// Images that had not been through resolution yet.
    pub pending: usize,
    /// Pending images large enough to be resolved.
    pub qualifying: usize,
    /// One entry per upgraded image.
    pub upgrades: Vec<UpgradeSource>,
}

impl UnlazyReport {
    /// Number of upgraded images.
    #[inline]
    #[must_use]
    pub fn upgraded(&self) -> usize {
        self.upgrades.len()
    }

    /// Upgrade counts per source, in first-seen order.
    #[must_use]
    pub fn counts(&self) -> Vec<(UpgradeSource, usize)> {
        let mut counts: Vec<(UpgradeSource, usize)> = Vec::new();
        for source in &self.upgrades {
            match counts.iter_mut().find(|(seen, _)| seen == source) {
                Some((_, count)) => *count += 1,
                None => counts.push((source.clone(), 1)),
            }
        }
        counts
    }
}

// ============================================================================
// Baseline
// ============================================================================

/// What a candidate has to beat.
#[derive(Debug, Clone, Copy)]
struct Baseline {
    bytes: u64,
    width: u32,
}

// ============================================================================
// SourceResolver
// ============================================================================

/// Swaps an image's displayed source for a larger real source when its
/// attributes or its URL give one away.
///
/// Candidates are tried in a fixed order: the raw-source rewrite of the
/// displayed URL first, then attributes in declaration order. The first one
/// that probes strictly larger than the displayed source wins.
pub struct SourceResolver {
    document: Arc<dyn Document>,
    oracle: Arc<SizeOracle>,
    patterns: RawPatternSet,
    config: ResolverConfig,
}

impl fmt::Debug for SourceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceResolver")
            .field("patterns", &self.patterns)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SourceResolver {
    /// Creates a resolver with the default raw-source rules.
    #[must_use]
    pub fn new(
        document: Arc<dyn Document>,
        oracle: Arc<SizeOracle>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            document,
            oracle,
            patterns: RawPatternSet::default(),
            config,
        }
    }

    /// Replaces the raw-source rules.
    #[must_use]
    pub fn with_patterns(mut self, patterns: RawPatternSet) -> Self {
        self.patterns = patterns;
        self
    }

    /// Returns the size oracle.
    #[inline]
    #[must_use]
    pub fn oracle(&self) -> &Arc<SizeOracle> {
        &self.oracle
    }

    /// Resolves one image element.
    ///
    /// Returns which signal won, or `None` when the element was left alone.
    /// Probe failures count as "not larger" and never abort the element.
    pub async fn resolve(&self, node: NodeId) -> Option<UpgradeSource> {
        let doc = &self.document;
        doc.set_attribute(node, "loading", "eager");

        let current = doc.current_source(node);
        let pattern_match = self.patterns.matches(&current);
        let attributes: Vec<(String, String)> = doc
            .attributes(node)
            .into_iter()
            .filter(|(name, value)| !is_pass_listed(name) && !extract_urls(value).is_empty())
            .collect();

        if !pattern_match && attributes.is_empty() {
            trace!(%node, "No lazy signal, skipping");
            return None;
        }

        let protocol = doc.protocol();
        let baseline = Baseline {
            bytes: self
                .oracle
                .byte_size(&normalize_protocol(&current, &protocol))
                .await,
            width: doc.natural_width(node),
        };
        trace!(%node, current = %current, bytes = baseline.bytes, width = baseline.width, "Resolving");

        if let Some((rule, raw)) = self.patterns.raw_source(&current) {
            let target = normalize_protocol(&raw, &protocol);
            if self.beats(&target, baseline).await {
                debug!(%node, rule, target = %target, "Raw source is larger");
                self.swap(node, &target).await;
                return Some(UpgradeSource::RawUrl);
            }
        }

        for (name, value) in attributes {
            let urls = extract_urls(&value);
            let winner = match urls.as_slice() {
                [] => None,
                [only] => {
                    if doc.resolve_url(only) == current {
                        continue;
                    }
                    let target = normalize_protocol(only, &protocol);
                    self.beats(&target, baseline).await.then_some(target)
                }
                [first, .., last] => {
                    let first = normalize_protocol(first, &protocol);
                    let last = normalize_protocol(last, &protocol);
                    self.larger_extreme(first, last, baseline).await
                }
            };

            if let Some(target) = winner {
                debug!(%node, attribute = %name, target = %target, "Attribute source is larger");
                self.swap(node, &target).await;
                return Some(UpgradeSource::Attribute(name));
            }
        }

        None
    }

    /// Re-runs resolution after the host saw `src`/`srcset` change.
    ///
    /// The first mutation after our own swap is the echo of that swap and is
    /// swallowed. Elements that never went through the unlazy pass are
    /// ignored.
    pub async fn recheck(&self, node: NodeId) -> Option<UpgradeSource> {
        let doc = &self.document;

        if doc.has_marker(node, Marker::SourceUpdated) {
            doc.unmark(node, Marker::SourceUpdated);
            trace!(%node, "Ignoring echo of own swap");
            return None;
        }
        if !doc.has_marker(node, Marker::Scanned) {
            return None;
        }

        doc.mark(node, Marker::SourceUpdated);
        let outcome = self.resolve(node).await;
        if outcome.is_none() {
            doc.unmark(node, Marker::SourceUpdated);
        }
        outcome
    }

    /// Resolves every image not yet marked scanned, then marks them all.
    ///
    /// Only images whose rendered rectangle has a smaller side of at least
    /// [`ResolverConfig::unlazy_min_side`] are resolved; they run
    /// concurrently.
    pub async fn unlazy_document(&self) -> UnlazyReport {
        let doc = &self.document;

        let pending: Vec<NodeId> = doc
            .elements_by_tag("img")
            .into_iter()
            .filter(|&node| !doc.has_marker(node, Marker::Scanned))
            .collect();
        let qualifying: Vec<NodeId> = pending
            .iter()
            .copied()
            .filter(|&node| doc.bounding_rect(node).min_side() >= self.config.unlazy_min_side)
            .collect();

        let mut report = UnlazyReport {
            pending: pending.len(),
            qualifying: qualifying.len(),
            upgrades: Vec::new(),
        };

        if !qualifying.is_empty() {
            info!(count = qualifying.len(), "Trying to unlazy images");

            report.upgrades = join_all(qualifying.iter().map(|&node| self.resolve(node)))
                .await
                .into_iter()
                .flatten()
                .collect();

            if report.upgrades.is_empty() {
                info!("No lazy source attribute found");
            }
            for (source, count) in report.counts() {
                info!(attribute = %source, count, "Unlazied images");
            }
        }

        for &node in &pending {
            doc.mark(node, Marker::Scanned);
        }

        report
    }

    /// Returns `true` if `target` is strictly larger than `baseline`.
    ///
    /// Byte sizes decide when both are known; otherwise natural widths do.
    async fn beats(&self, target: &str, baseline: Baseline) -> bool {
        if baseline.bytes > 0 {
            let bytes = self.oracle.byte_size(target).await;
            if bytes > 0 {
                return bytes > baseline.bytes;
            }
        }
        self.oracle.pixel_width(target).await > baseline.width
    }

    /// Picks the larger of two ladder extremes, if it beats `baseline`.
    async fn larger_extreme(&self, first: String, last: String, baseline: Baseline) -> Option<String> {
        if baseline.bytes > 0 {
            let (first_bytes, last_bytes) = tokio::join!(
                self.oracle.byte_size(&first),
                self.oracle.byte_size(&last)
            );
            if first_bytes > 0 || last_bytes > 0 {
                let (winner, bytes) = if last_bytes > first_bytes {
                    (last, last_bytes)
                } else {
                    (first, first_bytes)
                };
                return (bytes > baseline.bytes).then_some(winner);
            }
        }

        let (first_width, last_width) = tokio::join!(
            self.oracle.pixel_width(&first),
            self.oracle.pixel_width(&last)
        );
        let (winner, width) = if last_width > first_width {
            (last, last_width)
        } else {
            (first, first_width)
        };
        (width > baseline.width).then_some(winner)
    }

    /// Points the element and its responsive siblings at `target`, then waits
    /// for the displayed source to follow.
    async fn swap(&self, node: NodeId, target: &str) {
        let doc = &self.document;

        doc.set_attribute(node, "src", target);
        doc.set_attribute(node, "srcset", target);
        if let Some(parent) = doc.parent(node)
            && doc.is_tag(parent, "picture")
        {
            for source in doc.descendants_by_tag(parent, "source") {
                doc.set_attribute(source, "srcset", target);
            }
        }

        if !self.wait_until_displayed(node, target).await {
            warn!(
                %node,
                target = %target,
                timeout_ms = self.config.settle_timeout.as_millis() as u64,
                "Displayed source did not settle"
            );
        }
    }

    /// Polls the displayed source until it matches `target`.
    async fn wait_until_displayed(&self, node: NodeId, target: &str) -> bool {
        let doc = &self.document;
        let expected = doc.resolve_url(target);

        let settled = async {
            loop {
                if doc.resolve_url(&doc.current_source(node)) == expected {
                    break;
                }
                sleep(self.config.settle_poll_interval).await;
            }
        };

        timeout(self.config.settle_timeout, settled).await.is_ok()
    }
}

// ============================================================================
// Tests
// ============================================================================
