//! Candidate enumeration over the document.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::dom::{Document, Marker};
use crate::identifiers::NodeId;
use crate::options::DiscoveryOptions;

use super::Candidate;

// ============================================================================
// Background helpers
// ============================================================================

/// URL of the first layer of a computed `background-image` value.
///
/// Returns `None` for non-`url(..)` layers (gradients) and for SVG layers.
#[must_use]
pub fn first_background_url(value: &str) -> Option<String> {
    let first = value.split(", ").next()?;
    if !first.starts_with("url") || first.contains(".svg") {
        return None;
    }
    strip_url_function(first)
}

fn strip_url_function(layer: &str) -> Option<String> {
    let inner = layer.strip_prefix("url(")?.strip_suffix(')')?;
    let url: String = inner.chars().filter(|c| *c != '"' && *c != '\'').collect();
    (!url.is_empty()).then_some(url)
}

/// URL an element currently shows, by tag: `img` gives its displayed
/// source, `video` its poster, anything else its first background layer.
#[must_use]
pub fn displayed_url(doc: &dyn Document, node: NodeId) -> Option<String> {
    match doc.tag_name(node)?.as_str() {
        "img" => Some(doc.current_source(node)),
        "video" => doc.attribute(node, "poster").map(|poster| doc.resolve_url(&poster)),
        _ => doc
            .background_image(node)
            .and_then(|value| value.split(", ").next().and_then(strip_url_function)),
    }
}

// ============================================================================
// CandidateScanner
// ============================================================================

/// Enumerates image-bearing elements.
///
/// Three element classes are collected, in this order: images already
/// through resolution, elements with a background image, and videos with a
/// poster. Output is unique by URL (first occurrence wins) but not yet in
/// document order.
pub struct CandidateScanner {
    document: Arc<dyn Document>,
}

impl std::fmt::Debug for CandidateScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateScanner").finish_non_exhaustive()
    }
}

impl CandidateScanner {
    /// Creates a scanner over `document`.
    #[inline]
    #[must_use]
    pub fn new(document: Arc<dyn Document>) -> Self {
        Self { document }
    }

    /// Scans the document.
    ///
    /// With no minimum size every element qualifies. Otherwise each element's
    /// rendered rectangle must meet both minimums (inclusive); the element
    /// marked [`Marker::LastFocused`] is kept regardless when it is an image.
    #[must_use]
    pub fn scan(&self, options: &DiscoveryOptions) -> Vec<Candidate> {
        let doc = self.document.as_ref();
        let filtered = options.is_filtered();
        let fits = |node: NodeId| {
            !filtered
                || doc
                    .bounding_rect(node)
                    .meets(options.min_width, options.min_height)
        };

        let mut raw = Vec::new();

        for img in doc.elements_by_tag("img") {
            if !doc.has_marker(img, Marker::Scanned) {
                continue;
            }
            if fits(img) || doc.has_marker(img, Marker::LastFocused) {
                raw.push(Candidate::node(doc.current_source(img), img));
            }
        }

        for node in doc.elements() {
            if !fits(node) {
                continue;
            }
            if let Some(url) = doc
                .background_image(node)
                .and_then(|value| first_background_url(&value))
            {
                raw.push(Candidate::node(url, node));
            }
        }

        for video in doc.elements_by_tag("video") {
            let Some(poster) = doc.attribute(video, "poster") else {
                continue;
            };
            if fits(video) {
                raw.push(Candidate::node(doc.resolve_url(&poster), video));
            }
        }

        let found = raw.len();
        let mut seen = FxHashSet::default();
        let unique: Vec<Candidate> = raw
            .into_iter()
            .filter(|candidate| !options.is_excluded(&candidate.url))
            .filter(|candidate| seen.insert(candidate.url.clone()))
            .collect();

        debug!(found, unique = unique.len(), filtered, "Scanned document");
        unique
    }
}

// ============================================================================
// Tests
// ============================================================================
