//! Sub-document candidates and their mapping to frame elements.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::{debug, trace, warn};

use crate::bridge::HostBridge;
use crate::dom::Document;
use crate::identifiers::NodeId;
use crate::options::DiscoveryOptions;

use super::{Anchor, Candidate};

// ============================================================================
// Frame addresses
// ============================================================================

/// Source address of a frame element, resolved against the document.
///
/// Empty when the frame has no `src`.
pub(crate) fn frame_address(doc: &dyn Document, frame: NodeId) -> String {
    doc.attribute(frame, "src")
        .filter(|src| !src.is_empty())
        .map(|src| doc.resolve_url(&src))
        .unwrap_or_default()
}

// ============================================================================
// FrameMapper
// ============================================================================

/// Pulls candidates out of embedded frames and pins each one to the frame
/// element that embeds it.
///
/// Frames are matched by the address they actually loaded after redirects,
/// as reported by the host. A sub-document result whose owner matches no
/// frame is dropped. Bridge failures degrade to "no sub-document
/// candidates" and never fail the scan.
pub struct FrameMapper {
    document: Arc<dyn Document>,
    bridge: Arc<dyn HostBridge>,
}

impl std::fmt::Debug for FrameMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameMapper").finish_non_exhaustive()
    }
}

impl FrameMapper {
    /// Creates a mapper.
    #[inline]
    #[must_use]
    pub fn new(document: Arc<dyn Document>, bridge: Arc<dyn HostBridge>) -> Self {
        Self { document, bridge }
    }

    /// Frame elements of the document, in document order.
    #[must_use]
    pub fn frames(&self) -> Vec<NodeId> {
        self.document.elements_by_tag("iframe")
    }

    /// Asks every sub-document for its own candidates.
    ///
    /// Returns nothing without asking when the document has no frames.
    /// Results are unique by URL.
    pub async fn extract(&self, options: &DiscoveryOptions) -> Vec<Candidate> {
        if self.frames().is_empty() {
            return Vec::new();
        }

        let min_size = options.min_size();
        let reported = match self.bridge.extract_frame_candidates(min_size).await {
            Ok(reported) => reported,
            Err(e) => {
                warn!(error = %e, min_size, "Frame extraction failed");
                return Vec::new();
            }
        };

        let mut seen = FxHashSet::default();
        let candidates: Vec<Candidate> = reported
            .into_iter()
            .filter(|candidate| seen.insert(candidate.url.clone()))
            .map(|candidate| Candidate::frame(candidate.url, candidate.owner_address))
            .collect();

        debug!(count = candidates.len(), min_size, "Frame candidates extracted");
        candidates
    }

    /// Replaces [`Anchor::Frame`] anchors with the embedding frame element.
    ///
    /// Candidates anchored on elements pass through unchanged. Without frames
    /// this is a no-op.
    pub async fn map(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let frames = self.frames();
        if frames.is_empty() {
            return candidates;
        }

        let doc = self.document.as_ref();
        let addresses: Vec<String> = frames
            .iter()
            .map(|&frame| frame_address(doc, frame))
            .collect();
        let loaded = match self.bridge.resolve_frame_sources(&addresses).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, frames = frames.len(), "Frame redirect lookup failed");
                Vec::new()
            }
        };

        candidates
            .into_iter()
            .filter_map(|candidate| match candidate.anchor {
                Anchor::Frame(ref owner) => {
                    // entries past the last frame have no element to anchor on
                    let Some(&frame) = frames
                        .iter()
                        .zip(&loaded)
                        .find_map(|(frame, address)| (address == owner).then_some(frame))
                    else {
                        trace!(url = %candidate.url, owner = %owner, "No frame for owner");
                        return None;
                    };
                    Some(Candidate {
                        url: candidate.url,
                        anchor: Anchor::Embedded(frame),
                    })
                }
                Anchor::Node(_) | Anchor::Embedded(_) => Some(candidate),
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
