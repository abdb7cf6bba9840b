//! Document-order sorting of mapped candidates.

use std::sync::Arc;

use tracing::trace;

use crate::dom::Document;

use super::frames::frame_address;
use super::{Anchor, Candidate, ImageEntry, OrderedList};

// ============================================================================
// OrderSorter
// ============================================================================

/// Orders candidates by the document position of their anchor element.
///
/// Sub-document candidates sort at their frame element and carry the frame's
/// own address in the output. The sort is stable, so candidates sharing an
/// anchor keep their relative order.
pub struct OrderSorter {
    document: Arc<dyn Document>,
}

impl std::fmt::Debug for OrderSorter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderSorter").finish_non_exhaustive()
    }
}

impl OrderSorter {
    /// Creates a sorter over `document`.
    #[inline]
    #[must_use]
    pub fn new(document: Arc<dyn Document>) -> Self {
        Self { document }
    }

    /// Sorts `candidates` into an [`OrderedList`].
    ///
    /// Candidates whose sub-document anchor was never mapped to a frame are
    /// dropped.
    #[must_use]
    pub fn sort(&self, candidates: Vec<Candidate>) -> OrderedList {
        let doc = self.document.as_ref();

        let mut placed: Vec<_> = candidates
            .into_iter()
            .filter_map(|candidate| match candidate.anchor.node() {
                Some(node) => Some((node, candidate)),
                None => {
                    trace!(url = %candidate.url, "Dropping unmapped frame candidate");
                    None
                }
            })
            .collect();

        placed.sort_by(|(a, _), (b, _)| doc.compare_position(*a, *b));

        placed
            .into_iter()
            .map(|(node, candidate)| match candidate.anchor {
                Anchor::Embedded(_) => {
                    ImageEntry::framed(candidate.url, frame_address(doc, node))
                }
                Anchor::Node(_) | Anchor::Frame(_) => ImageEntry::new(candidate.url),
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
