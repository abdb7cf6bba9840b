//! Candidate enumeration, frame mapping and document-order sorting.
//!
//! One discovery pass runs these stages in order:
//!
//! 1. [`CandidateScanner`] collects `(url, element)` pairs from the document
//! 2. [`FrameMapper::extract`] adds candidates reported by embedded frames
//! 3. [`FrameMapper::map`] pins those to the frame element embedding them
//! 4. [`OrderSorter`] sorts everything by document position
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `candidate` | [`Candidate`], [`Anchor`], [`ImageEntry`], [`OrderedList`] |
//! | `scanner` | [`CandidateScanner`] and background URL helpers |
//! | `frames` | [`FrameMapper`] |
//! | `order` | [`OrderSorter`] |

// ============================================================================
// Submodules
// ============================================================================

mod candidate;
mod frames;
mod order;
mod scanner;

// ============================================================================
// Re-exports
// ============================================================================

pub use candidate::{Anchor, Candidate, ImageEntry, OrderedList};
pub use frames::FrameMapper;
pub use order::OrderSorter;
pub use scanner::{CandidateScanner, displayed_url, first_background_url};
