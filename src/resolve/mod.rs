//! Lazy-source detection and upgrade.
//!
//! Pages routinely display a placeholder or a down-scaled thumbnail and keep
//! the real image URL in a `data-*` attribute, a `srcset` ladder, or encoded
//! in the thumbnail URL itself. This module finds those URLs, probes them,
//! and swaps the element over when one is strictly larger.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `pattern` | [`RawSourceRule`]s, URL extraction, attribute pass-list |
//! | `resolver` | [`SourceResolver`] and the whole-document unlazy pass |

// ============================================================================
// Submodules
// ============================================================================

mod pattern;
mod resolver;

// ============================================================================
// Re-exports
// ============================================================================

pub use pattern::{
    ExtensionArgsRule, PASS_LIST, RawPatternSet, RawSourceRule, ResolutionSuffixRule,
    extract_urls, is_pass_listed, normalize_protocol,
};
pub use resolver::{SourceResolver, UnlazyReport, UpgradeSource};
