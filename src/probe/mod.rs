//! Byte-size and pixel-size probes.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `cache` | [`ResolutionCache`] append-only memo of observed sizes |
//! | `fetch` | [`Fetcher`] trait, [`HttpFetcher`] and [`StaticFetcher`] |
//! | `oracle` | [`SizeOracle`] combining cache, fetcher and host bridge |

// ============================================================================
// Submodules
// ============================================================================

mod cache;
mod fetch;
mod oracle;

// ============================================================================
// Re-exports
// ============================================================================

pub use cache::ResolutionCache;
pub use fetch::{Fetcher, HeadInfo, HttpFetcher, StaticFetcher, decode_data_url};
pub use oracle::SizeOracle;
