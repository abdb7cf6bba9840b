//! Per-session memo of observed image sizes.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

// ============================================================================
// ResolutionCache
// ============================================================================

/// Append-only size memo shared by all probes of a session.
///
/// A URL's size is assumed immutable once observed, so entries are never
/// invalidated. Concurrent probes for the same URL race benignly: the first
/// recorded value wins and later writers read it back.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    byte_sizes: RwLock<FxHashMap<String, u64>>,
    pixel_widths: RwLock<FxHashMap<String, u32>>,
}

impl ResolutionCache {
    /// Creates an empty cache.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached byte size of `url`.
    #[must_use]
    pub fn byte_size(&self, url: &str) -> Option<u64> {
        self.byte_sizes.read().get(url).copied()
    }

    /// Records a byte size and returns the stored value.
    pub fn record_byte_size(&self, url: &str, size: u64) -> u64 {
        *self
            .byte_sizes
            .write()
            .entry(url.to_string())
            .or_insert(size)
    }

    /// Cached natural width of `url`.
    #[must_use]
    pub fn pixel_width(&self, url: &str) -> Option<u32> {
        self.pixel_widths.read().get(url).copied()
    }

    /// Records a natural width and returns the stored value.
    pub fn record_pixel_width(&self, url: &str, width: u32) -> u32 {
        *self
            .pixel_widths
            .write()
            .entry(url.to_string())
            .or_insert(width)
    }

    /// Total number of memoized entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.byte_sizes.read().len() + self.pixel_widths.read().len()
    }

    /// Returns `true` if nothing has been memoized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================
