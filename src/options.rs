//! Discovery and resolver configuration.
//!
//! [`DiscoveryOptions`] is the per-pass configuration the host sends
//! (`{"minWidth": .., "minHeight": .., "svgFilter": ..}`), and
//! [`ResolverConfig`] carries the timing knobs of source resolution.
//!
//! # Example
//!
//! ```ignore
//! use image_discovery::DiscoveryOptions;
//!
//! let options = DiscoveryOptions::new()
//!     .with_min_size(180, 150)
//!     .with_svg_filter(true);
//!
//! assert!(options.is_filtered());
//! assert_eq!(options.min_size(), 150);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dom::Document;
use crate::error::{Error, Result};
use crate::identifiers::NodeId;

// ============================================================================
// Constants
// ============================================================================

/// Interval between checks that a swapped source is displayed.
pub const DEFAULT_SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Ceiling on waiting for a swapped source to be displayed.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(3);

/// Ceiling on a single decode probe.
pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Shorter rendered side an image needs before it is worth resolving.
pub const DEFAULT_UNLAZY_MIN_SIDE: f64 = 50.0;

/// Margin subtracted from a wrapper's image size when tuning thresholds.
const WRAPPER_MARGIN: f64 = 3.0;

// ============================================================================
// DiscoveryOptions
// ============================================================================

/// Per-pass scan configuration.
///
/// `min_width == min_height == 0` selects the unfiltered scan mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscoveryOptions {
    /// Minimum rendered width in CSS pixels.
    pub min_width: u32,

    /// Minimum rendered height in CSS pixels.
    pub min_height: u32,

    /// Drop vector-graphics URLs.
    pub svg_filter: bool,
}

impl DiscoveryOptions {
    /// Creates unfiltered options.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_width: 0,
            min_height: 0,
            svg_filter: false,
        }
    }

    /// Parses options from the host's JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets both minimum dimensions.
    #[inline]
    #[must_use]
    pub const fn with_min_size(mut self, width: u32, height: u32) -> Self {
        self.min_width = width;
        self.min_height = height;
        self
    }

    /// Sets the minimum rendered width.
    #[inline]
    #[must_use]
    pub const fn with_min_width(mut self, width: u32) -> Self {
        self.min_width = width;
        self
    }

    /// Sets the minimum rendered height.
    #[inline]
    #[must_use]
    pub const fn with_min_height(mut self, height: u32) -> Self {
        self.min_height = height;
        self
    }

    /// Toggles vector-graphics exclusion.
    #[inline]
    #[must_use]
    pub const fn with_svg_filter(mut self, enabled: bool) -> Self {
        self.svg_filter = enabled;
        self
    }

    /// Returns `true` if a minimum size constraint is configured.
    #[inline]
    #[must_use]
    pub const fn is_filtered(&self) -> bool {
        self.min_width != 0 || self.min_height != 0
    }

    /// Smaller of the two minimums, as sent to sub-document scans.
    #[inline]
    #[must_use]
    pub fn min_size(&self) -> u32 {
        self.min_width.min(self.min_height)
    }

    /// Returns `true` if `url` must never be published.
    #[must_use]
    pub fn is_excluded(&self, url: &str) -> bool {
        url.is_empty() || url == "about:blank" || (self.svg_filter && url.contains(".svg"))
    }

    /// Lowers the thresholds to fit the gallery `node` belongs to.
    ///
    /// Galleries often repeat a wrapper `div` whose images are slightly
    /// smaller than the one the viewer was opened on. Every visible `div`
    /// sharing a class with the nearest wrapper contributes its largest
    /// image; wrappers at least half of `node_size` cap the thresholds at
    /// their size minus a small margin.
    pub fn tune_for_wrapper(&mut self, doc: &dyn Document, node: NodeId, node_size: f64) {
        if node_size <= 0.0 {
            return;
        }

        let Some(wrapper) = doc.closest(node, "div") else {
            return;
        };
        let classes = doc.classes(wrapper);
        if classes.is_empty() {
            return;
        }

        let mut widths = Vec::new();
        let mut heights = Vec::new();
        for div in doc.elements_by_tag("div") {
            if !doc.classes(div).iter().any(|c| classes.contains(c)) {
                continue;
            }
            // ad slots often reuse the wrapper and get hidden by blockers
            if !doc.is_rendered(div) {
                continue;
            }

            let images = doc.descendants_by_tag(div, "img");
            if images.is_empty() {
                continue;
            }

            let (max_width, max_height) = images
                .iter()
                .map(|&img| doc.bounding_rect(img))
                .fold((f64::MIN, f64::MIN), |(w, h), rect| {
                    (w.max(rect.width), h.max(rect.height))
                });
            widths.push(max_width);
            heights.push(max_height);
        }

        let fit = |sizes: &[f64]| {
            sizes
                .iter()
                .copied()
                .filter(|size| size * 2.0 >= node_size)
                .reduce(f64::min)
                .map(|size| (size - WRAPPER_MARGIN).max(0.0) as u32)
        };

        if let Some(width) = fit(&widths) {
            self.min_width = self.min_width.min(width);
        }
        if let Some(height) = fit(&heights) {
            self.min_height = self.min_height.min(height);
        }

        debug!(
            min_width = self.min_width,
            min_height = self.min_height,
            wrappers = widths.len(),
            "Tuned thresholds for wrapper"
        );
    }
}

// ============================================================================
// ResolverConfig
// ============================================================================

/// Timing configuration for source resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverConfig {
    /// Interval between settle checks after a swap.
    pub settle_poll_interval: Duration,

    /// Maximum wait for a swap to settle.
    pub settle_timeout: Duration,

    /// Maximum wait for a decode probe.
    pub decode_timeout: Duration,

    /// Shorter rendered side an image needs to be resolved.
    pub unlazy_min_side: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverConfig {
    /// Creates the default configuration.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            settle_poll_interval: DEFAULT_SETTLE_POLL_INTERVAL,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            decode_timeout: DEFAULT_DECODE_TIMEOUT,
            unlazy_min_side: DEFAULT_UNLAZY_MIN_SIDE,
        }
    }

    /// Sets the settle poll interval.
    #[inline]
    #[must_use]
    pub const fn with_settle_poll_interval(mut self, interval: Duration) -> Self {
        self.settle_poll_interval = interval;
        self
    }

    /// Sets the settle ceiling.
    #[inline]
    #[must_use]
    pub const fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    /// Sets the decode ceiling.
    #[inline]
    #[must_use]
    pub const fn with_decode_timeout(mut self, timeout: Duration) -> Self {
        self.decode_timeout = timeout;
        self
    }

    /// Sets the minimum rendered side for resolution.
    #[inline]
    #[must_use]
    pub const fn with_unlazy_min_side(mut self, side: f64) -> Self {
        self.unlazy_min_side = side;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an interval is zero or the settle ceiling
    /// is shorter than one poll.
    pub fn validate(&self) -> Result<()> {
        if self.settle_poll_interval.is_zero() {
            return Err(Error::config("Settle poll interval must be greater than zero"));
        }
        if self.settle_timeout < self.settle_poll_interval {
            return Err(Error::config(
                "Settle timeout must be at least one poll interval",
            ));
        }
        if self.decode_timeout.is_zero() {
            return Err(Error::config("Decode timeout must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
