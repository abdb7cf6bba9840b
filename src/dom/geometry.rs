//! Rendered rectangles.

use serde::{Deserialize, Serialize};

// ============================================================================
// Rect
// ============================================================================

/// On-screen rectangle of a rendered element, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Rendered width.
    pub width: f64,
    /// Rendered height.
    pub height: f64,
}

impl Rect {
    /// Creates a rectangle.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle at the origin.
    #[inline]
    #[must_use]
    pub const fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Returns the shorter side.
    #[inline]
    #[must_use]
    pub fn min_side(&self) -> f64 {
        self.width.min(self.height)
    }

    /// Returns `true` if both sides reach the given minimums (inclusive).
    #[inline]
    #[must_use]
    pub fn meets(&self, min_width: u32, min_height: u32) -> bool {
        self.width >= f64::from(min_width) && self.height >= f64::from(min_height)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meets_is_inclusive() {
        let rect = Rect::from_size(100.0, 80.0);
        assert!(rect.meets(100, 80));
        assert!(!rect.meets(101, 80));
        assert!(!rect.meets(100, 81));
    }

    #[test]
    fn test_min_side() {
        assert_eq!(Rect::new(5.0, 5.0, 40.0, 60.0).min_side(), 40.0);
    }
}
