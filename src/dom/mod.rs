//! Document model consumed by the discovery pipeline.
//!
//! The pipeline never touches a real DOM directly. Hosts implement
//! [`Document`] over whatever rendered tree they own, and the crate ships
//! [`StaticDocument`], an in-memory tree used for snapshots and tests.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `document` | [`Document`] trait and [`Marker`] classes |
//! | `geometry` | [`Rect`] rendered rectangles |
//! | `snapshot` | [`StaticDocument`] in-memory implementation |
//!
//! # Example
//!
//! ```ignore
//! use image_discovery::dom::{Document, ElementSpec, StaticDocument};
//!
//! let doc = StaticDocument::new("https://example.com/gallery")?;
//! let img = doc.append(
//!     doc.root(),
//!     ElementSpec::new("img").attr("src", "/thumb.jpg").size(300.0, 200.0),
//! )?;
//! assert_eq!(doc.current_source(img), "https://example.com/thumb.jpg");
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod document;
mod geometry;
mod snapshot;

// ============================================================================
// Re-exports
// ============================================================================

pub use document::{Document, Marker};
pub use geometry::Rect;
pub use snapshot::{ElementSpec, StaticDocument};
