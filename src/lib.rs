//! Image discovery - ordered, lazy-load-aware image lists for rendered documents.
//!
//! This library finds the images a rendered page shows, upgrades lazily
//! loaded or down-scaled sources to the largest variant the page references,
//! and publishes them in document order. Repeated passes over a growing
//! page are merged into the previous list so a viewer's position stays put.
//!
//! # Architecture
//!
//! The crate is host-agnostic:
//!
//! - **Document (host)**: the [`Document`] trait exposes elements, attributes,
//!   geometry and the displayed source of images
//! - **Host bridge**: [`HostBridge`] answers what the document cannot, either
//!   in memory ([`StaticBridge`]) or over a WebSocket ([`SocketBridge`])
//! - **Session (Rust)**: [`DiscoverySession`] runs resolve, scan, frame
//!   mapping, sort and merge under a FIFO lock
//!
//! Key design principles:
//!
//! - Probe results are memoised per session, first write wins
//! - Every suspension point is bounded by a timeout or the pass lock
//! - Probe and bridge failures degrade the result and never fail a pass
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use image_discovery::{DiscoveryOptions, DiscoverySession, ElementSpec, Result, StaticDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let doc = Arc::new(StaticDocument::new("https://example.com/")?);
//!     doc.append(
//!         doc.root(),
//!         ElementSpec::new("img")
//!             .attr("src", "/thumb-300x200.jpg")
//!             .size(300.0, 200.0),
//!     )?;
//!
//!     let session = DiscoverySession::builder().document(doc).build()?;
//!     let options = DiscoveryOptions::new().with_min_size(180, 150);
//!
//!     for entry in session.run_discovery_pass(&options).await {
//!         println!("{}", entry.address());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | Host collaborators and the WebSocket bridge |
//! | [`dom`] | Document trait and in-memory document |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`merge`] | Positional list reconciliation |
//! | [`options`] | Scan and resolver configuration |
//! | [`probe`] | Byte and pixel size probes |
//! | [`resolve`] | Raw-source rules and source resolution |
//! | [`scan`] | Candidate enumeration, frame mapping, ordering |
//! | [`session`] | Discovery sessions and document events |

// ============================================================================
// Modules
// ============================================================================

/// Host collaborators.
///
/// Cross-origin sizes, frame redirects and frame candidates come through
/// [`HostBridge`].
pub mod bridge;

/// Document model.
///
/// The [`Document`] trait is the seam to the host's rendered page.
pub mod dom;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Positional merge of published lists.
pub mod merge;

/// Scan and resolver configuration.
pub mod options;

/// Size probes and their cache.
pub mod probe;

/// Lazy-image source resolution.
pub mod resolve;

/// Candidate scanning and ordering.
pub mod scan;

/// Discovery sessions.
///
/// Use [`DiscoverySession::builder()`] to create a configured session.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{BridgeServer, FrameCandidate, HostBridge, SocketBridge, StaticBridge};

// Document types
pub use dom::{Document, ElementSpec, Marker, Rect, StaticDocument};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{NodeId, RequestId, ScanId};

// Configuration
pub use options::{DiscoveryOptions, ResolverConfig};

// Probe types
pub use probe::{Fetcher, HttpFetcher, ResolutionCache, SizeOracle};

// Resolution types
pub use resolve::{RawPatternSet, RawSourceRule, SourceResolver, UnlazyReport, UpgradeSource};

// Scan types
pub use scan::{Anchor, Candidate, ImageEntry, OrderedList};

// Session types
pub use session::{
    DiscoverySession, DiscoverySessionBuilder, DocumentEvent, ImageIdentifier, ScanMutex,
    spawn_watcher,
};
