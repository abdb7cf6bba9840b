//! Discovery sessions.
//!
//! This module ties the pipeline stages together and owns the published
//! list.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DiscoverySession`] | Pipeline entry point and published state |
//! | [`DiscoverySessionBuilder`] | Fluent configuration builder |
//! | [`ScanMutex`] | FIFO single-slot lock serialising passes |
//! | [`DocumentEvent`] | Host change notification |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use image_discovery::{DiscoveryOptions, DiscoverySession, DocumentEvent, spawn_watcher};
//!
//! # async fn example(document: Arc<dyn image_discovery::Document>) -> image_discovery::Result<()> {
//! let session = DiscoverySession::builder().document(document).build()?;
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(64);
//! spawn_watcher(session.clone(), rx, DiscoveryOptions::new().with_min_size(180, 150));
//! tx.send(DocumentEvent::Changed).await.ok();
//!
//! let mut lists = session.subscribe();
//! lists.changed().await.ok();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for session configuration.
pub mod builder;

/// Core session implementation.
pub mod core;

/// Document events and the watcher task.
pub mod events;

/// Single-slot pass lock.
pub mod mutex;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::DiscoverySessionBuilder;
pub use core::{DiscoverySession, ImageIdentifier};
pub use events::{DocumentEvent, spawn_watcher};
pub use mutex::{ScanGuard, ScanMutex};
