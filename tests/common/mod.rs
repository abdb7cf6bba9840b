//! Shared fixtures for integration tests.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use image_discovery::probe::StaticFetcher;
use image_discovery::{
    DiscoverySession, ElementSpec, HostBridge, NodeId, Result, StaticBridge, StaticDocument,
};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

pub const BASE: &str = "https://example.com/";

// ============================================================================
// Logging
// ============================================================================

/// Installs a test subscriber once; later calls are no-ops.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("image_discovery=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Page
// ============================================================================

/// A document with in-memory fetcher and bridge.
pub struct Page {
    pub doc: Arc<StaticDocument>,
    pub fetcher: Arc<StaticFetcher>,
    pub bridge: Arc<StaticBridge>,
}

impl Page {
    pub fn new() -> Result<Self> {
        init_logging();
        Ok(Self {
            doc: Arc::new(StaticDocument::new(BASE)?),
            fetcher: Arc::new(StaticFetcher::new()),
            bridge: Arc::new(StaticBridge::new()),
        })
    }

    /// Builds a session over the page with its own bridge.
    pub fn session(&self) -> Result<DiscoverySession> {
        self.session_with_bridge(self.bridge.clone())
    }

    pub fn session_with_bridge(&self, bridge: Arc<dyn HostBridge>) -> Result<DiscoverySession> {
        DiscoverySession::builder()
            .document(self.doc.clone())
            .fetcher(self.fetcher.clone())
            .bridge(bridge)
            .build()
    }

    /// Appends an image of the given rendered size under the root.
    pub fn img(&self, spec: ElementSpec, width: f64, height: f64) -> Result<NodeId> {
        self.doc.append(self.doc.root(), spec.size(width, height))
    }

    /// Registers a same-origin JPEG of `bytes` declared bytes.
    pub fn jpeg(&self, path: &str, bytes: u64) {
        let url = format!("{}{}", BASE.trim_end_matches('/'), path);
        self.fetcher.insert_declared(&url, "image/jpeg", bytes);
    }
}
