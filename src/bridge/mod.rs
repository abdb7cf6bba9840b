//! Host runtime bridge.
//!
//! Some answers can only come from outside the document: byte sizes of
//! cross-origin images, where embedded frames really ended up after
//! redirects, and the images found inside those frames. [`HostBridge`] is the
//! contract for those collaborators.
//!
//! # Implementations
//!
//! | Type | Description |
//! |------|-------------|
//! | [`StaticBridge`] | In-memory answers (no frames, no cross-origin sizes by default) |
//! | [`SocketBridge`] | JSON requests over a WebSocket to the host runtime |
//!
//! # Wire format
//!
//! [`SocketBridge`] sends `{"id": "<uuid>", "msg": "get_size", "url": ".."}`,
//! `{"id": .., "msg": "get_redirect", "data": [..]}` and
//! `{"id": .., "msg": "extract_frames", "minSize": ..}`, and expects
//! `{"id": .., "type": "success", "result": ..}` or
//! `{"id": .., "type": "error", "message": ..}` back.

// ============================================================================
// Submodules
// ============================================================================

mod connection;
mod protocol;
mod server;

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::SocketBridge;
pub use protocol::{BridgeMessage, BridgeRequest, BridgeResponse, ResponseType};
pub use server::BridgeServer;

// ============================================================================
// FrameCandidate
// ============================================================================

/// An image found inside an embedded frame.
///
/// Deserializes from either `{"url": .., "ownerAddress": ..}` or the
/// positional `[url, ownerAddress]` pair hosts usually send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameCandidate {
    /// Image URL inside the frame.
    pub url: String,
    /// Address of the frame document that owns it.
    pub owner_address: String,
}

impl FrameCandidate {
    /// Creates a frame candidate.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>, owner_address: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            owner_address: owner_address.into(),
        }
    }
}

// ============================================================================
// HostBridge
// ============================================================================

/// Collaborators provided by the host runtime.
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Byte size of a cross-origin image, 0 when unknown.
    async fn size_lookup(&self, url: &str) -> Result<u64>;

    /// For each frame address, the URL actually loaded after redirects.
    ///
    /// The result is positional: entry `i` belongs to `addresses[i]`.
    async fn resolve_frame_sources(&self, addresses: &[String]) -> Result<Vec<String>>;

    /// Runs a candidate scan inside every embedded frame.
    async fn extract_frame_candidates(&self, min_size: u32) -> Result<Vec<FrameCandidate>>;
}

// ============================================================================
// StaticBridge
// ============================================================================

/// In-memory [`HostBridge`].
///
/// Unknown sizes are 0, unknown frame addresses resolve to themselves, and
/// frame extraction returns whatever was registered.
#[derive(Debug, Default)]
pub struct StaticBridge {
    sizes: RwLock<FxHashMap<String, u64>>,
    redirects: RwLock<FxHashMap<String, String>>,
    frame_candidates: RwLock<Vec<FrameCandidate>>,
    frames_unavailable: AtomicBool,
    last_min_size: Mutex<Option<u32>>,
}

impl StaticBridge {
    /// Creates a bridge with no answers.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the byte size of a cross-origin URL.
    pub fn set_size(&self, url: &str, size: u64) {
        self.sizes.write().insert(url.to_string(), size);
    }

    /// Registers where a frame address ends up.
    pub fn set_redirect(&self, address: &str, loaded: &str) {
        self.redirects
            .write()
            .insert(address.to_string(), loaded.to_string());
    }

    /// Replaces the frame extraction result.
    pub fn set_frame_candidates(&self, candidates: Vec<FrameCandidate>) {
        *self.frame_candidates.write() = candidates;
    }

    /// Makes frame requests fail, as when the host is gone.
    pub fn set_frames_unavailable(&self, unavailable: bool) {
        self.frames_unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Minimum size sent with the latest extraction request.
    #[must_use]
    pub fn last_min_size(&self) -> Option<u32> {
        *self.last_min_size.lock()
    }

    fn check_frames(&self) -> Result<()> {
        if self.frames_unavailable.load(Ordering::Relaxed) {
            return Err(Error::BridgeClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl HostBridge for StaticBridge {
    async fn size_lookup(&self, url: &str) -> Result<u64> {
        Ok(self.sizes.read().get(url).copied().unwrap_or(0))
    }

    async fn resolve_frame_sources(&self, addresses: &[String]) -> Result<Vec<String>> {
        self.check_frames()?;
        let redirects = self.redirects.read();
        Ok(addresses
            .iter()
            .map(|address| {
                redirects
                    .get(address)
                    .cloned()
                    .unwrap_or_else(|| address.clone())
            })
            .collect())
    }

    async fn extract_frame_candidates(&self, min_size: u32) -> Result<Vec<FrameCandidate>> {
        self.check_frames()?;
        *self.last_min_size.lock() = Some(min_size);
        Ok(self.frame_candidates.read().clone())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_candidate_from_pair() {
        let candidate: FrameCandidate =
            serde_json::from_str(r#"["https://f.test/a.jpg", "https://f.test/embed"]"#)
                .expect("parse pair");
        assert_eq!(
            candidate,
            FrameCandidate::new("https://f.test/a.jpg", "https://f.test/embed")
        );
    }

    #[test]
    fn test_frame_candidate_from_object() {
        let candidate: FrameCandidate = serde_json::from_str(
            r#"{"url": "https://f.test/a.jpg", "ownerAddress": "https://f.test/embed"}"#,
        )
        .expect("parse object");
        assert_eq!(candidate.owner_address, "https://f.test/embed");
    }

    #[tokio::test]
    async fn test_static_bridge_redirects_are_positional() {
        let bridge = StaticBridge::new();
        bridge.set_redirect("https://a.test/short", "https://a.test/long");

        let resolved = bridge
            .resolve_frame_sources(&["https://b.test/x".into(), "https://a.test/short".into()])
            .await
            .expect("resolve");
        assert_eq!(resolved, vec!["https://b.test/x", "https://a.test/long"]);
    }

    #[tokio::test]
    async fn test_static_bridge_records_min_size() {
        let bridge = StaticBridge::new();
        assert!(bridge.extract_frame_candidates(120).await.unwrap().is_empty());
        assert_eq!(bridge.last_min_size(), Some(120));
    }

    #[tokio::test]
    async fn test_unavailable_frames() {
        let bridge = StaticBridge::new();
        bridge.set_frames_unavailable(true);
        let err = bridge.extract_frame_candidates(0).await.unwrap_err();
        assert!(err.is_bridge_error());
        assert_eq!(bridge.size_lookup("https://a.test/x.jpg").await.unwrap(), 0);
    }
}
