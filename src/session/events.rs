//! Document change notifications and the task that reacts to them.
//!
//! The host forwards its mutation callbacks as [`DocumentEvent`]s over an
//! mpsc channel. [`spawn_watcher`] turns them into resolver re-checks and
//! discovery passes.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::identifiers::NodeId;
use crate::options::DiscoveryOptions;

use super::core::DiscoverySession;

// ============================================================================
// DocumentEvent
// ============================================================================

/// Change notification from the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEvent {
    /// Elements were added, removed or moved.
    Changed,
    /// The source of an image element changed.
    SourceMutated(NodeId),
}

// ============================================================================
// Watcher
// ============================================================================

/// Spawns the task that reacts to document events.
///
/// Source mutations are re-checked one at a time, in arrival order. A burst
/// of `Changed` events already queued when the first one is handled
/// collapses into a single discovery pass. The task ends when every sender
/// is dropped.
pub fn spawn_watcher(
    session: DiscoverySession,
    mut events: mpsc::Receiver<DocumentEvent>,
    options: DiscoveryOptions,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                DocumentEvent::SourceMutated(node) => {
                    let upgrade = session.recheck(node).await;
                    trace!(%node, ?upgrade, "Source mutation handled");
                }
                DocumentEvent::Changed => {
                    let mut coalesced = 0usize;
                    let mut mutated = Vec::new();
                    while let Ok(next) = events.try_recv() {
                        match next {
                            DocumentEvent::Changed => coalesced += 1,
                            DocumentEvent::SourceMutated(node) => mutated.push(node),
                        }
                    }

                    for node in mutated {
                        session.recheck(node).await;
                    }

                    debug!(session = %session.id(), coalesced, "Document changed");
                    session.run_discovery_pass(&options).await;
                }
            }
        }

        debug!(session = %session.id(), "Document event stream closed");
    })
}

// ============================================================================
// Tests
// ============================================================================
