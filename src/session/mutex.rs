//! Single-slot asynchronous lock serialising discovery passes.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

// ============================================================================
// ScanMutex
// ============================================================================

/// Release capability returned by [`ScanMutex::acquire`].
///
/// The slot is released when the guard is dropped, on every exit path.
pub type ScanGuard<T> = OwnedMutexGuard<T>;

/// FIFO-fair single-permit lock around the state a pass mutates.
///
/// Waiters are served in the order they called [`acquire`](Self::acquire),
/// so overlapping triggers queue up and run one after another.
#[derive(Debug)]
pub struct ScanMutex<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for ScanMutex<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for ScanMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> ScanMutex<T> {
    /// Creates an unlocked mutex holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Waits until every earlier holder has released, then takes the slot.
    pub async fn acquire(&self) -> ScanGuard<T> {
        Arc::clone(&self.inner).lock_owned().await
    }

    /// Takes the slot only if it is free right now.
    #[must_use]
    pub fn try_acquire(&self) -> Option<ScanGuard<T>> {
        Arc::clone(&self.inner).try_lock_owned().ok()
    }

    /// Returns `true` if a pass currently holds the slot.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

// ============================================================================
// Tests
// ============================================================================
