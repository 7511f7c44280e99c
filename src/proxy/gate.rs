//! Concurrency gate bounding in-flight probes

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Admits at most `capacity` probes at a time.
///
/// Waiters are served in submission order (the underlying semaphore is
/// FIFO-fair). Cancellation is only consulted at admission: it refuses new
/// work but never interrupts a probe that already holds a permit.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    cancel: CancellationToken,
}

/// Slot held by one running probe, released on drop
#[derive(Debug)]
pub struct Admission {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// `capacity` must be at least 1; the run configuration is validated
    /// before a gate is built.
    pub fn new(capacity: usize, cancel: CancellationToken) -> Self {
        debug_assert!(capacity >= 1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            cancel,
        }
    }

    /// Wait for a free slot. Returns `None` once cancellation is requested,
    /// including while waiting.
    pub async fn admit(&self) -> Option<Admission> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok()?,
        };

        Some(Admission { _permit: permit })
    }

    /// Slots currently held by running probes
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
