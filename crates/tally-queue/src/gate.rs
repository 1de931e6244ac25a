//! Mutual exclusion for the allocation critical section.
//!
//! Allocation reads the primary ledger, computes `max + 1` and appends a row.
//! Those three steps must not interleave between callers or two submissions
//! can observe the same maximum. The gate is a fair (FIFO) async lock, so
//! waiters are admitted in arrival order and a waiter is never starved.
//!
//! Release is tied to [`GateGuard`]'s lifetime: the gate opens again when the
//! guard is dropped, whether the holder finished, returned an error, panicked
//! or was cancelled by a timeout.

use tokio::sync::{Mutex, MutexGuard};

/// Process-wide exclusion gate serializing ticket allocations.
#[derive(Debug, Default)]
pub struct ExclusionGate {
    lock: Mutex<()>,
}

/// Proof of holding the [`ExclusionGate`]. Dropping it releases the gate.
#[derive(Debug)]
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct GateGuard<'a> {
    _held: MutexGuard<'a, ()>,
}

impl ExclusionGate {
    /// Creates an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the gate is free and takes it.
    pub async fn acquire(&self) -> GateGuard<'_> {
        GateGuard {
            _held: self.lock.lock().await,
        }
    }

    /// Takes the gate if nobody holds it.
    pub fn try_acquire(&self) -> Option<GateGuard<'_>> {
        self.lock.try_lock().ok().map(|held| GateGuard { _held: held })
    }

    /// Returns `true` while some caller holds the gate.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

impl GateGuard<'_> {
    /// Releases the gate explicitly.
    pub fn release(self) {
        drop(self);
    }
}
