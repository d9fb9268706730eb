//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count requests currently being served
//! - Give each request an id for trace logs
//! - Report the count when a drain misses its deadline

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a request within this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestSeq(u64);

impl std::fmt::Display for RequestSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Tracks active requests for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    active_count: Arc<AtomicU64>,
    next_seq: Arc<AtomicU64>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active request. Returns a guard that decrements on drop.
    pub fn track(&self) -> InFlightGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            active_count: Arc::clone(&self.active_count),
            seq: RequestSeq(self.next_seq.fetch_add(1, Ordering::Relaxed) + 1),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a request's lifetime.
#[derive(Debug)]
pub struct InFlightGuard {
    active_count: Arc<AtomicU64>,
    seq: RequestSeq,
}

impl InFlightGuard {
    pub fn seq(&self) -> RequestSeq {
        self.seq
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(request = %self.seq, "Request finished");
    }
}
