//! Queue counters.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters shared by the dispatcher.
#[derive(Debug, Default)]
pub struct QueueCounters {
    /// Handler invocations claimed but not yet finished.
    pub processing: AtomicUsize,

    /// Successful handler invocations.
    pub completed: AtomicU64,

    /// Jobs that exhausted their retries in some group.
    pub failed: AtomicU64,
}

impl QueueCounters {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly launched invocation.
    pub fn record_launch(&self) {
        self.processing.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a finished invocation.
    pub fn record_finish(&self) {
        self.processing.fetch_sub(1, Ordering::SeqCst);
    }

    /// Record a success.
    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a terminal failure.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Current in-flight count.
    pub fn processing(&self) -> usize {
        self.processing.load(Ordering::SeqCst)
    }
}

/// Point-in-time queue statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Jobs in the store (includes jobs some group is still handling).
    pub pending: usize,
    /// Handler invocations in flight.
    pub processing: usize,
    /// Successful handler invocations.
    pub completed: u64,
    /// Terminal failures.
    pub failed: u64,
    /// Number of consumer groups.
    pub consumer_groups: usize,
}
