//! Tracker counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Default)]
pub struct TrackerStats {
    submitted: AtomicU64,
    suppressed: AtomicU64,
    persisted: AtomicU64,
    duplicates: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`TrackerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct TrackerStatsSnapshot {
    /// Payloads accepted by `submit`
    pub submitted: u64,
    /// Payloads discarded by the recursion guard
    pub suppressed: u64,
    pub persisted: u64,
    /// Payloads whose unique id was already stored
    pub duplicates: u64,
    /// Payloads rejected because the queue was full or closed
    pub dropped: u64,
    /// Payloads that failed validation or storage
    pub failed: u64,
}

impl TrackerStats {
    pub(super) fn incr_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn incr_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn incr_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn incr_duplicates(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn incr_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn incr_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TrackerStatsSnapshot {
        TrackerStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
