//! Shared run counters and the progress snapshot written to the progress log.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters shared by every worker of a run.
#[derive(Debug, Default)]
pub struct RunCounters {
    total: AtomicU64,
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

/// Point-in-time copy of [`RunCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: u64,
    /// Records whose LLM stage finished (successfully or not).
    pub processed: u64,
    /// Records written to the database.
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub percent_complete: f64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn add_processed(&self, n: u64) {
        self.processed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_succeeded(&self, n: u64) {
        self.succeeded.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_failed(&self, n: u64) {
        self.failed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_skipped(&self, n: u64) {
        self.skipped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let skipped = self.skipped.load(Ordering::Relaxed);

        let finished = succeeded + failed + skipped;
        let percent_complete = if total == 0 {
            100.0
        } else {
            (finished.min(total) as f64 / total as f64 * 1000.0).round() / 10.0
        };

        ProgressSnapshot {
            total,
            processed: self.processed.load(Ordering::Relaxed),
            succeeded,
            failed,
            skipped,
            percent_complete,
        }
    }
}
