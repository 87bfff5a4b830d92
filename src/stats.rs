//! Logger counters
//!
//! Thread-safe counters shared by producers and the worker thread.
//! Uses lock-free atomics for all operations.

use std::sync::atomic::{AtomicU64, Ordering};

/// Engine counters (fully lock-free)
#[derive(Debug, Default)]
pub struct Stats {
    /// Records accepted into the queue
    enqueued: AtomicU64,
    /// Records dropped by level gating (never formatted or queued)
    gated: AtomicU64,
    /// Records refused because the logger was stopping
    rejected: AtomicU64,
    /// Records handled by the worker
    processed: AtomicU64,
    /// Successful buffer flushes to disk
    flushes: AtomicU64,
    /// Flush attempts that failed with an IO error
    flush_failures: AtomicU64,
    /// Bytes given up after flushes kept failing past the retention ceiling
    dropped_bytes: AtomicU64,
}

/// Point-in-time copy of `Stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub enqueued: u64,
    pub gated: u64,
    pub rejected: u64,
    pub processed: u64,
    pub flushes: u64,
    pub flush_failures: u64,
    pub dropped_bytes: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_gated(&self) {
        self.gated.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_flushes(&self, count: u64) {
        self.flushes.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_dropped_bytes(&self, bytes: u64) {
        self.dropped_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            gated: self.gated.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            dropped_bytes: self.dropped_bytes.load(Ordering::Relaxed),
        }
    }
}
