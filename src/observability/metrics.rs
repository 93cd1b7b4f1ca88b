//! Metrics registry for the execution layer
//!
//! - Counters only
//! - Monotonic increase
//! - Reset only on process start
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters shared by the scan bridge and query contexts.
///
/// Uses Relaxed ordering; counters are observed, never synchronized on.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Cursors opened, including reopens
    cursors_opened: AtomicU64,
    /// Cursors closed
    cursors_closed: AtomicU64,
    /// Rows produced by scans
    rows_scanned: AtomicU64,
    /// Buffer-full signals returned to callers
    buffer_full: AtomicU64,
    /// Scans failed by invalidation
    scans_invalidated: AtomicU64,
    /// Deadlines exceeded
    timeouts: AtomicU64,
    /// Row converters allocated by the pool
    converters_allocated: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment cursors opened
    pub fn increment_cursors_opened(&self) {
        self.cursors_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment cursors closed
    pub fn increment_cursors_closed(&self) {
        self.cursors_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Add scanned rows
    pub fn add_rows_scanned(&self, rows: u64) {
        self.rows_scanned.fetch_add(rows, Ordering::Relaxed);
    }

    /// Increment buffer-full signals
    pub fn increment_buffer_full(&self) {
        self.buffer_full.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment invalidated scans
    pub fn increment_scans_invalidated(&self) {
        self.scans_invalidated.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment timeouts
    pub fn increment_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment converters allocated
    pub fn increment_converters_allocated(&self) {
        self.converters_allocated.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cursors_opened: self.cursors_opened.load(Ordering::Relaxed),
            cursors_closed: self.cursors_closed.load(Ordering::Relaxed),
            rows_scanned: self.rows_scanned.load(Ordering::Relaxed),
            buffer_full: self.buffer_full.load(Ordering::Relaxed),
            scans_invalidated: self.scans_invalidated.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            converters_allocated: self.converters_allocated.load(Ordering::Relaxed),
        }
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub cursors_opened: u64,
    pub cursors_closed: u64,
    pub rows_scanned: u64,
    pub buffer_full: u64,
    pub scans_invalidated: u64,
    pub timeouts: u64,
    pub converters_allocated: u64,
}
