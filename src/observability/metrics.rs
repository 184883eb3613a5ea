//! Pipeline metrics
//!
//! - Counters only, monotonic
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by every transform of a pipeline
///
/// Relaxed ordering is enough: counters are read after the pipeline joins
/// its transforms.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Blocks pulled from input ports
    blocks_in: AtomicU64,
    /// Blocks pushed to output ports
    blocks_out: AtomicU64,
    /// Rows pushed to output ports
    rows_out: AtomicU64,
    /// Rows ordered by sort transforms
    rows_sorted: AtomicU64,
    /// Blocks delivered to the consumer callback
    blocks_delivered: AtomicU64,
    pipelines_completed: AtomicU64,
    pipelines_failed: AtomicU64,
    pipelines_cancelled: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_blocks_in(&self) {
        self.blocks_in.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one emitted block of `rows` rows
    pub fn record_block_out(&self, rows: usize) {
        self.blocks_out.fetch_add(1, Ordering::Relaxed);
        self.rows_out.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn add_rows_sorted(&self, rows: usize) {
        self.rows_sorted.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn increment_blocks_delivered(&self) {
        self.blocks_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_completed(&self) {
        self.pipelines_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.pipelines_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cancelled(&self) {
        self.pipelines_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            blocks_in: self.blocks_in.load(Ordering::Relaxed),
            blocks_out: self.blocks_out.load(Ordering::Relaxed),
            rows_out: self.rows_out.load(Ordering::Relaxed),
            rows_sorted: self.rows_sorted.load(Ordering::Relaxed),
            blocks_delivered: self.blocks_delivered.load(Ordering::Relaxed),
            pipelines_completed: self.pipelines_completed.load(Ordering::Relaxed),
            pipelines_failed: self.pipelines_failed.load(Ordering::Relaxed),
            pipelines_cancelled: self.pipelines_cancelled.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub blocks_in: u64,
    pub blocks_out: u64,
    pub rows_out: u64,
    pub rows_sorted: u64,
    pub blocks_delivered: u64,
    pub pipelines_completed: u64,
    pub pipelines_failed: u64,
    pub pipelines_cancelled: u64,
}

impl MetricsSnapshot {
    /// Serializes the snapshot as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
