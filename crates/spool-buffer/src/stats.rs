// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Buffer statistics.
//!
//! Counters are updated with relaxed atomics from the add, flush and reap
//! paths and never take a lock.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lock-free buffer statistics using atomic types.
#[derive(Debug, Default)]
pub struct BufferStatsInner {
    /// Records accepted by `add` (cumulative).
    pub records_added: AtomicU64,
    /// Records handed to the persistence sink (cumulative).
    pub records_flushed: AtomicU64,
    /// Records evicted after a successful flush (cumulative).
    pub records_evicted: AtomicU64,
    /// Flushed snapshots kept because a newer add replaced them (cumulative).
    pub records_superseded: AtomicU64,
    /// Records removed by the stale reaper (cumulative).
    pub records_reaped: AtomicU64,
    /// Corrupt records purged (cumulative).
    pub records_corrupt: AtomicU64,
    /// Number of successful flush cycles.
    pub flush_count: AtomicU64,
    /// Number of failed flush cycles.
    pub flush_errors: AtomicU64,
    /// Last successful flush timestamp (unix nanos).
    pub last_flush_timestamp: AtomicI64,
}

impl BufferStatsInner {
    /// Creates new statistics with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an accepted add.
    #[inline]
    pub fn record_add(&self) {
        self.records_added.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful flush cycle.
    #[inline]
    pub fn record_flush(&self, flushed: u64, evicted: u64, superseded: u64) {
        self.records_flushed.fetch_add(flushed, Ordering::Relaxed);
        self.records_evicted.fetch_add(evicted, Ordering::Relaxed);
        self.records_superseded.fetch_add(superseded, Ordering::Relaxed);
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        self.last_flush_timestamp
            .store(Utc::now().timestamp_nanos_opt().unwrap_or(0), Ordering::Relaxed);
    }

    /// Records a failed flush cycle.
    #[inline]
    pub fn record_flush_error(&self) {
        self.flush_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records purged corrupt records.
    #[inline]
    pub fn record_corrupt(&self, count: u64) {
        self.records_corrupt.fetch_add(count, Ordering::Relaxed);
    }

    /// Records stale records removed by the reaper.
    #[inline]
    pub fn record_reaped(&self, count: u64) {
        self.records_reaped.fetch_add(count, Ordering::Relaxed);
    }

    /// Creates a snapshot of the statistics.
    pub fn snapshot(&self) -> BufferStats {
        let last_flush_nanos = self.last_flush_timestamp.load(Ordering::Relaxed);

        BufferStats {
            records_added: self.records_added.load(Ordering::Relaxed),
            records_flushed: self.records_flushed.load(Ordering::Relaxed),
            records_evicted: self.records_evicted.load(Ordering::Relaxed),
            records_superseded: self.records_superseded.load(Ordering::Relaxed),
            records_reaped: self.records_reaped.load(Ordering::Relaxed),
            records_corrupt: self.records_corrupt.load(Ordering::Relaxed),
            flush_count: self.flush_count.load(Ordering::Relaxed),
            flush_errors: self.flush_errors.load(Ordering::Relaxed),
            last_flush_timestamp: if last_flush_nanos > 0 {
                Some(DateTime::from_timestamp_nanos(last_flush_nanos))
            } else {
                None
            },
        }
    }
}

/// Immutable snapshot of buffer statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BufferStats {
    /// Records accepted by `add`.
    pub records_added: u64,
    /// Records handed to the persistence sink.
    pub records_flushed: u64,
    /// Records evicted after a successful flush.
    pub records_evicted: u64,
    /// Flushed snapshots kept because a newer add replaced them.
    pub records_superseded: u64,
    /// Records removed by the stale reaper.
    pub records_reaped: u64,
    /// Corrupt records purged.
    pub records_corrupt: u64,
    /// Successful flush cycles.
    pub flush_count: u64,
    /// Failed flush cycles.
    pub flush_errors: u64,
    /// Last successful flush.
    pub last_flush_timestamp: Option<DateTime<Utc>>,
}

impl BufferStats {
    /// Returns the time since the last successful flush.
    pub fn time_since_last_flush(&self) -> Option<chrono::Duration> {
        self.last_flush_timestamp.map(|ts| Utc::now() - ts)
    }

    /// Returns the flush success rate.
    pub fn flush_success_rate(&self) -> f64 {
        let total = self.flush_count + self.flush_errors;
        if total == 0 {
            return 1.0;
        }
        self.flush_count as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = BufferStatsInner::new();
        stats.record_add();
        stats.record_add();
        stats.record_flush(2, 1, 1);
        stats.record_corrupt(3);
        stats.record_reaped(4);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.records_added, 2);
        assert_eq!(snapshot.records_flushed, 2);
        assert_eq!(snapshot.records_evicted, 1);
        assert_eq!(snapshot.records_superseded, 1);
        assert_eq!(snapshot.records_corrupt, 3);
        assert_eq!(snapshot.records_reaped, 4);
        assert!(snapshot.last_flush_timestamp.is_some());
    }

    #[test]
    fn test_flush_success_rate() {
        let stats = BufferStatsInner::new();
        assert_eq!(stats.snapshot().flush_success_rate(), 1.0);

        stats.record_flush(1, 1, 0);
        stats.record_flush_error();
        assert_eq!(stats.snapshot().flush_success_rate(), 0.5);
        assert!(stats.snapshot().time_since_last_flush().is_some());
    }
}
