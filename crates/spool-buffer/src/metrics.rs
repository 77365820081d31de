// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Prometheus metrics for the buffer subsystem.
//!
//! # Metrics Overview
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `spool_buffer_records_added_total` | Counter | Records accepted by add |
//! | `spool_buffer_records_flushed_total` | Counter | Records handed to the sink |
//! | `spool_buffer_records_superseded_total` | Counter | Flushed snapshots kept because a newer add replaced them |
//! | `spool_buffer_records_reaped_total` | Counter | Stale records removed |
//! | `spool_buffer_records_corrupt_total` | Counter | Corrupt records purged |
//! | `spool_buffer_flush_errors_total` | Counter | Failed flush cycles by error type |
//! | `spool_buffer_pending_records` | Gauge | Size of the pending index |
//! | `spool_buffer_flush_duration_seconds` | Histogram | Flush cycle duration |

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};

// =============================================================================
// Metric Definitions
// =============================================================================

static RECORDS_ADDED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "spool_buffer_records_added_total",
        "Total number of records accepted into the buffer"
    )
    .expect("Failed to register records_added_total metric")
});

static RECORDS_FLUSHED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "spool_buffer_records_flushed_total",
        "Total number of records handed to the persistence sink"
    )
    .expect("Failed to register records_flushed_total metric")
});

static RECORDS_SUPERSEDED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "spool_buffer_records_superseded_total",
        "Total number of flushed records kept pending because a newer value arrived"
    )
    .expect("Failed to register records_superseded_total metric")
});

static RECORDS_REAPED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "spool_buffer_records_reaped_total",
        "Total number of stale records removed without being persisted"
    )
    .expect("Failed to register records_reaped_total metric")
});

static RECORDS_CORRUPT_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "spool_buffer_records_corrupt_total",
        "Total number of undecodable records purged"
    )
    .expect("Failed to register records_corrupt_total metric")
});

static FLUSH_ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spool_buffer_flush_errors_total",
        "Total number of failed flush cycles by type",
        &["error_type"]
    )
    .expect("Failed to register flush_errors metric")
});

static PENDING_RECORDS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "spool_buffer_pending_records",
        "Current number of records waiting to be flushed"
    )
    .expect("Failed to register pending_records metric")
});

static FLUSH_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "spool_buffer_flush_duration_seconds",
        "Duration of flush cycles in seconds",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("Failed to register flush_duration metric")
});

// =============================================================================
// Metrics Collector
// =============================================================================

/// Records buffer metrics into the default Prometheus registry.
///
/// A disabled collector turns every call into a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferMetricsCollector {
    enabled: bool,
}

impl BufferMetricsCollector {
    /// Creates a new metrics collector.
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Creates a disabled metrics collector (no-op).
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    /// Returns whether metrics collection is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records accepted adds.
    pub fn record_added(&self, count: u64) {
        if !self.enabled {
            return;
        }
        RECORDS_ADDED_TOTAL.inc_by(count as f64);
    }

    /// Records a completed flush cycle.
    pub fn record_flush_success(&self, flushed: u64, superseded: u64, duration_secs: f64) {
        if !self.enabled {
            return;
        }
        RECORDS_FLUSHED_TOTAL.inc_by(flushed as f64);
        RECORDS_SUPERSEDED_TOTAL.inc_by(superseded as f64);
        FLUSH_DURATION.observe(duration_secs);
    }

    /// Records a failed flush cycle.
    pub fn record_flush_error(&self, error_type: &str) {
        if !self.enabled {
            return;
        }
        FLUSH_ERRORS.with_label_values(&[error_type]).inc();
    }

    /// Records purged corrupt records.
    pub fn record_corrupt(&self, count: u64) {
        if !self.enabled || count == 0 {
            return;
        }
        RECORDS_CORRUPT_TOTAL.inc_by(count as f64);
    }

    /// Records stale records removed by the reaper.
    pub fn record_reaped(&self, count: u64) {
        if !self.enabled || count == 0 {
            return;
        }
        RECORDS_REAPED_TOTAL.inc_by(count as f64);
    }

    /// Updates the pending gauge.
    pub fn set_pending(&self, pending: u64) {
        if !self.enabled {
            return;
        }
        PENDING_RECORDS.set(pending as f64);
    }
}

/// Renders every registered metric in the Prometheus text format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

// =============================================================================
// Tests
// =============================================================================
