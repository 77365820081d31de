// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Custom Test Assertions
//!
//! Buffer-level assertions with informative failure messages.

use spool_buffer::{BufferStore, FlushReport};

/// Assert the number of pending records.
pub async fn assert_pending(buffer: &BufferStore, expected: u64) {
    let actual = buffer.count().await.expect("count failed");
    assert_eq!(
        actual, expected,
        "Expected {} pending records in '{}', found {}",
        expected,
        buffer.namespace().prefix(),
        actual
    );
}

/// Assert the buffered payload of `item_key`.
pub async fn assert_buffered(buffer: &BufferStore, item_key: &str, expected: &[u8]) {
    let record = buffer
        .get(item_key)
        .await
        .expect("get failed")
        .unwrap_or_else(|| panic!("Expected '{}' to be buffered", item_key));
    assert_eq!(
        record.payload,
        expected,
        "Buffered payload of '{}' differs: {:?}",
        item_key,
        String::from_utf8_lossy(&record.payload)
    );
}

/// Assert `item_key` is no longer buffered.
pub async fn assert_not_buffered(buffer: &BufferStore, item_key: &str) {
    let record = buffer.get(item_key).await.expect("get failed");
    assert!(
        record.is_none(),
        "Expected '{}' to be evicted, still buffered",
        item_key
    );
}

/// Assertion extensions for flush reports.
pub trait FlushReportAssertions {
    /// Assert every flushed record was evicted.
    fn assert_fully_evicted(&self);

    /// Assert `selected` splits exactly into the outcome counters.
    fn assert_accounted(&self);
}

impl FlushReportAssertions for FlushReport {
    fn assert_fully_evicted(&self) {
        assert_eq!(
            self.flushed, self.evicted,
            "Expected all {} flushed records evicted: {:?}",
            self.flushed, self
        );
        assert_eq!(self.superseded, 0, "Unexpected superseded records: {:?}", self);
    }

    fn assert_accounted(&self) {
        assert_eq!(
            self.selected,
            self.flushed + self.corrupt + self.missing,
            "Selection not accounted for: {:?}",
            self
        );
        assert_eq!(
            self.flushed,
            self.evicted + self.superseded,
            "Flushed records not accounted for: {:?}",
            self
        );
    }
}
