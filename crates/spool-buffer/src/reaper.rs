// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Stale record reaping.
//!
//! Records that have sat in the buffer longer than a threshold are dropped
//! without being persisted. This bounds buffer growth when the durable store
//! stays unavailable, at the cost of losing those writes.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use spool_core::error::BufferResult;
use spool_core::types::BufferedRecord;

use crate::buffer::{store_error, BufferStore};

/// Outcome of one reap pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReapReport {
    /// Keys examined.
    pub scanned: usize,
    /// Stale records removed.
    pub stale: usize,
    /// Corrupt records removed.
    pub corrupt: usize,
    /// Index entries that had no record.
    pub missing: usize,
}

impl ReapReport {
    /// Returns the number of records removed.
    pub fn reaped(&self) -> usize {
        self.stale + self.corrupt
    }
}

/// Removes records older than a threshold.
#[derive(Debug, Clone)]
pub struct StaleReaper {
    buffer: BufferStore,
}

impl StaleReaper {
    /// Creates a reaper over `buffer`.
    pub fn new(buffer: BufferStore) -> Self {
        Self { buffer }
    }

    /// Scans the whole pending index and removes every record whose last add
    /// is older than `threshold`, plus every corrupt record.
    ///
    /// Each removal is a compare-delete against the bytes just read, so a
    /// record refreshed during the scan survives.
    pub async fn reap_stale(&self, threshold: Duration) -> BufferResult<ReapReport> {
        let store = self.buffer.backing_store();
        let ns = self.buffer.namespace();
        let threshold = chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();

        let keys = store
            .set_members(ns.pending_key())
            .await
            .map_err(store_error)?;

        let mut report = ReapReport {
            scanned: keys.len(),
            ..ReapReport::default()
        };

        for key in keys {
            let bytes = match store.hash_get(ns.records_key(), &key).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    if let Ok(true) = store.deindex_if_missing(ns, &key).await {
                        report.missing += 1;
                    }
                    continue;
                }
                Err(e) => {
                    warn!(item_key = %key, error = %e, "Failed to read record during reap");
                    continue;
                }
            };

            // None marks a corrupt record.
            let age = match BufferedRecord::decode(&key, &bytes) {
                Ok(record) => {
                    let age = record.age_at(now);
                    if age <= threshold {
                        continue;
                    }
                    Some(age)
                }
                Err(_) => None,
            };

            match store.delete_if_equals(ns, &key, &bytes).await {
                Ok(true) => match age {
                    Some(age) => {
                        report.stale += 1;
                        debug!(item_key = %key, age_secs = age.num_seconds(), "Reaped stale record");
                    }
                    None => {
                        report.corrupt += 1;
                        warn!(item_key = %key, "Reaped corrupt record, data lost");
                    }
                },
                Ok(false) => debug!(item_key = %key, "Record refreshed during reap, kept"),
                Err(e) => warn!(item_key = %key, error = %e, "Failed to reap record"),
            }
        }

        let stats = self.buffer.stats_inner();
        let metrics = self.buffer.metrics();
        stats.record_reaped(report.stale as u64);
        stats.record_corrupt(report.corrupt as u64);
        metrics.record_reaped(report.stale as u64);
        metrics.record_corrupt(report.corrupt as u64);

        if report.reaped() > 0 {
            info!(
                stale = report.stale,
                corrupt = report.corrupt,
                scanned = report.scanned,
                threshold_secs = threshold.num_seconds(),
                "Reaped stale records"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::store::{MemoryStore, Namespace};
    use spool_core::types::OwnerId;

    fn buffer() -> BufferStore {
        BufferStore::new(Arc::new(MemoryStore::new()), Namespace::new("test"))
    }

    fn aged(key: &str, age: chrono::Duration) -> BufferedRecord {
        BufferedRecord::with_timestamp(OwnerId::UNLINKED, key, b"x".to_vec(), Utc::now() - age)
    }

    #[tokio::test]
    async fn test_reap_threshold_boundary() {
        let buffer = buffer();
        let threshold = Duration::from_secs(3600);
        buffer.put(&aged("old", chrono::Duration::seconds(3601))).await.unwrap();
        buffer.put(&aged("young", chrono::Duration::seconds(3599))).await.unwrap();

        let report = StaleReaper::new(buffer.clone()).reap_stale(threshold).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.stale, 1);
        assert!(buffer.get("old").await.unwrap().is_none());
        assert!(buffer.get("young").await.unwrap().is_some());
        assert_eq!(buffer.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reap_zero_threshold_keeps_future_stamped() {
        let buffer = buffer();
        let ahead = BufferedRecord::with_timestamp(
            OwnerId::UNLINKED,
            "ahead",
            b"x".to_vec(),
            Utc::now() + chrono::Duration::seconds(30),
        );
        buffer.put(&ahead).await.unwrap();
        buffer.put(&aged("old", chrono::Duration::seconds(5))).await.unwrap();

        let report = StaleReaper::new(buffer.clone()).reap_stale(Duration::ZERO).await.unwrap();
        assert_eq!(report.stale, 1);
        assert!(buffer.get("ahead").await.unwrap().is_some());
        assert!(buffer.get("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reap_removes_corrupt() {
        let buffer = buffer();
        let ns = buffer.namespace().clone();
        let store = buffer.backing_store();
        store.hash_set(ns.records_key(), "bad", b"nope").await.unwrap();
        store.set_add(ns.pending_key(), "bad").await.unwrap();

        let report = StaleReaper::new(buffer.clone())
            .reap_stale(Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(report.corrupt, 1);
        assert_eq!(report.reaped(), 1);
        assert_eq!(buffer.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reap_deindexes_missing() {
        let buffer = buffer();
        let ns = buffer.namespace().clone();
        buffer.backing_store().set_add(ns.pending_key(), "ghost").await.unwrap();

        let report = StaleReaper::new(buffer.clone())
            .reap_stale(Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(report.missing, 1);
        assert_eq!(report.reaped(), 0);
        assert_eq!(buffer.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reap_empty_buffer() {
        let report = StaleReaper::new(buffer())
            .reap_stale(Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(report, ReapReport::default());
    }
}
