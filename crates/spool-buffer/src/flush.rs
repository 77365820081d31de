// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Batch flushing with conditional eviction.
//!
//! One flush cycle:
//!
//! 1. Picks up to `max_items` keys from the pending index in arbitrary order.
//! 2. Snapshots each key's stored bytes. Keys without a record are deindexed;
//!    undecodable records are purged as losses.
//! 3. Hands the decoded batch to the persistence sink in a single call.
//! 4. On success, evicts each key only if its stored bytes still equal the
//!    snapshot. A key rewritten since the snapshot stays pending with its
//!    newer value and goes out with a later cycle.
//! 5. On failure, evicts nothing.
//!
//! The snapshot comparison is what keeps a concurrent add from being lost:
//! the sink may have persisted the older value, but the newer one is still
//! buffered and will be persisted too.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use spool_core::error::BufferResult;
use spool_core::types::BufferedRecord;

use crate::buffer::{store_error, BufferStore};
use crate::sink::PersistenceSink;

/// Default cap on records per flush cycle.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;

/// Outcome of one flush cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    /// Keys picked from the pending index.
    pub selected: usize,
    /// Records handed to the sink.
    pub flushed: usize,
    /// Flushed records removed from the buffer.
    pub evicted: usize,
    /// Flushed records kept because a newer value replaced the snapshot.
    pub superseded: usize,
    /// Undecodable records purged.
    pub corrupt: usize,
    /// Index entries that had no record.
    pub missing: usize,
}

impl FlushReport {
    /// Returns `true` if the cycle found nothing pending.
    pub fn is_empty(&self) -> bool {
        self.selected == 0
    }

    /// Returns `true` if the cycle changed anything in the buffer or the
    /// durable store.
    pub fn made_progress(&self) -> bool {
        self.flushed + self.corrupt + self.missing > 0
    }
}

/// Moves batches from the buffer to a persistence sink.
#[derive(Clone)]
pub struct FlushEngine {
    buffer: BufferStore,
    sink: Arc<dyn PersistenceSink>,
}

impl std::fmt::Debug for FlushEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushEngine")
            .field("buffer", &self.buffer.namespace())
            .field("sink", &self.sink.name())
            .finish()
    }
}

impl FlushEngine {
    /// Creates an engine flushing `buffer` into `sink`.
    pub fn new(buffer: BufferStore, sink: Arc<dyn PersistenceSink>) -> Self {
        Self { buffer, sink }
    }

    /// Returns the buffer this engine drains.
    pub fn buffer(&self) -> &BufferStore {
        &self.buffer
    }

    /// Runs one flush cycle of at most `max_items` records.
    ///
    /// `max_items == 0` selects nothing. An empty pending index yields an
    /// empty report, not an error.
    ///
    /// # Errors
    ///
    /// - `BufferError::Sink` if the sink rejects the batch (nothing evicted)
    /// - `BufferError::Store` if the pending index cannot be read
    pub async fn flush_batch(&self, max_items: usize) -> BufferResult<FlushReport> {
        let mut report = FlushReport::default();
        if max_items == 0 {
            return Ok(report);
        }

        let started = Instant::now();
        let store = self.buffer.backing_store();
        let ns = self.buffer.namespace();

        let keys = store
            .set_random_members(ns.pending_key(), max_items)
            .await
            .map_err(store_error)?;
        report.selected = keys.len();
        if keys.is_empty() {
            return Ok(report);
        }

        let mut batch: Vec<BufferedRecord> = Vec::with_capacity(keys.len());
        let mut snapshots: Vec<(String, Vec<u8>)> = Vec::with_capacity(keys.len());

        for key in keys {
            let bytes = match store.hash_get(ns.records_key(), &key).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    match store.deindex_if_missing(ns, &key).await {
                        Ok(true) => report.missing += 1,
                        Ok(false) => {}
                        Err(e) => warn!(item_key = %key, error = %e, "Failed to deindex missing record"),
                    }
                    continue;
                }
                Err(e) => {
                    warn!(item_key = %key, error = %e, "Failed to read buffered record");
                    continue;
                }
            };

            match BufferedRecord::decode(&key, &bytes) {
                Ok(record) => {
                    batch.push(record);
                    snapshots.push((key, bytes));
                }
                Err(e) => match store.delete_if_equals(ns, &key, &bytes).await {
                    Ok(true) => {
                        report.corrupt += 1;
                        warn!(item_key = %key, error = %e, "Purged corrupt record, data lost");
                    }
                    Ok(false) => {}
                    Err(store_err) => {
                        warn!(item_key = %key, error = %store_err, "Failed to purge corrupt record")
                    }
                },
            }
        }

        if report.corrupt > 0 {
            self.buffer.stats_inner().record_corrupt(report.corrupt as u64);
            self.buffer.metrics().record_corrupt(report.corrupt as u64);
        }

        if batch.is_empty() {
            return Ok(report);
        }

        debug!(
            records = batch.len(),
            sink = self.sink.name(),
            "Flushing batch"
        );

        if let Err(e) = self.sink.persist(&batch).await {
            self.buffer.stats_inner().record_flush_error();
            self.buffer.metrics().record_flush_error(e.error_type());
            warn!(
                records = batch.len(),
                sink = self.sink.name(),
                error = %e,
                "Flush failed, batch stays buffered"
            );
            return Err(e.into());
        }
        report.flushed = batch.len();

        for (key, snapshot) in &snapshots {
            match store.delete_if_equals(ns, key, snapshot).await {
                Ok(true) => report.evicted += 1,
                Ok(false) => {
                    report.superseded += 1;
                    debug!(item_key = %key, "Record changed during flush, kept pending");
                }
                Err(e) => {
                    warn!(item_key = %key, error = %e, "Eviction failed, record will be flushed again")
                }
            }
        }

        self.buffer.stats_inner().record_flush(
            report.flushed as u64,
            report.evicted as u64,
            report.superseded as u64,
        );
        self.buffer.metrics().record_flush_success(
            report.flushed as u64,
            report.superseded as u64,
            started.elapsed().as_secs_f64(),
        );

        info!(
            flushed = report.flushed,
            evicted = report.evicted,
            superseded = report.superseded,
            corrupt = report.corrupt,
            duration_ms = started.elapsed().as_millis() as u64,
            "Flush completed"
        );
        Ok(report)
    }
}
