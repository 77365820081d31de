// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The buffer store.
//!
//! Maps item keys to their latest buffered record and keeps the pending
//! index consistent with that map. Adds never touch the durable store.
//!
//! # Ordering
//!
//! An add writes the record before indexing it, so a reader that finds a
//! key in the index always finds a record (or a newer one). Removals go the
//! other way round, through the store's atomic compound operations.

use std::sync::Arc;

use tracing::{debug, warn};

use spool_core::error::{BufferError, BufferResult, StoreError};
use spool_core::types::{BufferedRecord, ItemKey, OwnerId};

use crate::metrics::BufferMetricsCollector;
use crate::stats::{BufferStats, BufferStatsInner};
use crate::store::{BackingStore, Namespace};

/// Maps a store failure to the buffer error seen by callers.
///
/// A closed store means the buffer has been stopped.
pub(crate) fn store_error(e: StoreError) -> BufferError {
    match e {
        StoreError::Closed => BufferError::Stopped,
        other => BufferError::Store(other),
    }
}

/// Item key → buffered record map with its pending index.
///
/// Cloning is cheap; clones share the backing store and statistics.
#[derive(Debug, Clone)]
pub struct BufferStore {
    store: Arc<dyn BackingStore>,
    namespace: Namespace,
    stats: Arc<BufferStatsInner>,
    metrics: BufferMetricsCollector,
}

impl BufferStore {
    /// Creates a buffer over `store` under `namespace`.
    pub fn new(store: Arc<dyn BackingStore>, namespace: Namespace) -> Self {
        Self {
            store,
            namespace,
            stats: Arc::new(BufferStatsInner::new()),
            metrics: BufferMetricsCollector::disabled(),
        }
    }

    /// Enables or disables Prometheus metrics.
    pub fn with_metrics(mut self, metrics: BufferMetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    /// Buffers `payload` under `item_key`, replacing any previous record.
    ///
    /// # Errors
    ///
    /// - `BufferError::Serialization` if the record cannot be encoded
    /// - `BufferError::Store` if the backing store fails
    /// - `BufferError::Stopped` after the buffer has been shut down
    pub async fn add(
        &self,
        owner_id: OwnerId,
        item_key: impl Into<ItemKey>,
        payload: impl Into<Vec<u8>>,
    ) -> BufferResult<()> {
        let record = BufferedRecord::new(owner_id, item_key, payload);
        self.put(&record).await
    }

    /// Stores a fully formed record as is, including its timestamp.
    pub async fn put(&self, record: &BufferedRecord) -> BufferResult<()> {
        let bytes = record.encode()?;
        let key = record.item_key.as_str();

        self.store
            .hash_set(self.namespace.records_key(), key, &bytes)
            .await
            .map_err(store_error)?;
        if let Err(e) = self.store.set_add(self.namespace.pending_key(), key).await {
            // Unindexed records are invisible to flush and reap.
            if let Err(undo) = self
                .store
                .delete_if_equals(&self.namespace, key, &bytes)
                .await
            {
                warn!(item_key = %key, error = %undo, "Failed to roll back unindexed record");
            }
            return Err(store_error(e));
        }

        self.stats.record_add();
        self.metrics.record_added(1);

        debug!(
            item_key = %record.item_key,
            owner_id = %record.owner_id,
            bytes = bytes.len(),
            "Record buffered"
        );
        Ok(())
    }

    /// Returns the buffered record for `item_key`, if any.
    ///
    /// # Errors
    ///
    /// `BufferError::CorruptedData` if the stored value cannot be decoded.
    /// The entry itself is left for the next flush or reap to purge.
    pub async fn get(&self, item_key: &str) -> BufferResult<Option<BufferedRecord>> {
        let bytes = self
            .store
            .hash_get(self.namespace.records_key(), item_key)
            .await
            .map_err(store_error)?;

        match bytes {
            Some(bytes) => BufferedRecord::decode(item_key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the number of pending records.
    pub async fn count(&self) -> BufferResult<u64> {
        let count = self
            .store
            .set_cardinality(self.namespace.pending_key())
            .await
            .map_err(store_error)?;
        self.metrics.set_pending(count);
        Ok(count)
    }

    /// Returns a snapshot of the buffer statistics.
    pub fn stats(&self) -> BufferStats {
        self.stats.snapshot()
    }

    /// Returns the key layout.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Returns the backing store.
    pub fn backing_store(&self) -> &dyn BackingStore {
        self.store.as_ref()
    }

    pub(crate) fn stats_inner(&self) -> &BufferStatsInner {
        &self.stats
    }

    pub(crate) fn metrics(&self) -> BufferMetricsCollector {
        self.metrics
    }

    /// Closes the backing store. Later operations fail with
    /// `BufferError::Stopped`.
    pub async fn close(&self) -> BufferResult<()> {
        self.store.close().await.map_err(store_error)
    }
}
