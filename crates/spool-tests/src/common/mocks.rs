// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! Sinks and stores with injectable behavior for exercising the buffer in
//! isolation. All of them are thread-safe and record what they saw.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use spool_buffer::{
    BackingStore, BufferStore, MemoryStore, Namespace, PersistenceSink, ReapReport, StaleReaper,
};
use spool_core::{
    error::{SinkError, SinkResult, StoreError, StoreResult},
    types::{BufferedRecord, OwnerId},
};

// =============================================================================
// Recording Sink
// =============================================================================

/// A sink that records every batch it accepts.
///
/// Failures can be injected for the next N calls or for all calls.
#[derive(Debug, Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<BufferedRecord>>>,
    calls: AtomicU64,
    fail_all: AtomicBool,
    fail_next: AtomicU64,
}

impl RecordingSink {
    /// Create a sink that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` calls.
    pub fn fail_next(&self, count: u64) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Fail every call until reset.
    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    /// Number of `persist` calls, failed ones included.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Accepted batches in order.
    pub fn batches(&self) -> Vec<Vec<BufferedRecord>> {
        self.batches.lock().clone()
    }

    /// All accepted records in order.
    pub fn records(&self) -> Vec<BufferedRecord> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    /// Number of accepted records.
    pub fn record_count(&self) -> usize {
        self.batches.lock().iter().map(Vec::len).sum()
    }

    /// Payload of the last accepted record for `item_key`.
    pub fn latest(&self, item_key: &str) -> Option<Vec<u8>> {
        self.batches
            .lock()
            .iter()
            .flatten()
            .filter(|r| r.item_key.as_str() == item_key)
            .last()
            .map(|r| r.payload.clone())
    }

    /// Distinct item keys accepted so far.
    pub fn distinct_keys(&self) -> HashSet<String> {
        self.batches
            .lock()
            .iter()
            .flatten()
            .map(|r| r.item_key.as_str().to_string())
            .collect()
    }

    fn should_fail(&self) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PersistenceSink for RecordingSink {
    async fn persist(&self, records: &[BufferedRecord]) -> SinkResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail() {
            return Err(SinkError::unavailable("injected failure"));
        }
        self.batches.lock().push(records.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

// =============================================================================
// Failing Sink
// =============================================================================

/// A sink that rejects every batch with a fixed error.
#[derive(Debug)]
pub struct FailingSink {
    error: fn() -> SinkError,
    attempts: AtomicU64,
}

impl FailingSink {
    /// Fails with `SinkError::Unavailable`.
    pub fn unavailable() -> Self {
        Self {
            error: || SinkError::unavailable("durable store down"),
            attempts: AtomicU64::new(0),
        }
    }

    /// Fails with a non-retryable rejection.
    pub fn rejecting() -> Self {
        Self {
            error: || SinkError::rejected(400, "schema mismatch"),
            attempts: AtomicU64::new(0),
        }
    }

    /// Number of persist attempts.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistenceSink for FailingSink {
    async fn persist(&self, _records: &[BufferedRecord]) -> SinkResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err((self.error)())
    }

    fn name(&self) -> &str {
        "failing"
    }
}

// =============================================================================
// Interleaving Sink
// =============================================================================

/// A sink that writes newer values into the buffer while a batch is being
/// persisted, the way a producer would between snapshot and eviction.
///
/// The overwrites are applied once, during the first call.
#[derive(Debug)]
pub struct InterleavingSink {
    buffer: BufferStore,
    overwrites: Mutex<Vec<(String, Vec<u8>)>>,
    inner: RecordingSink,
}

impl InterleavingSink {
    /// Creates a sink that overwrites `overwrites` in `buffer` on first use.
    pub fn new(buffer: BufferStore, overwrites: Vec<(String, Vec<u8>)>) -> Self {
        Self {
            buffer,
            overwrites: Mutex::new(overwrites),
            inner: RecordingSink::new(),
        }
    }

    /// The records accepted so far.
    pub fn recorded(&self) -> &RecordingSink {
        &self.inner
    }
}

#[async_trait]
impl PersistenceSink for InterleavingSink {
    async fn persist(&self, records: &[BufferedRecord]) -> SinkResult<()> {
        let overwrites = std::mem::take(&mut *self.overwrites.lock());
        for (key, payload) in overwrites {
            self.buffer
                .add(OwnerId::UNLINKED, key, payload)
                .await
                .map_err(|e| SinkError::unavailable(e.to_string()))?;
        }
        self.inner.persist(records).await
    }

    fn name(&self) -> &str {
        "interleaving"
    }
}

// =============================================================================
// Reaping Sink
// =============================================================================

/// A sink that runs a reap pass while the batch is being persisted.
///
/// Stale records in the batch are removed between snapshot and eviction,
/// so their conditional evicts are declined.
#[derive(Debug)]
pub struct ReapingSink {
    reaper: StaleReaper,
    threshold: Duration,
    reports: Mutex<Vec<ReapReport>>,
    inner: RecordingSink,
}

impl ReapingSink {
    /// Creates a sink that reaps `buffer` with `threshold` on every call.
    pub fn new(buffer: BufferStore, threshold: Duration) -> Self {
        Self {
            reaper: StaleReaper::new(buffer),
            threshold,
            reports: Mutex::new(Vec::new()),
            inner: RecordingSink::new(),
        }
    }

    /// Reports of the reap passes run so far.
    pub fn reap_reports(&self) -> Vec<ReapReport> {
        self.reports.lock().clone()
    }

    /// The records accepted so far.
    pub fn recorded(&self) -> &RecordingSink {
        &self.inner
    }
}

#[async_trait]
impl PersistenceSink for ReapingSink {
    async fn persist(&self, records: &[BufferedRecord]) -> SinkResult<()> {
        let report = self
            .reaper
            .reap_stale(self.threshold)
            .await
            .map_err(|e| SinkError::unavailable(e.to_string()))?;
        self.reports.lock().push(report);
        self.inner.persist(records).await
    }

    fn name(&self) -> &str {
        "reaping"
    }
}

// =============================================================================
// Slow Sink
// =============================================================================

/// A sink that takes `delay` per batch before accepting it.
#[derive(Debug)]
pub struct SlowSink {
    delay: Duration,
    inner: RecordingSink,
}

impl SlowSink {
    /// Creates a sink that sleeps `delay` per call.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: RecordingSink::new(),
        }
    }

    /// The records accepted so far.
    pub fn recorded(&self) -> &RecordingSink {
        &self.inner
    }
}

#[async_trait]
impl PersistenceSink for SlowSink {
    async fn persist(&self, records: &[BufferedRecord]) -> SinkResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.persist(records).await
    }

    fn name(&self) -> &str {
        "slow"
    }
}

// =============================================================================
// Faulty Store
// =============================================================================

/// A [`MemoryStore`] with injectable command failures.
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    unreadable: Mutex<HashSet<String>>,
    fail_writes: AtomicBool,
    fail_indexing: AtomicBool,
    fail_selection: AtomicBool,
    fail_compare_delete: AtomicBool,
}

impl FaultyStore {
    /// Creates a store with no faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `hash_get` fail for `field`.
    pub fn make_unreadable(&self, field: impl Into<String>) {
        self.unreadable.lock().insert(field.into());
    }

    /// Make `hash_get` succeed for `field` again.
    pub fn make_readable(&self, field: &str) {
        self.unreadable.lock().remove(field);
    }

    /// Make `hash_set` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `set_add` fail.
    pub fn set_fail_indexing(&self, fail: bool) {
        self.fail_indexing.store(fail, Ordering::SeqCst);
    }

    /// Make `set_random_members` fail.
    pub fn set_fail_selection(&self, fail: bool) {
        self.fail_selection.store(fail, Ordering::SeqCst);
    }

    /// Make `delete_if_equals` fail.
    pub fn set_fail_compare_delete(&self, fail: bool) {
        self.fail_compare_delete.store(fail, Ordering::SeqCst);
    }

    /// The wrapped store.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

fn injected(command: &str) -> StoreError {
    StoreError::command(command, "injected failure")
}

#[async_trait]
impl BackingStore for FaultyStore {
    async fn hash_get(&self, hash: &str, field: &str) -> StoreResult<Option<Vec<u8>>> {
        if self.unreadable.lock().contains(field) {
            return Err(injected("HGET"));
        }
        self.inner.hash_get(hash, field).await
    }

    async fn hash_set(&self, hash: &str, field: &str, value: &[u8]) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected("HSET"));
        }
        self.inner.hash_set(hash, field, value).await
    }

    async fn set_add(&self, set: &str, member: &str) -> StoreResult<bool> {
        if self.fail_indexing.load(Ordering::SeqCst) {
            return Err(injected("SADD"));
        }
        self.inner.set_add(set, member).await
    }

    async fn set_members(&self, set: &str) -> StoreResult<Vec<String>> {
        self.inner.set_members(set).await
    }

    async fn set_random_members(&self, set: &str, count: usize) -> StoreResult<Vec<String>> {
        if self.fail_selection.load(Ordering::SeqCst) {
            return Err(injected("SRANDMEMBER"));
        }
        self.inner.set_random_members(set, count).await
    }

    async fn set_cardinality(&self, set: &str) -> StoreResult<u64> {
        self.inner.set_cardinality(set).await
    }

    async fn delete_if_equals(
        &self,
        namespace: &Namespace,
        field: &str,
        expected: &[u8],
    ) -> StoreResult<bool> {
        if self.fail_compare_delete.load(Ordering::SeqCst) {
            return Err(injected("EVALSHA"));
        }
        self.inner.delete_if_equals(namespace, field, expected).await
    }

    async fn deindex_if_missing(&self, namespace: &Namespace, field: &str) -> StoreResult<bool> {
        self.inner.deindex_if_missing(namespace, field).await
    }

    async fn close(&self) -> StoreResult<()> {
        self.inner.close().await
    }

    fn name(&self) -> &str {
        "faulty-memory"
    }
}
