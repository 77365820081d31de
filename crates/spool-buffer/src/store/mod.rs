// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Backing store adapters.
//!
//! A backing store is a key-value server (or an in-process equivalent)
//! exposing hash and set primitives plus two atomic compound operations that
//! the flush and reap paths rely on:
//!
//! - [`BackingStore::delete_if_equals`] removes a record and its index entry
//!   only if the stored bytes still equal a snapshot.
//! - [`BackingStore::deindex_if_missing`] removes an index entry only if the
//!   record it points to is still absent.
//!
//! Both must be a single atomic operation on the store side. A newer write
//! landing between the caller's read and the compound call makes them a no-op.
//!
//! # Available adapters
//!
//! - [`MemoryStore`]: in-process, one mutex over the map-and-index pair
//! - `RedisStore`: Redis server, compound operations as Lua scripts
//!   (requires the `redis-backend` feature)

use std::fmt::Debug;

use async_trait::async_trait;

use spool_core::error::StoreResult;

mod memory;
#[cfg(feature = "redis-backend")]
mod redis_store;

pub use memory::MemoryStore;
#[cfg(feature = "redis-backend")]
pub use redis_store::RedisStore;

// =============================================================================
// Namespace
// =============================================================================

/// Default namespace prefix for buffer keys.
pub const DEFAULT_NAMESPACE: &str = "spool:buffer";

/// Store keys of one buffer instance.
///
/// The record map lives in the hash `"{prefix}:buffer"`, the pending index in
/// the set `"{prefix}:pending"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
    records: String,
    pending: String,
}

impl Namespace {
    /// Creates the key layout for `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            records: format!("{prefix}:buffer"),
            pending: format!("{prefix}:pending"),
            prefix,
        }
    }

    /// Returns the configured prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the name of the record hash.
    pub fn records_key(&self) -> &str {
        &self.records
    }

    /// Returns the name of the pending index set.
    pub fn pending_key(&self) -> &str {
        &self.pending
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

// =============================================================================
// BackingStore Trait
// =============================================================================

/// Key-value store with the atomic primitives the buffer needs.
///
/// Hash operations address a field inside a named hash; set operations
/// address a member of a named set. Once [`close`](Self::close) has returned,
/// every operation fails with `StoreError::Closed`.
#[async_trait]
pub trait BackingStore: Send + Sync + Debug {
    /// Returns the stored bytes of `field`, if any.
    async fn hash_get(&self, hash: &str, field: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Stores `value` under `field`, overwriting any previous value.
    async fn hash_set(&self, hash: &str, field: &str, value: &[u8]) -> StoreResult<()>;

    /// Adds `member` to the set. Returns `true` if it was not present.
    async fn set_add(&self, set: &str, member: &str) -> StoreResult<bool>;

    /// Returns every member of the set.
    async fn set_members(&self, set: &str) -> StoreResult<Vec<String>>;

    /// Returns up to `count` distinct members chosen in arbitrary order.
    async fn set_random_members(&self, set: &str, count: usize) -> StoreResult<Vec<String>>;

    /// Returns the number of members in the set.
    async fn set_cardinality(&self, set: &str) -> StoreResult<u64>;

    /// Atomically deletes the record `field` and its index entry, but only if
    /// the stored bytes equal `expected`. Returns `true` if it deleted.
    async fn delete_if_equals(
        &self,
        namespace: &Namespace,
        field: &str,
        expected: &[u8],
    ) -> StoreResult<bool>;

    /// Atomically removes `field` from the index, but only if no record is
    /// stored for it. Returns `true` if it removed.
    async fn deindex_if_missing(&self, namespace: &Namespace, field: &str) -> StoreResult<bool>;

    /// Releases the store. Idempotent.
    async fn close(&self) -> StoreResult<()>;

    /// Returns the adapter name for logs.
    fn name(&self) -> &str;
}
