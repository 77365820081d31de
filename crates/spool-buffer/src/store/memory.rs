// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-process backing store.
//!
//! Every hash and set lives behind one `parking_lot::Mutex`, so the compound
//! operations are trivially atomic. The lock is held only for the in-memory
//! mutation itself and never across an await point.
//!
//! # Example
//!
//! ```
//! use spool_buffer::store::{BackingStore, MemoryStore};
//!
//! # tokio_test_block_on(async {
//! let store = MemoryStore::new();
//! store.hash_set("h", "k", b"v").await.unwrap();
//! assert_eq!(store.hash_get("h", "k").await.unwrap(), Some(b"v".to_vec()));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::seq::IteratorRandom;
use tracing::debug;

use spool_core::error::{StoreError, StoreResult};

use super::{BackingStore, Namespace};

#[derive(Debug, Default)]
struct State {
    hashes: HashMap<String, HashMap<String, Vec<u8>>>,
    sets: HashMap<String, HashSet<String>>,
    closed: bool,
}

impl State {
    fn open(&mut self) -> StoreResult<&mut Self> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(self)
    }
}

/// An in-memory backing store.
///
/// Data is lost when the store is dropped. Suitable for tests, development
/// and single-process deployments that accept losing buffered writes on crash.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once [`close`](BackingStore::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn hash_get(&self, hash: &str, field: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut state = self.state.lock();
        let state = state.open()?;
        Ok(state.hashes.get(hash).and_then(|h| h.get(field)).cloned())
    }

    async fn hash_set(&self, hash: &str, field: &str, value: &[u8]) -> StoreResult<()> {
        let mut state = self.state.lock();
        let state = state.open()?;
        state
            .hashes
            .entry(hash.to_string())
            .or_default()
            .insert(field.to_string(), value.to_vec());
        Ok(())
    }

    async fn set_add(&self, set: &str, member: &str) -> StoreResult<bool> {
        let mut state = self.state.lock();
        let state = state.open()?;
        Ok(state
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn set_members(&self, set: &str) -> StoreResult<Vec<String>> {
        let mut state = self.state.lock();
        let state = state.open()?;
        Ok(state
            .sets
            .get(set)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_random_members(&self, set: &str, count: usize) -> StoreResult<Vec<String>> {
        let mut state = self.state.lock();
        let state = state.open()?;
        let Some(members) = state.sets.get(set) else {
            return Ok(Vec::new());
        };
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut rng = rand::thread_rng();
        Ok(members.iter().cloned().choose_multiple(&mut rng, count))
    }

    async fn set_cardinality(&self, set: &str) -> StoreResult<u64> {
        let mut state = self.state.lock();
        let state = state.open()?;
        Ok(state.sets.get(set).map(|s| s.len() as u64).unwrap_or(0))
    }

    async fn delete_if_equals(
        &self,
        namespace: &Namespace,
        field: &str,
        expected: &[u8],
    ) -> StoreResult<bool> {
        let mut state = self.state.lock();
        let state = state.open()?;

        let matches = state
            .hashes
            .get(namespace.records_key())
            .and_then(|h| h.get(field))
            .is_some_and(|current| current.as_slice() == expected);
        if !matches {
            return Ok(false);
        }

        if let Some(pending) = state.sets.get_mut(namespace.pending_key()) {
            pending.remove(field);
        }
        if let Some(records) = state.hashes.get_mut(namespace.records_key()) {
            records.remove(field);
        }
        Ok(true)
    }

    async fn deindex_if_missing(&self, namespace: &Namespace, field: &str) -> StoreResult<bool> {
        let mut state = self.state.lock();
        let state = state.open()?;

        let present = state
            .hashes
            .get(namespace.records_key())
            .is_some_and(|h| h.contains_key(field));
        if present {
            return Ok(false);
        }

        Ok(state
            .sets
            .get_mut(namespace.pending_key())
            .map(|s| s.remove(field))
            .unwrap_or(false))
    }

    async fn close(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            debug!(
                hashes = state.hashes.len(),
                sets = state.sets.len(),
                "Memory store closed"
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// =============================================================================
// Tests
// =============================================================================
