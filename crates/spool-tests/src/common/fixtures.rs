// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built records, buffers and configuration documents.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;

use spool_buffer::{BackingStore, BufferStore, MemoryStore, Namespace};
use spool_core::types::{BufferedRecord, OwnerId};

use super::unique_namespace;

// =============================================================================
// Buffer Fixtures
// =============================================================================

/// Fixture providing buffers over fresh stores.
pub struct BufferFixtures;

impl BufferFixtures {
    /// A buffer over a new in-memory store, in a unique namespace.
    pub fn memory() -> BufferStore {
        Self::over(Arc::new(MemoryStore::new()))
    }

    /// A buffer over `store`, in a unique namespace.
    pub fn over(store: Arc<dyn BackingStore>) -> BufferStore {
        BufferStore::new(store, Namespace::new(unique_namespace("spool-test")))
    }

    /// Writes raw bytes as a record without indexing it through `add`.
    pub async fn put_raw(buffer: &BufferStore, item_key: &str, bytes: &[u8]) {
        let ns = buffer.namespace();
        buffer
            .backing_store()
            .hash_set(ns.records_key(), item_key, bytes)
            .await
            .expect("raw write failed");
        buffer
            .backing_store()
            .set_add(ns.pending_key(), item_key)
            .await
            .expect("raw index failed");
    }

    /// Adds an index entry with no record behind it.
    pub async fn put_orphan_index(buffer: &BufferStore, item_key: &str) {
        buffer
            .backing_store()
            .set_add(buffer.namespace().pending_key(), item_key)
            .await
            .expect("orphan index failed");
    }
}

// =============================================================================
// Record Fixtures
// =============================================================================

/// Fixture providing records.
pub struct RecordFixtures;

impl RecordFixtures {
    /// Item key number `i`.
    pub fn key(i: usize) -> String {
        format!("item-{:04}", i)
    }

    /// A small JSON payload tagged with `version`.
    pub fn payload(i: usize, version: usize) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "item": i,
            "version": version,
            "body": format!("content of item {} v{}", i, version),
        }))
        .expect("payload serialization")
    }

    /// A record last updated `age_secs` seconds before `now`.
    pub fn aged(i: usize, age_secs: i64, now: DateTime<Utc>) -> BufferedRecord {
        BufferedRecord::with_timestamp(
            OwnerId::new(i as i64 + 1),
            Self::key(i),
            Self::payload(i, 0),
            now - ChronoDuration::seconds(age_secs),
        )
    }

    /// Adds `count` fresh records, keys `0..count`, version 0.
    pub async fn fill(buffer: &BufferStore, count: usize) {
        for i in 0..count {
            buffer
                .add(OwnerId::new(i as i64 + 1), Self::key(i), Self::payload(i, 0))
                .await
                .expect("fill failed");
        }
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Fixture providing configuration documents.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// A complete YAML document.
    pub fn full_yaml() -> &'static str {
        r#"
service:
  name: orders-spool
  metrics: false

store:
  backend: redis
  address: cache.internal:6379
  database: 2
  namespace: orders

buffer:
  flush_interval_secs: 15
  reap_interval_secs: 600
  stale_threshold_secs: 7200
  max_batch_size: 250
  flush_timeout_secs: 20
  reap_timeout_secs: 10
  drain_deadline_secs: 90

sink:
  kind: http
  endpoint: https://records.internal/v1/batch
  timeout_secs: 10

logging:
  level: warn
  format: compact
"#
    }

    /// A minimal TOML document.
    pub fn minimal_toml() -> &'static str {
        r#"
[store]
namespace = "sessions"
"#
    }

    /// A JSON document using a placeholder for the namespace.
    pub fn placeholder_json(var: &str) -> String {
        format!(r#"{{"store": {{"namespace": "${{{}:fallback-ns}}"}}}}"#, var)
    }
}
