// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Persistence sinks.
//!
//! A sink receives each flushed batch and writes it to the durable store.
//! Delivery is at-least-once: a batch may be redelivered after a crash or
//! when an eviction is declined, so sinks must apply records idempotently
//! (upsert by item key).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use spool_core::error::{SinkError, SinkResult};
use spool_core::types::BufferedRecord;

// =============================================================================
// Persistence Sink Trait
// =============================================================================

/// Writes flushed batches to the durable store.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Persists a batch of records.
    ///
    /// # Returns
    ///
    /// - `Ok(())` if every record was durably written
    /// - `Err(SinkError)` otherwise; the whole batch stays buffered
    async fn persist(&self, records: &[BufferedRecord]) -> SinkResult<()>;

    /// Returns the name of this sink for logging.
    fn name(&self) -> &str;
}

// =============================================================================
// HTTP Persistence Sink
// =============================================================================

/// Posts each batch as a JSON array to an HTTP endpoint.
///
/// Any 2xx response is success. The endpoint is expected to upsert by
/// `item_key`.
#[derive(Debug)]
pub struct HttpPersistenceSink {
    client: reqwest::Client,
    url: String,
}

impl HttpPersistenceSink {
    /// Creates a new HTTP sink.
    pub fn new(url: impl Into<String>, timeout: Duration) -> SinkResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| SinkError::unavailable(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Creates a sink with a 30 second request timeout.
    pub fn with_default_timeout(url: impl Into<String>) -> SinkResult<Self> {
        Self::new(url, Duration::from_secs(30))
    }

    /// Returns the endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PersistenceSink for HttpPersistenceSink {
    async fn persist(&self, records: &[BufferedRecord]) -> SinkResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(&self.url)
            .json(&records)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    SinkError::encoding(e.to_string())
                } else {
                    SinkError::unavailable(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(records = records.len(), url = %self.url, "Batch persisted");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SinkError::rejected(status.as_u16(), body))
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

// =============================================================================
// Discard Sink
// =============================================================================

/// Logs and drops every batch.
///
/// Only for development setups without a durable store: anything flushed
/// through this sink is lost.
#[derive(Debug, Default)]
pub struct DiscardSink {
    discarded: AtomicU64,
}

impl DiscardSink {
    /// Creates a new discard sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records dropped so far.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PersistenceSink for DiscardSink {
    async fn persist(&self, records: &[BufferedRecord]) -> SinkResult<()> {
        self.discarded
            .fetch_add(records.len() as u64, Ordering::Relaxed);
        info!(records = records.len(), "Discarding flushed batch");
        Ok(())
    }

    fn name(&self) -> &str {
        "discard"
    }
}

// =============================================================================
// Mock Persistence Sink (for testing)
// =============================================================================

/// A sink that remembers everything it receives.
#[derive(Debug, Default)]
pub struct MockPersistenceSink {
    /// Number of successful persist calls.
    pub persist_count: AtomicU64,
    /// Whether to fail.
    pub should_fail: AtomicBool,
    received: Mutex<Vec<BufferedRecord>>,
}

impl MockPersistenceSink {
    /// Creates a mock sink that succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock sink that always fails.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.should_fail.store(true, Ordering::Relaxed);
        sink
    }

    /// Sets whether the sink should fail.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// Returns the number of successful persist calls.
    pub fn persist_count(&self) -> u64 {
        self.persist_count.load(Ordering::Relaxed)
    }

    /// Returns every record persisted so far, in delivery order.
    pub fn received(&self) -> Vec<BufferedRecord> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl PersistenceSink for MockPersistenceSink {
    async fn persist(&self, records: &[BufferedRecord]) -> SinkResult<()> {
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(SinkError::unavailable("mock failure"));
        }
        self.persist_count.fetch_add(1, Ordering::Relaxed);
        self.received.lock().extend_from_slice(records);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spool_core::types::OwnerId;

    #[tokio::test]
    async fn test_discard_sink_counts() {
        let sink = DiscardSink::new();
        let batch = vec![
            BufferedRecord::new(OwnerId::UNLINKED, "a", b"1".to_vec()),
            BufferedRecord::new(OwnerId::UNLINKED, "b", b"2".to_vec()),
        ];
        sink.persist(&batch).await.unwrap();
        assert_eq!(sink.discarded(), 2);
    }

    #[tokio::test]
    async fn test_mock_sink_toggles() {
        let sink = MockPersistenceSink::new();
        let batch = vec![BufferedRecord::new(OwnerId::new(1), "a", b"1".to_vec())];

        sink.persist(&batch).await.unwrap();
        sink.set_should_fail(true);
        assert!(sink.persist(&batch).await.is_err());

        assert_eq!(sink.persist_count(), 1);
        assert_eq!(sink.received().len(), 1);
    }

    #[tokio::test]
    async fn test_http_sink_empty_batch_is_noop() {
        let sink = HttpPersistenceSink::with_default_timeout("http://127.0.0.1:9/unused").unwrap();
        assert_eq!(sink.url(), "http://127.0.0.1:9/unused");
        sink.persist(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_http_sink_unreachable_is_retryable() {
        let sink = HttpPersistenceSink::new("http://127.0.0.1:9/unused", Duration::from_millis(200)).unwrap();
        let batch = vec![BufferedRecord::new(OwnerId::UNLINKED, "a", b"1".to_vec())];

        let err = sink.persist(&batch).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
