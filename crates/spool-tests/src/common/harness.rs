// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! Wiring for buffer tests and helpers for concurrent scenarios.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use spool_buffer::{BackingStore, BufferStore, FlushEngine, FlushReport, MemoryStore};

use super::fixtures::BufferFixtures;
use super::mocks::RecordingSink;

// =============================================================================
// Buffer Harness
// =============================================================================

/// A buffer, a recording sink and a flush engine over them.
pub struct BufferHarness {
    /// The buffer under test.
    pub buffer: BufferStore,
    /// The sink the engine persists to.
    pub sink: Arc<RecordingSink>,
    /// The engine under test.
    pub engine: FlushEngine,
}

impl BufferHarness {
    /// Harness over a fresh in-memory store.
    pub fn new() -> Self {
        Self::over(Arc::new(MemoryStore::new()))
    }

    /// Harness over `store`.
    pub fn over(store: Arc<dyn BackingStore>) -> Self {
        let buffer = BufferFixtures::over(store);
        let sink = Arc::new(RecordingSink::new());
        let engine = FlushEngine::new(buffer.clone(), sink.clone());
        Self {
            buffer,
            sink,
            engine,
        }
    }

    /// Flushes in batches of `batch` until a cycle selects nothing.
    ///
    /// Panics after `max_cycles` to catch livelocks.
    pub async fn flush_until_empty(&self, batch: usize, max_cycles: usize) -> Vec<FlushReport> {
        let mut reports = Vec::new();
        for _ in 0..max_cycles {
            let report = self.engine.flush_batch(batch).await.expect("flush failed");
            let done = report.is_empty();
            reports.push(report);
            if done {
                return reports;
            }
        }
        panic!("Buffer not empty after {} flush cycles", max_cycles);
    }
}

impl Default for BufferHarness {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Concurrent Test Helper
// =============================================================================

/// Helper for running concurrent test scenarios.
pub struct ConcurrentTestHelper {
    /// Number of concurrent tasks.
    task_count: usize,

    /// Timeout per task.
    task_timeout: Duration,
}

impl ConcurrentTestHelper {
    /// Create a new helper.
    pub fn new(task_count: usize) -> Self {
        Self {
            task_count,
            task_timeout: Duration::from_secs(10),
        }
    }

    /// Set the task timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Run a function concurrently and collect results.
    pub async fn run<F, Fut, T>(&self, task_fn: F) -> Vec<Result<T, String>>
    where
        F: Fn(usize) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut handles = Vec::with_capacity(self.task_count);

        for i in 0..self.task_count {
            let task_fn = task_fn.clone();
            let timeout = self.task_timeout;

            handles.push(tokio::spawn(async move {
                match tokio::time::timeout(timeout, task_fn(i)).await {
                    Ok(result) => Ok(result),
                    Err(_) => Err(format!("Task {} timed out", i)),
                }
            }));
        }

        let mut results = Vec::with_capacity(self.task_count);
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(Err(format!("Task panicked: {}", e))),
            }
        }

        results
    }

    /// Run a function concurrently and assert all succeed.
    pub async fn run_all_succeed<F, Fut, T>(&self, task_fn: F) -> Vec<T>
    where
        F: Fn(usize) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let results = self.run(task_fn).await;
        results
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.unwrap_or_else(|e| panic!("Task {} failed: {}", i, e)))
            .collect()
    }
}
