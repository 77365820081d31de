// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Lifecycle controller.
//!
//! Runs the flush engine and the stale reaper on two independent timers and
//! owns the shutdown drain.
//!
//! # States
//!
//! ```text
//! Running ──shutdown()──▶ Draining ──drain done──▶ Stopped
//! ```
//!
//! - **Running**: both periodic tasks tick. Each task finishes a cycle before
//!   starting the next one; flush and reap may overlap each other. Every cycle
//!   is bounded by its own timeout.
//! - **Draining**: both tasks are stopped (an in-flight cycle is awaited), then
//!   batches are flushed back to back until nothing is pending, the sink
//!   fails, or the drain deadline passes.
//! - **Stopped**: the backing store is closed; buffer operations fail with
//!   `BufferError::Stopped`.
//!
//! # Example
//!
//! ```rust,ignore
//! use spool_buffer::{BufferLifecycle, BufferStore, LifecycleConfig, MemoryStore, Namespace};
//!
//! let buffer = BufferStore::new(Arc::new(MemoryStore::new()), Namespace::default());
//! let lifecycle = BufferLifecycle::start(buffer.clone(), sink, LifecycleConfig::default());
//!
//! buffer.add(OwnerId::new(7), "user-1", payload).await?;
//!
//! let report = lifecycle.shutdown().await;
//! assert_eq!(report.remaining, 0);
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use spool_core::error::{BufferError, BufferResult};

use crate::buffer::BufferStore;
use crate::flush::{FlushEngine, FlushReport, DEFAULT_MAX_BATCH_SIZE};
use crate::reaper::{ReapReport, StaleReaper};
use crate::sink::PersistenceSink;

// =============================================================================
// Configuration
// =============================================================================

/// Timing and sizing of the background tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Interval between flush cycles.
    #[serde(default = "default_flush_interval", with = "duration_secs")]
    pub flush_interval: Duration,

    /// Interval between reap passes.
    #[serde(default = "default_reap_interval", with = "duration_secs")]
    pub reap_interval: Duration,

    /// Age after which a buffered record is dropped unpersisted.
    #[serde(default = "default_stale_threshold", with = "duration_secs")]
    pub stale_threshold: Duration,

    /// Maximum records per flush cycle.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Deadline of one periodic flush cycle.
    #[serde(default = "default_flush_timeout", with = "duration_secs")]
    pub flush_timeout: Duration,

    /// Deadline of one reap pass.
    #[serde(default = "default_reap_timeout", with = "duration_secs")]
    pub reap_timeout: Duration,

    /// Deadline of the whole shutdown drain.
    #[serde(default = "default_drain_deadline", with = "duration_secs")]
    pub drain_deadline: Duration,
}

fn default_flush_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_reap_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_stale_threshold() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_flush_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_reap_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_drain_deadline() -> Duration {
    Duration::from_secs(2 * 60)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            flush_interval: default_flush_interval(),
            reap_interval: default_reap_interval(),
            stale_threshold: default_stale_threshold(),
            max_batch_size: default_max_batch_size(),
            flush_timeout: default_flush_timeout(),
            reap_timeout: default_reap_timeout(),
            drain_deadline: default_drain_deadline(),
        }
    }
}

impl LifecycleConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> LifecycleConfigBuilder {
        LifecycleConfigBuilder::default()
    }

    /// Creates a configuration for testing.
    pub fn for_testing() -> Self {
        Self {
            flush_interval: Duration::from_millis(100),
            reap_interval: Duration::from_millis(200),
            stale_threshold: Duration::from_secs(60),
            max_batch_size: 10,
            flush_timeout: Duration::from_secs(1),
            reap_timeout: Duration::from_secs(1),
            drain_deadline: Duration::from_secs(5),
        }
    }
}

/// Builder for LifecycleConfig.
#[derive(Debug, Default)]
pub struct LifecycleConfigBuilder {
    config: LifecycleConfig,
}

impl LifecycleConfigBuilder {
    /// Sets the flush interval.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    /// Sets the reap interval.
    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.config.reap_interval = interval;
        self
    }

    /// Sets the stale threshold.
    pub fn stale_threshold(mut self, threshold: Duration) -> Self {
        self.config.stale_threshold = threshold;
        self
    }

    /// Sets the maximum batch size.
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.config.max_batch_size = size;
        self
    }

    /// Sets the flush cycle timeout.
    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.config.flush_timeout = timeout;
        self
    }

    /// Sets the reap pass timeout.
    pub fn reap_timeout(mut self, timeout: Duration) -> Self {
        self.config.reap_timeout = timeout;
        self
    }

    /// Sets the drain deadline.
    pub fn drain_deadline(mut self, deadline: Duration) -> Self {
        self.config.drain_deadline = deadline;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> LifecycleConfig {
        self.config
    }
}

// =============================================================================
// State and Reports
// =============================================================================

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Periodic flush and reap are active.
    Running,
    /// Shutdown drain in progress.
    Draining,
    /// Terminal; the backing store is closed.
    Stopped,
}

impl LifecycleState {
    /// Returns the state as a label.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Running => "running",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the shutdown drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Flush cycles run.
    pub cycles: usize,
    /// Records handed to the sink.
    pub flushed: usize,
    /// Records still pending when the drain ended.
    pub remaining: u64,
    /// Whether the drain deadline cut the drain short.
    pub deadline_exceeded: bool,
    /// The error that ended the drain, if any.
    pub last_error: Option<String>,
}

impl DrainReport {
    /// Returns `true` if nothing was left behind.
    pub fn is_complete(&self) -> bool {
        self.remaining == 0 && self.last_error.is_none() && !self.deadline_exceeded
    }
}

// =============================================================================
// Buffer Lifecycle
// =============================================================================

/// Drives periodic flush and reap, and drains on shutdown.
pub struct BufferLifecycle {
    buffer: BufferStore,
    engine: FlushEngine,
    reaper: StaleReaper,
    config: LifecycleConfig,
    state: watch::Sender<LifecycleState>,
    /// Serializes flush cycles, periodic and manual.
    flush_gate: Arc<tokio::sync::Mutex<()>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    drain_result: tokio::sync::Mutex<Option<DrainReport>>,
}

impl BufferLifecycle {
    /// Starts the periodic flush and reap tasks.
    ///
    /// Must be called from within a tokio runtime. The first cycles run one
    /// interval after start.
    pub fn start(buffer: BufferStore, sink: Arc<dyn PersistenceSink>, config: LifecycleConfig) -> Self {
        let engine = FlushEngine::new(buffer.clone(), sink);
        let reaper = StaleReaper::new(buffer.clone());
        let (state, _) = watch::channel(LifecycleState::Running);

        let lifecycle = Self {
            buffer,
            engine,
            reaper,
            config,
            state,
            flush_gate: Arc::new(tokio::sync::Mutex::new(())),
            tasks: Mutex::new(Vec::with_capacity(2)),
            drain_result: tokio::sync::Mutex::new(None),
        };

        let flush_task = lifecycle.spawn_flush_task();
        let reap_task = lifecycle.spawn_reap_task();
        lifecycle.tasks.lock().extend([flush_task, reap_task]);

        info!(
            namespace = lifecycle.buffer.namespace().prefix(),
            store = lifecycle.buffer.backing_store().name(),
            flush_interval_secs = lifecycle.config.flush_interval.as_secs_f64(),
            reap_interval_secs = lifecycle.config.reap_interval.as_secs_f64(),
            stale_threshold_secs = lifecycle.config.stale_threshold.as_secs(),
            max_batch_size = lifecycle.config.max_batch_size,
            "Buffer lifecycle started"
        );

        lifecycle
    }

    fn spawn_flush_task(&self) -> JoinHandle<()> {
        let engine = self.engine.clone();
        let gate = self.flush_gate.clone();
        let config = self.config.clone();
        let mut state = self.state.subscribe();

        tokio::spawn(async move {
            let mut interval = ticker(config.flush_interval);
            loop {
                tokio::select! {
                    biased;
                    changed = state.changed() => {
                        if changed.is_err() || *state.borrow() != LifecycleState::Running {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        let _guard = gate.lock().await;
                        match timed_flush(&engine, &config).await {
                            Ok(report) if !report.is_empty() => {
                                if let Err(e) = engine.buffer().count().await {
                                    debug!(error = %e, "Failed to refresh pending gauge");
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!(
                                error = %e,
                                retryable = e.is_retryable(),
                                "Periodic flush failed"
                            ),
                        }
                    }
                }
            }
            debug!("Flush task stopped");
        })
    }

    fn spawn_reap_task(&self) -> JoinHandle<()> {
        let reaper = self.reaper.clone();
        let config = self.config.clone();
        let mut state = self.state.subscribe();

        tokio::spawn(async move {
            let mut interval = ticker(config.reap_interval);
            loop {
                tokio::select! {
                    biased;
                    changed = state.changed() => {
                        if changed.is_err() || *state.borrow() != LifecycleState::Running {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(e) = timed_reap(&reaper, &config).await {
                            warn!(error = %e, "Periodic reap failed");
                        }
                    }
                }
            }
            debug!("Reap task stopped");
        })
    }

    /// Returns the current state.
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes state changes.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Returns the buffer.
    pub fn buffer(&self) -> &BufferStore {
        &self.buffer
    }

    /// Runs one flush cycle now, bounded by the flush timeout.
    ///
    /// Waits for an in-flight periodic cycle to finish first.
    pub async fn flush_now(&self) -> BufferResult<FlushReport> {
        if self.state() != LifecycleState::Running {
            return Err(BufferError::Stopped);
        }
        let _guard = self.flush_gate.lock().await;
        timed_flush(&self.engine, &self.config).await
    }

    /// Runs one reap pass now, bounded by the reap timeout.
    pub async fn reap_now(&self) -> BufferResult<ReapReport> {
        if self.state() != LifecycleState::Running {
            return Err(BufferError::Stopped);
        }
        timed_reap(&self.reaper, &self.config).await
    }

    /// Stops the periodic tasks, drains the buffer and closes the store.
    ///
    /// Idempotent: later calls return the report of the first drain.
    pub async fn shutdown(&self) -> DrainReport {
        let mut result = self.drain_result.lock().await;
        if let Some(report) = result.as_ref() {
            return report.clone();
        }

        info!("Buffer lifecycle draining");
        self.state.send_replace(LifecycleState::Draining);

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Background task ended abnormally");
            }
        }

        let report = self.drain().await;

        if let Err(e) = self.buffer.close().await {
            warn!(error = %e, "Failed to close backing store");
        }
        self.state.send_replace(LifecycleState::Stopped);

        if report.is_complete() {
            info!(
                cycles = report.cycles,
                flushed = report.flushed,
                "Buffer lifecycle stopped, drain complete"
            );
        } else {
            warn!(
                cycles = report.cycles,
                flushed = report.flushed,
                remaining = report.remaining,
                deadline_exceeded = report.deadline_exceeded,
                last_error = report.last_error.as_deref().unwrap_or(""),
                "Buffer lifecycle stopped with records left in the backing store"
            );
        }

        *result = Some(report.clone());
        report
    }

    async fn drain(&self) -> DrainReport {
        let _guard = self.flush_gate.lock().await;
        let deadline = Instant::now() + self.config.drain_deadline;
        let mut report = DrainReport::default();

        loop {
            let cycle =
                tokio::time::timeout_at(deadline, self.engine.flush_batch(self.config.max_batch_size))
                    .await;

            match cycle {
                Err(_) => {
                    report.deadline_exceeded = true;
                    break;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Drain flush failed, stopping drain");
                    report.last_error = Some(e.to_string());
                    break;
                }
                Ok(Ok(cycle)) => {
                    report.cycles += 1;
                    report.flushed += cycle.flushed;
                    if cycle.is_empty() || !cycle.made_progress() {
                        break;
                    }
                }
            }

            if Instant::now() >= deadline {
                report.deadline_exceeded = true;
                break;
            }
        }

        report.remaining = match self.buffer.count().await {
            Ok(remaining) => remaining,
            Err(e) => {
                warn!(error = %e, "Failed to count remaining records");
                0
            }
        };
        report
    }
}

impl std::fmt::Debug for BufferLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferLifecycle")
            .field("state", &self.state())
            .field("engine", &self.engine)
            .field("config", &self.config)
            .finish()
    }
}

impl Drop for BufferLifecycle {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let period = period.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn timed_flush(engine: &FlushEngine, config: &LifecycleConfig) -> BufferResult<FlushReport> {
    match tokio::time::timeout(config.flush_timeout, engine.flush_batch(config.max_batch_size)).await
    {
        Ok(result) => result,
        Err(_) => {
            engine.buffer().stats_inner().record_flush_error();
            engine.buffer().metrics().record_flush_error("timeout");
            Err(BufferError::timeout("flush", config.flush_timeout))
        }
    }
}

async fn timed_reap(reaper: &StaleReaper, config: &LifecycleConfig) -> BufferResult<ReapReport> {
    tokio::time::timeout(config.reap_timeout, reaper.reap_stale(config.stale_threshold))
        .await
        .unwrap_or_else(|_| Err(BufferError::timeout("reap", config.reap_timeout)))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MockPersistenceSink;
    use crate::store::{MemoryStore, Namespace};
    use spool_core::types::OwnerId;

    fn buffer() -> BufferStore {
        BufferStore::new(Arc::new(MemoryStore::new()), Namespace::new("test"))
    }

    #[test]
    fn test_default_config() {
        let config = LifecycleConfig::default();
        assert_eq!(config.flush_interval, Duration::from_secs(30));
        assert_eq!(config.reap_interval, Duration::from_secs(300));
        assert_eq!(config.stale_threshold, Duration::from_secs(3600));
        assert_eq!(config.max_batch_size, 500);
        assert_eq!(config.flush_timeout, Duration::from_secs(60));
        assert_eq!(config.reap_timeout, Duration::from_secs(30));
        assert_eq!(config.drain_deadline, Duration::from_secs(120));
    }

    #[test]
    fn test_config_builder() {
        let config = LifecycleConfig::builder()
            .flush_interval(Duration::from_secs(10))
            .max_batch_size(50)
            .drain_deadline(Duration::from_secs(5))
            .build();

        assert_eq!(config.flush_interval, Duration::from_secs(10));
        assert_eq!(config.max_batch_size, 50);
        assert_eq!(config.drain_deadline, Duration::from_secs(5));
        assert_eq!(config.reap_interval, Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_flush() {
        let buffer = buffer();
        let sink = Arc::new(MockPersistenceSink::new());
        let lifecycle = BufferLifecycle::start(buffer.clone(), sink.clone(), LifecycleConfig::for_testing());

        buffer.add(OwnerId::new(1), "user-1", b"v".to_vec()).await.unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Running);

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(sink.persist_count(), 1);
        assert_eq!(buffer.count().await.unwrap(), 0);
        lifecycle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_everything() {
        let buffer = buffer();
        let sink = Arc::new(MockPersistenceSink::new());
        let config = LifecycleConfig::builder()
            .flush_interval(Duration::from_secs(3600))
            .max_batch_size(7)
            .build();
        let lifecycle = BufferLifecycle::start(buffer.clone(), sink.clone(), config);

        for i in 0..30 {
            buffer.add(OwnerId::UNLINKED, format!("k{i}"), vec![]).await.unwrap();
        }

        let report = lifecycle.shutdown().await;
        assert!(report.is_complete());
        assert_eq!(report.flushed, 30);
        assert_eq!(report.remaining, 0);
        assert_eq!(report.cycles, 6);
        assert_eq!(sink.received().len(), 30);
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_stops_on_sink_error() {
        let buffer = buffer();
        let sink = Arc::new(MockPersistenceSink::failing());
        for i in 0..3 {
            buffer.add(OwnerId::UNLINKED, format!("k{i}"), vec![]).await.unwrap();
        }
        let lifecycle = BufferLifecycle::start(buffer, sink, LifecycleConfig::for_testing());
        let report = lifecycle.shutdown().await;
        assert_eq!(report.cycles, 0);
        assert_eq!(report.remaining, 3);
        assert!(report.last_error.is_some());
        assert!(!report.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_operations_after_shutdown() {
        let buffer = buffer();
        let lifecycle = BufferLifecycle::start(
            buffer.clone(),
            Arc::new(MockPersistenceSink::new()),
            LifecycleConfig::for_testing(),
        );

        let first = lifecycle.shutdown().await;
        let second = lifecycle.shutdown().await;
        assert_eq!(first, second);

        assert!(matches!(lifecycle.flush_now().await, Err(BufferError::Stopped)));
        assert!(matches!(lifecycle.reap_now().await, Err(BufferError::Stopped)));
        assert!(matches!(
            buffer.add(OwnerId::UNLINKED, "k", vec![]).await,
            Err(BufferError::Stopped)
        ));
        assert!(matches!(buffer.get("k").await, Err(BufferError::Stopped)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_now() {
        let buffer = buffer();
        let sink = Arc::new(MockPersistenceSink::new());
        let config = LifecycleConfig::builder()
            .flush_interval(Duration::from_secs(3600))
            .build();
        let lifecycle = BufferLifecycle::start(buffer.clone(), sink.clone(), config);

        buffer.add(OwnerId::UNLINKED, "k", b"v".to_vec()).await.unwrap();
        let report = lifecycle.flush_now().await.unwrap();
        assert_eq!(report.evicted, 1);
        assert_eq!(sink.persist_count(), 1);

        lifecycle.shutdown().await;
    }
}
