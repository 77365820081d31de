// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Service runtime orchestration.
//!
//! Wires configuration into the buffer components:
//!
//! - Backing store connection (memory or Redis)
//! - Persistence sink (discard or HTTP)
//! - Buffer lifecycle with periodic flush and reap
//! - Graceful shutdown with a bounded drain

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use spool_buffer::{
    BackingStore, BufferLifecycle, BufferMetricsCollector, BufferStore, DiscardSink, DrainReport,
    HttpPersistenceSink, LifecycleConfig, MemoryStore, Namespace, PersistenceSink,
};
use spool_config::{load_config, BufferConfig, SinkConfig, SinkKind, SpoolConfig, StoreBackend, StoreConfig};

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// Component Factories
// =============================================================================

/// Connects the backing store described by `config`.
pub async fn connect_store(config: &StoreConfig) -> BinResult<Arc<dyn BackingStore>> {
    match config.backend {
        StoreBackend::Memory => {
            warn!("Using the in-memory backing store, pending records are lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "redis-backend")]
        StoreBackend::Redis => {
            let store = spool_buffer::RedisStore::connect(&config.url())
                .await
                .map_err(|e| {
                    BinError::from(e).with_context(format!("Failed to connect to {}", config.address))
                })?;
            info!(address = %config.address, "Connected to Redis backing store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis-backend"))]
        StoreBackend::Redis => Err(BinError::config(
            "store.backend = redis requires a build with the `redis-backend` feature",
        )),
    }
}

/// Builds the persistence sink described by `config`.
pub fn build_sink(config: &SinkConfig) -> BinResult<Arc<dyn PersistenceSink>> {
    match config.kind {
        SinkKind::Discard => {
            warn!("Using the discard sink, flushed records are dropped");
            Ok(Arc::new(DiscardSink::new()))
        }
        SinkKind::Http => {
            let endpoint = config
                .endpoint
                .as_deref()
                .ok_or_else(|| BinError::config("sink.endpoint is required for the http sink"))?;
            let sink = HttpPersistenceSink::new(endpoint, config.timeout())
                .map_err(|e| BinError::init(format!("Failed to build HTTP sink: {}", e)))?;
            info!(endpoint, "Persisting to HTTP sink");
            Ok(Arc::new(sink))
        }
    }
}

/// Maps the `buffer` section onto lifecycle timing.
pub fn lifecycle_config(config: &BufferConfig) -> LifecycleConfig {
    LifecycleConfig::builder()
        .flush_interval(config.flush_interval())
        .reap_interval(config.reap_interval())
        .stale_threshold(config.stale_threshold())
        .max_batch_size(config.max_batch_size)
        .flush_timeout(config.flush_timeout())
        .reap_timeout(config.reap_timeout())
        .drain_deadline(config.drain_deadline())
        .build()
}

/// Wraps `store` in a buffer using the configured namespace.
pub fn open_buffer(config: &SpoolConfig, store: Arc<dyn BackingStore>) -> BufferStore {
    BufferStore::new(store, Namespace::new(config.store.namespace.clone()))
        .with_metrics(BufferMetricsCollector::new(config.service.metrics))
}

// =============================================================================
// SpoolRuntime
// =============================================================================

/// The service runtime.
pub struct SpoolRuntime {
    config: Arc<SpoolConfig>,
    shutdown: ShutdownCoordinator,
    store: Option<Arc<dyn BackingStore>>,
    discard: bool,
}

impl SpoolRuntime {
    /// Creates a new runtime.
    pub fn new(config: SpoolConfig) -> Self {
        Self {
            config: Arc::new(config),
            shutdown: ShutdownCoordinator::new(),
            store: None,
            discard: false,
        }
    }

    /// Uses the discard sink regardless of configuration.
    pub fn with_discard(mut self, discard: bool) -> Self {
        self.discard = discard;
        self
    }

    /// Uses an already connected store instead of connecting one.
    pub fn with_store(mut self, store: Arc<dyn BackingStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SpoolConfig {
        &self.config
    }

    /// Returns the shutdown coordinator.
    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Runs until shutdown is signaled, then drains.
    pub async fn run(self) -> BinResult<DrainReport> {
        info!(service = %self.config.service.name, "Starting SPOOL v{}", spool_core::VERSION);

        let store = match self.store.clone() {
            Some(store) => store,
            None => connect_store(&self.config.store).await?,
        };
        let sink = if self.discard {
            build_sink(&SinkConfig {
                kind: SinkKind::Discard,
                ..self.config.sink.clone()
            })?
        } else {
            build_sink(&self.config.sink)?
        };

        let buffer = open_buffer(&self.config, store);
        match buffer.count().await {
            Ok(pending) => info!(
                namespace = %buffer.namespace().prefix(),
                pending,
                "Buffer opened"
            ),
            Err(e) => warn!(error = %e, "Failed to count pending records"),
        }

        let lifecycle = BufferLifecycle::start(buffer, sink, lifecycle_config(&self.config.buffer));
        info!(
            flush_interval_secs = self.config.buffer.flush_interval_secs,
            reap_interval_secs = self.config.buffer.reap_interval_secs,
            "SPOOL is ready"
        );

        self.shutdown.wait_for_shutdown().await;
        info!("Shutdown initiated, draining buffer...");

        let report = lifecycle.shutdown().await;
        let stats = lifecycle.buffer().stats();
        info!(
            added = stats.records_added,
            flushed = stats.records_flushed,
            reaped = stats.records_reaped,
            corrupt = stats.records_corrupt,
            "SPOOL shutdown complete"
        );

        Ok(report)
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for constructing the runtime.
#[derive(Default)]
pub struct RuntimeBuilder {
    config_path: Option<std::path::PathBuf>,
    config: Option<SpoolConfig>,
    discard: bool,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: SpoolConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses the discard sink regardless of configuration.
    pub fn discard(mut self, discard: bool) -> Self {
        self.discard = discard;
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> BinResult<SpoolRuntime> {
        let config = match self.config {
            Some(cfg) => cfg,
            None => {
                let path = self
                    .config_path
                    .ok_or_else(|| BinError::Configuration("No configuration provided".into()))?;

                load_config(&path).map_err(|e| {
                    BinError::Configuration(format!("Failed to load config from {:?}: {}", path, e))
                })?
            }
        };

        Ok(SpoolRuntime::new(config).with_discard(self.discard))
    }
}

// =============================================================================
// Tests
// =============================================================================
