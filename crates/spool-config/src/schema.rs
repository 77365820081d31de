// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for SPOOL.
//!
//! Every section is optional in the file; missing values fall back to the
//! defaults below. Durations are expressed in whole seconds (`*_secs`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Constants
// =============================================================================

/// Default service name.
pub const DEFAULT_SERVICE_NAME: &str = "spool";

/// Default Redis address.
pub const DEFAULT_STORE_ADDRESS: &str = "127.0.0.1:6379";

/// Default key namespace.
pub const DEFAULT_NAMESPACE: &str = "spool:buffer";

/// Default flush interval in seconds.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 30;

/// Default reap interval in seconds (5 minutes).
pub const DEFAULT_REAP_INTERVAL_SECS: u64 = 300;

/// Default stale threshold in seconds (1 hour).
pub const DEFAULT_STALE_THRESHOLD_SECS: u64 = 3600;

/// Default maximum records per flush batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;

/// Default flush cycle timeout in seconds.
pub const DEFAULT_FLUSH_TIMEOUT_SECS: u64 = 60;

/// Default reap cycle timeout in seconds.
pub const DEFAULT_REAP_TIMEOUT_SECS: u64 = 30;

/// Default shutdown drain deadline in seconds.
pub const DEFAULT_DRAIN_DEADLINE_SECS: u64 = 120;

/// Default sink request timeout in seconds.
pub const DEFAULT_SINK_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure for SPOOL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpoolConfig {
    /// Service identification.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Backing store connection.
    #[serde(default)]
    pub store: StoreConfig,

    /// Flush, reap and drain timing.
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Durable store sink.
    #[serde(default)]
    pub sink: SinkConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SpoolConfig {
    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.service.validate()?;
        self.store.validate()?;
        self.buffer.validate()?;
        self.sink.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

// =============================================================================
// Service Configuration
// =============================================================================

/// Service identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Name used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Register Prometheus metrics.
    #[serde(default = "default_enabled")]
    pub metrics: bool,
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

fn default_enabled() -> bool {
    true
}

impl ServiceConfig {
    /// Validates the service configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation("service.name", "cannot be empty"));
        }
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            metrics: true,
        }
    }
}

// =============================================================================
// Store Configuration
// =============================================================================

/// Backing store kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store. Contents are lost on exit.
    #[default]
    Memory,
    /// Redis server.
    Redis,
}

impl StoreBackend {
    /// Returns the backend name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Redis => "redis",
        }
    }
}

/// Backing store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store kind.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Server address, either `host:port` or a full `redis://` URL.
    #[serde(default = "default_store_address")]
    pub address: String,

    /// Password for `host:port` addresses.
    #[serde(default)]
    pub password: Option<String>,

    /// Logical database for `host:port` addresses.
    #[serde(default)]
    pub database: u32,

    /// Prefix of the buffer's store keys.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_store_address() -> String {
    DEFAULT_STORE_ADDRESS.to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl StoreConfig {
    /// Validates the store configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::validation("store.namespace", "cannot be empty"));
        }
        if self.backend == StoreBackend::Redis && self.address.trim().is_empty() {
            return Err(ConfigError::validation(
                "store.address",
                "required for the redis backend",
            ));
        }
        Ok(())
    }

    /// Returns the connection URL.
    ///
    /// A `redis://` or `rediss://` address is used as is; otherwise the URL is
    /// assembled from the address, password and database.
    pub fn url(&self) -> String {
        if self.address.starts_with("redis://") || self.address.starts_with("rediss://") {
            return self.address.clone();
        }
        match &self.password {
            Some(password) => format!("redis://:{}@{}/{}", password, self.address, self.database),
            None => format!("redis://{}/{}", self.address, self.database),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            address: default_store_address(),
            password: None,
            database: 0,
            namespace: default_namespace(),
        }
    }
}

// =============================================================================
// Buffer Configuration
// =============================================================================

/// Flush, reap and drain timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BufferConfig {
    /// Period between flush cycles.
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,

    /// Period between reap cycles.
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,

    /// Records older than this are reaped.
    #[serde(default = "default_stale_threshold")]
    pub stale_threshold_secs: u64,

    /// Maximum records per flush cycle.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Upper bound of one flush cycle.
    #[serde(default = "default_flush_timeout")]
    pub flush_timeout_secs: u64,

    /// Upper bound of one reap cycle.
    #[serde(default = "default_reap_timeout")]
    pub reap_timeout_secs: u64,

    /// Upper bound of the shutdown drain.
    #[serde(default = "default_drain_deadline")]
    pub drain_deadline_secs: u64,
}

fn default_flush_interval() -> u64 {
    DEFAULT_FLUSH_INTERVAL_SECS
}

fn default_reap_interval() -> u64 {
    DEFAULT_REAP_INTERVAL_SECS
}

fn default_stale_threshold() -> u64 {
    DEFAULT_STALE_THRESHOLD_SECS
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_flush_timeout() -> u64 {
    DEFAULT_FLUSH_TIMEOUT_SECS
}

fn default_reap_timeout() -> u64 {
    DEFAULT_REAP_TIMEOUT_SECS
}

fn default_drain_deadline() -> u64 {
    DEFAULT_DRAIN_DEADLINE_SECS
}

impl BufferConfig {
    /// Validates the buffer configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let non_zero = [
            ("buffer.flush_interval_secs", self.flush_interval_secs),
            ("buffer.reap_interval_secs", self.reap_interval_secs),
            ("buffer.stale_threshold_secs", self.stale_threshold_secs),
            ("buffer.flush_timeout_secs", self.flush_timeout_secs),
            ("buffer.reap_timeout_secs", self.reap_timeout_secs),
            ("buffer.drain_deadline_secs", self.drain_deadline_secs),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::validation(field, "cannot be zero"));
            }
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::validation(
                "buffer.max_batch_size",
                "cannot be zero",
            ));
        }
        if self.drain_deadline_secs < self.flush_timeout_secs {
            return Err(ConfigError::validation(
                "buffer.drain_deadline_secs",
                "must be at least buffer.flush_timeout_secs",
            ));
        }
        Ok(())
    }

    /// Returns the flush interval.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// Returns the reap interval.
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    /// Returns the stale threshold.
    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }

    /// Returns the flush timeout.
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }

    /// Returns the reap timeout.
    pub fn reap_timeout(&self) -> Duration {
        Duration::from_secs(self.reap_timeout_secs)
    }

    /// Returns the drain deadline.
    pub fn drain_deadline(&self) -> Duration {
        Duration::from_secs(self.drain_deadline_secs)
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            reap_interval_secs: DEFAULT_REAP_INTERVAL_SECS,
            stale_threshold_secs: DEFAULT_STALE_THRESHOLD_SECS,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            flush_timeout_secs: DEFAULT_FLUSH_TIMEOUT_SECS,
            reap_timeout_secs: DEFAULT_REAP_TIMEOUT_SECS,
            drain_deadline_secs: DEFAULT_DRAIN_DEADLINE_SECS,
        }
    }
}

// =============================================================================
// Sink Configuration
// =============================================================================

/// Durable store sink kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Accept and drop every batch.
    #[default]
    Discard,
    /// POST batches as JSON to an HTTP endpoint.
    Http,
}

impl SinkKind {
    /// Returns the sink name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Discard => "discard",
            SinkKind::Http => "http",
        }
    }
}

/// Durable store sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    /// Sink kind.
    #[serde(default)]
    pub kind: SinkKind,

    /// Endpoint URL for the HTTP sink.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request timeout.
    #[serde(default = "default_sink_timeout")]
    pub timeout_secs: u64,
}

fn default_sink_timeout() -> u64 {
    DEFAULT_SINK_TIMEOUT_SECS
}

impl SinkConfig {
    /// Validates the sink configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.kind == SinkKind::Http {
            match self.endpoint.as_deref().map(str::trim) {
                None | Some("") => {
                    return Err(ConfigError::validation(
                        "sink.endpoint",
                        "required for the http sink",
                    ))
                }
                Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                    return Err(ConfigError::validation(
                        "sink.endpoint",
                        "must be an http:// or https:// URL",
                    ))
                }
                Some(_) => {}
            }
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::validation("sink.timeout_secs", "cannot be zero"));
        }
        Ok(())
    }

    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            endpoint: None,
            timeout_secs: DEFAULT_SINK_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Validates the logging configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Single-line compact text.
    Compact,
    /// JSON lines.
    Json,
}

impl LogFormat {
    /// Returns the format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        }
    }
}
