// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # spool-buffer
//!
//! Write-behind buffering for SPOOL.
//!
//! Producers add records at high rate; the buffer absorbs them into a
//! backing store and later moves them to a durable store in bounded
//! batches, evicting an entry only if it did not change while its batch
//! was being persisted.
//!
//! ```text
//! producer ─▶ BufferStore::add ─▶ BackingStore ◀─ FlushEngine ─▶ PersistenceSink
//!                                      ▲
//!                                 StaleReaper
//!
//!              BufferLifecycle ticks both, drains on shutdown
//! ```
//!
//! ## Feature Flags
//!
//! - `redis-backend`: Enables the Redis backing store

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod buffer;
pub mod flush;
pub mod lifecycle;
pub mod metrics;
pub mod reaper;
pub mod resolver;
pub mod service;
pub mod sink;
pub mod stats;
pub mod store;

pub use buffer::BufferStore;
pub use flush::{FlushEngine, FlushReport, DEFAULT_MAX_BATCH_SIZE};
pub use lifecycle::{BufferLifecycle, DrainReport, LifecycleConfig, LifecycleConfigBuilder, LifecycleState};
pub use metrics::BufferMetricsCollector;
pub use reaper::{ReapReport, StaleReaper};
pub use resolver::{OwnerResolver, StaticOwnerResolver};
pub use service::{BufferService, DurableReader, FetchSource, FetchedItem};
pub use sink::{DiscardSink, HttpPersistenceSink, MockPersistenceSink, PersistenceSink};
pub use stats::{BufferStats, BufferStatsInner};
pub use store::{BackingStore, MemoryStore, Namespace, DEFAULT_NAMESPACE};
#[cfg(feature = "redis-backend")]
pub use store::RedisStore;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
