// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # spool-config
//!
//! Configuration management for SPOOL.
//!
//! ## Features
//!
//! - **Schema Definition**: Service, store, buffer, sink and logging sections
//!   with defaults and validation
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: `${VAR:default}` placeholders and `SPOOL_*`
//!   variables
//!
//! ## Quick Start
//!
//! ```no_run
//! use spool_config::loader::load_config;
//!
//! let config = load_config("spool.yaml").unwrap();
//!
//! println!("Namespace: {}", config.store.namespace);
//! println!("Flush every {}s", config.buffer.flush_interval_secs);
//! ```
//!
//! ## Configuration Schema
//!
//! - `service` - Service name and metrics switch
//! - `store` - Backing store kind, address and key namespace
//! - `buffer` - Flush, reap and drain timing
//! - `sink` - Durable store sink
//! - `logging` - Logging configuration

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader, ConfigLoaderBuilder};
pub use schema::{
    BufferConfig, LogFormat, LogLevel, LoggingConfig, ServiceConfig, SinkConfig, SinkKind,
    SpoolConfig, StoreBackend, StoreConfig,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
