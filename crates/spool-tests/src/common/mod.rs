// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Common Test Utilities
//!
//! - `fixtures`: Pre-built records, buffers and config documents
//! - `assertions`: Buffer assertion helpers
//! - `mocks`: Sinks and stores with injectable behavior
//! - `harness`: Buffer wiring and concurrency helpers

pub mod assertions;
pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use assertions::*;
pub use fixtures::*;
pub use harness::*;
pub use mocks::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();
static NAMESPACE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Initialize test logging. Call this at the start of each test module.
pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("warn,spool_buffer=debug")),
            )
            .with_test_writer()
            .init();
    });
}

/// Generate a namespace no other test in this process uses.
pub fn unique_namespace(prefix: &str) -> String {
    format!(
        "{}-{}-{}",
        prefix,
        std::process::id(),
        NAMESPACE_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Create a temporary directory for test data.
pub fn temp_test_dir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temp directory")
}
