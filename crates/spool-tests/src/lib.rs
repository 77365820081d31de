// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # SPOOL Integration Tests
//!
//! Integration tests and shared test utilities for the SPOOL workspace.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p spool-tests
//! cargo test -p spool-tests --test integration_buffer
//! cargo test -p spool-tests --test integration_lifecycle
//! cargo test -p spool-tests --test integration_config
//! ```
//!
//! ## Test Categories
//!
//! ### Buffer Tests (`integration_buffer.rs`)
//! - Add, overwrite and lookup
//! - Flush batching, eviction and the overwrite race
//! - Sink and store failures
//! - Corrupt and orphaned entries
//! - Stale reaping
//! - Concurrent producers with a running flusher
//!
//! ### Lifecycle Tests (`integration_lifecycle.rs`)
//! - Periodic flush and reap
//! - Shutdown drain, deadline and idempotence
//!
//! ### Config Tests (`integration_config.rs`)
//! - YAML, TOML and JSON files
//! - Environment overrides and placeholders
//! - Validation rules
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use spool_tests::common::{BufferHarness, RecordFixtures};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let harness = BufferHarness::new();
//!     RecordFixtures::fill(&harness.buffer, 10).await;
//!     harness.flush_until_empty(5, 10).await;
//!     assert_eq!(harness.sink.record_count(), 10);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::assertions::*;
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
}
