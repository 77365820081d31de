// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # spool-core
//!
//! Core types and the shared error hierarchy for SPOOL, a write-behind
//! buffering layer.
//!
//! This crate provides the foundational pieces used across all SPOOL
//! components:
//!
//! - **Types**: `OwnerId`, `ItemKey` and the `BufferedRecord` unit of buffering
//! - **Codec**: the stored encoding of a record, whose bytes double as the
//!   snapshot compared by the conditional evict
//! - **Error**: unified error hierarchy with retry classification
//!
//! ## Example
//!
//! ```
//! use spool_core::types::{BufferedRecord, OwnerId};
//!
//! let record = BufferedRecord::new(OwnerId::new(42), "user-1", b"{\"qty\":3}".to_vec());
//! let stored = record.encode().unwrap();
//! let decoded = BufferedRecord::decode("user-1", &stored).unwrap();
//! assert_eq!(decoded, record);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod error;
pub mod types;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::*;
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
