// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for SPOOL.
//!
//! This module defines the error types shared by every layer of the
//! write-behind buffer:
//!
//! - Clear, descriptive messages suitable for structured logging
//! - Error chaining for traceability
//! - A split between retryable (transient) and permanent failures
//! - Stable `error_type()` labels for metrics
//!
//! # Error Hierarchy
//!
//! ```text
//! SpoolError (root)
//! ├── BufferError    - Buffer operations (add, get, flush, reap, drain)
//! ├── StoreError     - Backing store adapter (connectivity, protocol)
//! ├── SinkError      - Persistence sink delivery
//! └── ResolveError   - Owner resolution (always non-fatal)
//! ```
//!
//! # Examples
//!
//! ```
//! use spool_core::error::{BufferError, SinkError, SpoolError};
//!
//! let error: BufferError = SinkError::rejected(503, "unavailable").into();
//! assert!(error.is_retryable());
//!
//! let root: SpoolError = error.into();
//! assert!(root.is_retryable());
//! ```

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// SpoolError - Root Error Type
// =============================================================================

/// The root error type for SPOOL.
#[derive(Debug, Error)]
pub enum SpoolError {
    /// Buffer error.
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// Backing store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Persistence sink error.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Owner resolution error.
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),
}

impl SpoolError {
    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            SpoolError::Buffer(e) => e.is_retryable(),
            SpoolError::Store(e) => e.is_retryable(),
            SpoolError::Sink(e) => e.is_retryable(),
            SpoolError::Resolve(_) => false,
        }
    }

    /// Returns a stable label for logs and metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            SpoolError::Buffer(e) => e.error_type(),
            SpoolError::Store(e) => e.error_type(),
            SpoolError::Sink(e) => e.error_type(),
            SpoolError::Resolve(_) => "resolve",
        }
    }
}

// =============================================================================
// StoreError
// =============================================================================

/// Errors raised by a backing store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or the connection dropped.
    #[error("Store connection failed: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// The store answered, but the command failed.
    #[error("Store command '{command}' failed: {message}")]
    Command {
        /// The command that failed.
        command: String,
        /// Error message.
        message: String,
    },

    /// The store has been closed and accepts no further operations.
    #[error("Store is closed")]
    Closed,
}

impl StoreError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a command error.
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Connection { .. } | StoreError::Command { .. })
    }

    /// Returns a stable label for logs and metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            StoreError::Connection { .. } => "store_connection",
            StoreError::Command { .. } => "store_command",
            StoreError::Closed => "store_closed",
        }
    }
}

// =============================================================================
// SinkError
// =============================================================================

/// Errors raised by a persistence sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink could not be reached.
    #[error("Sink unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },

    /// The sink answered with a failure status.
    #[error("Sink rejected batch (status {status}): {message}")]
    Rejected {
        /// Status code reported by the sink.
        status: u16,
        /// Error message.
        message: String,
    },

    /// The batch could not be encoded for the sink.
    #[error("Sink encoding failed: {message}")]
    Encoding {
        /// Error message.
        message: String,
    },
}

impl SinkError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a rejected error.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Creates an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    ///
    /// Every delivery failure is retried on the next flush tick; only
    /// client-side encoding failures and 4xx rejections (other than 408/429)
    /// are reported as permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            SinkError::Unavailable { .. } => true,
            SinkError::Rejected { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            SinkError::Encoding { .. } => false,
        }
    }

    /// Returns a stable label for logs and metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            SinkError::Unavailable { .. } => "sink_unavailable",
            SinkError::Rejected { .. } => "sink_rejected",
            SinkError::Encoding { .. } => "sink_encoding",
        }
    }
}

// =============================================================================
// ResolveError
// =============================================================================

/// Owner resolution failed. Buffering proceeds with an unlinked owner.
#[derive(Debug, Error)]
#[error("Failed to resolve owner for '{item_key}': {message}")]
pub struct ResolveError {
    /// The key that could not be resolved.
    pub item_key: String,
    /// Error message.
    pub message: String,
}

impl ResolveError {
    /// Creates a resolve error.
    pub fn new(item_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item_key: item_key.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// BufferError
// =============================================================================

/// Buffer-related errors.
#[derive(Debug, Error)]
pub enum BufferError {
    /// A record could not be serialized for storage.
    #[error("Failed to serialize record '{item_key}': {message}")]
    Serialization {
        /// The key of the rejected record.
        item_key: String,
        /// Error message.
        message: String,
    },

    /// A stored value could not be decoded.
    #[error("Corrupted record '{item_key}': {message}")]
    CorruptedData {
        /// The key of the corrupt record.
        item_key: String,
        /// Error message.
        message: String,
    },

    /// The backing store failed.
    #[error("Backing store failed: {0}")]
    Store(#[from] StoreError),

    /// The persistence sink failed.
    #[error("Persistence failed: {0}")]
    Sink(#[from] SinkError),

    /// An operation exceeded its deadline.
    #[error("Operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The buffer has been stopped.
    #[error("Buffer is stopped")]
    Stopped,
}

impl BufferError {
    /// Creates a serialization error.
    pub fn serialization(item_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            item_key: item_key.into(),
            message: message.into(),
        }
    }

    /// Creates a corrupted data error.
    pub fn corrupted(item_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptedData {
            item_key: item_key.into(),
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            BufferError::Store(e) => e.is_retryable(),
            BufferError::Sink(e) => e.is_retryable(),
            BufferError::Timeout { .. } => true,
            BufferError::Serialization { .. }
            | BufferError::CorruptedData { .. }
            | BufferError::Stopped => false,
        }
    }

    /// Returns a stable label for logs and metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            BufferError::Serialization { .. } => "serialization",
            BufferError::CorruptedData { .. } => "corrupted_data",
            BufferError::Store(e) => e.error_type(),
            BufferError::Sink(e) => e.error_type(),
            BufferError::Timeout { .. } => "timeout",
            BufferError::Stopped => "stopped",
        }
    }
}

/// Coarse classification of errors, matching the four failure classes the
/// buffer distinguishes when deciding what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoolErrorKind {
    /// Delivery to the durable store failed; retried on the next tick.
    TransientSink,
    /// A buffered entry is unreadable; purged and logged as a loss.
    Corrupt,
    /// The backing store is unreachable; surfaced to the caller.
    Store,
    /// The producer's record was rejected synchronously.
    Rejected,
    /// The buffer is no longer accepting work.
    Stopped,
}

impl BufferError {
    /// Classifies this error.
    pub fn kind(&self) -> SpoolErrorKind {
        match self {
            BufferError::Sink(_) | BufferError::Timeout { .. } => SpoolErrorKind::TransientSink,
            BufferError::CorruptedData { .. } => SpoolErrorKind::Corrupt,
            BufferError::Store(StoreError::Closed) | BufferError::Stopped => SpoolErrorKind::Stopped,
            BufferError::Store(_) => SpoolErrorKind::Store,
            BufferError::Serialization { .. } => SpoolErrorKind::Rejected,
        }
    }
}

// =============================================================================
// Result Aliases
// =============================================================================

/// A Result type with BufferError.
pub type BufferResult<T> = Result<T, BufferError>;

/// A Result type with StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

/// A Result type with SinkError.
pub type SinkResult<T> = Result<T, SinkError>;

// =============================================================================
// Tests
// =============================================================================
