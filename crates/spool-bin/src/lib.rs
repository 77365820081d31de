// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # spool-bin
//!
//! CLI binary for the SPOOL write-behind buffer.
//!
//! - CLI argument parsing with clap
//! - Service runtime orchestration
//! - Graceful shutdown on SIGINT/SIGTERM/SIGQUIT
//! - Logging initialization
//! - Command implementations (run, validate, version, status, drain)
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────┐
//!                    │   main.rs   │
//!                    └──────┬──────┘
//!                    ┌──────▼──────┐
//!                    │    cli.rs   │
//!                    └──────┬──────┘
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        └──────────┘ └────┬─────┘ └──────────┘
//!                    ┌─────▼───────┐
//!                    │  shutdown   │
//!                    └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the service (default command)
//! spool -c /etc/spool/spool.yaml
//!
//! # Validate configuration
//! spool validate --strict
//!
//! # Count pending records
//! spool status -f json
//!
//! # Flush everything and exit
//! spool drain --deadline-secs 300
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{RuntimeBuilder, SpoolRuntime};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
