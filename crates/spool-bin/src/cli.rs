// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: Start the buffer service (default)
//! - `validate`: Validate configuration file
//! - `version`: Show version information
//! - `status`: Print the number of pending records
//! - `drain`: Flush everything pending once and exit

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// SPOOL - write-behind buffering in front of a durable store
///
/// Absorbs high-rate writes into a key-value backing store and persists them
/// to the durable store in bounded batches.
#[derive(Parser, Debug)]
#[command(
    name = "spool",
    author = "Sylvex <contact@sylvex.io>",
    version = spool_core::VERSION,
    about = "Write-behind buffer for high-rate record updates",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "spool.yaml",
        env = "SPOOL_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        default_value = "info",
        env = "SPOOL_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "SPOOL_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the SPOOL CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the buffer service
    ///
    /// This is the default command when no subcommand is specified. Flushes
    /// and reaps periodically until SIGINT, SIGTERM or SIGQUIT, then drains.
    Run(RunArgs),

    /// Validate the configuration file
    ///
    /// Parses and validates the configuration file without connecting to the
    /// backing store.
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,

    /// Show the number of records waiting in the backing store
    Status(StatusArgs),

    /// Flush every pending record once and exit
    ///
    /// Runs the shutdown drain against the configured store and sink without
    /// starting the periodic tasks.
    Drain(DrainArgs),
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Accept and drop every batch instead of using the configured sink
    #[arg(long, env = "SPOOL_DISCARD")]
    pub discard: bool,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `status` command.
#[derive(Args, Debug, Clone, Default)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Also print Prometheus metrics
    #[arg(long)]
    pub metrics: bool,
}

/// Arguments for the `drain` command.
#[derive(Args, Debug, Clone, Default)]
pub struct DrainArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Override the drain deadline in seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Run` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Check if verbose logging is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    /// Get the effective log level based on flags.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
