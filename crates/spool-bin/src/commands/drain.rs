// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `drain` command.

use std::time::Duration;

use tracing::info;

use spool_buffer::{BufferLifecycle, DrainReport};

use crate::cli::{Cli, DrainArgs, OutputFormat};
use crate::error::{BinError, BinResult};
use crate::runtime::{build_sink, connect_store, lifecycle_config, open_buffer};

/// Executes the `drain` command: flushes everything pending once and exits.
pub async fn drain(cli: &Cli, args: DrainArgs) -> BinResult<()> {
    let config = spool_config::load_config(&cli.config)
        .map_err(|e| BinError::Configuration(format!("Failed to load configuration: {}", e)))?;

    let mut timing = lifecycle_config(&config.buffer);
    if let Some(secs) = args.deadline_secs {
        if secs == 0 {
            return Err(BinError::config("--deadline-secs cannot be zero"));
        }
        timing.drain_deadline = Duration::from_secs(secs);
    }

    let store = connect_store(&config.store).await?;
    let sink = build_sink(&config.sink)?;
    let buffer = open_buffer(&config, store);

    info!(
        namespace = %config.store.namespace,
        deadline_secs = timing.drain_deadline.as_secs(),
        "Draining buffer"
    );
    let lifecycle = BufferLifecycle::start(buffer, sink, timing);
    let report = lifecycle.shutdown().await;

    print_report(&report, args.format)?;

    if report.is_complete() {
        Ok(())
    } else {
        Err(BinError::Drain(describe(&report)))
    }
}

fn print_report(report: &DrainReport, format: OutputFormat) -> BinResult<()> {
    match format {
        OutputFormat::Text => {
            println!("Cycles:    {}", report.cycles);
            println!("Flushed:   {}", report.flushed);
            println!("Remaining: {}", report.remaining);
            if report.deadline_exceeded {
                println!("Deadline exceeded");
            }
            if let Some(error) = &report.last_error {
                println!("Last error: {}", error);
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(report).map_err(|e| BinError::runtime(e.to_string()))?
            );
        }
    }
    Ok(())
}

fn describe(report: &DrainReport) -> String {
    let mut reason = format!("{} record(s) remaining", report.remaining);
    if report.deadline_exceeded {
        reason.push_str(", deadline exceeded");
    }
    if let Some(error) = &report.last_error {
        reason.push_str(", last error: ");
        reason.push_str(error);
    }
    reason
}
