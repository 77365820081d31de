// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use spool_config::{SinkKind, SpoolConfig, StoreBackend};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    if !config_path.exists() {
        return Err(BinError::Configuration(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    let config = spool_config::load_config(config_path).map_err(|e| {
        BinError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Service:        {}", config.service.name);
            println!("  Store:          {} ({})", config.store.backend.as_str(), config.store.address);
            println!("  Namespace:      {}", config.store.namespace);
            println!("  Sink:           {}", config.sink.kind.as_str());
            println!("  Flush every:    {}s, up to {} records", config.buffer.flush_interval_secs, config.buffer.max_batch_size);
            println!("  Reap every:     {}s, older than {}s", config.buffer.reap_interval_secs, config.buffer.stale_threshold_secs);
            println!("  Drain deadline: {}s", config.buffer.drain_deadline_secs);

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config)
                        .unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "service": config.service.name,
                    "store_backend": config.store.backend.as_str(),
                    "namespace": config.store.namespace,
                    "sink": config.sink.kind.as_str(),
                    "flush_interval_secs": config.buffer.flush_interval_secs,
                    "max_batch_size": config.buffer.max_batch_size,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).map_err(|e| BinError::runtime(e.to_string()))?
            );
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::Configuration(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

/// Returns settings that are valid but likely unintended.
pub(crate) fn collect_warnings(config: &SpoolConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.store.backend == StoreBackend::Memory {
        warnings.push("In-memory store: pending records are lost when the process exits".to_string());
    }
    if config.sink.kind == SinkKind::Discard {
        warnings.push("Discard sink: flushed records are dropped".to_string());
    }
    if config.buffer.stale_threshold_secs <= config.buffer.flush_interval_secs {
        warnings.push(format!(
            "Stale threshold ({}s) is not longer than the flush interval ({}s): records may be reaped before they are flushed",
            config.buffer.stale_threshold_secs, config.buffer.flush_interval_secs
        ));
    }
    if config.buffer.flush_timeout_secs > config.buffer.flush_interval_secs * 10 {
        warnings.push("Flush timeout is much longer than the flush interval".to_string());
    }

    warnings
}
