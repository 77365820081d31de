// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `status` command.

use tracing::warn;

use crate::cli::{Cli, OutputFormat, StatusArgs};
use crate::error::{BinError, BinResult};
use crate::runtime::{connect_store, open_buffer};

/// Executes the `status` command to report pending records.
pub async fn status(cli: &Cli, args: StatusArgs) -> BinResult<()> {
    let config = spool_config::load_config(&cli.config)
        .map_err(|e| BinError::Configuration(format!("Failed to load configuration: {}", e)))?;

    let store = connect_store(&config.store).await?;
    let buffer = open_buffer(&config, store);
    let pending = buffer
        .count()
        .await
        .map_err(|e| BinError::from(e).with_context("Failed to count pending records"))?;

    if let Err(e) = buffer.close().await {
        warn!(error = %e, "Failed to close backing store");
    }

    match args.format {
        OutputFormat::Text => {
            println!("Store:     {} ({})", config.store.backend.as_str(), config.store.address);
            println!("Namespace: {}", config.store.namespace);
            println!("Pending:   {}", pending);
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "store_backend": config.store.backend.as_str(),
                "namespace": config.store.namespace,
                "pending": pending,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).map_err(|e| BinError::runtime(e.to_string()))?
            );
        }
    }

    if args.metrics {
        println!();
        print!("{}", spool_buffer::metrics::gather());
    }

    Ok(())
}
