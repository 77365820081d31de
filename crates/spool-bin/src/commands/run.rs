// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use tracing::info;

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::runtime::RuntimeBuilder;

/// Executes the `run` command to start the service.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    info!("Starting SPOOL...");

    let runtime = RuntimeBuilder::new()
        .config_path(&cli.config)
        .discard(args.discard)
        .build()?;

    // An incomplete drain is already logged by the lifecycle; the records
    // stay in the backing store for the next start.
    runtime.run().await.map(|_| ())
}
