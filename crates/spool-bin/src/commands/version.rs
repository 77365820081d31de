// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("SPOOL - write-behind buffer");
    println!();
    println!("Version Information:");
    println!("  spool-bin:    {}", env!("CARGO_PKG_VERSION"));
    println!("  spool-core:   {}", spool_core::VERSION);
    println!("  spool-config: {}", spool_config::VERSION);
    println!("  spool-buffer: {}", spool_buffer::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("Features:");
    println!(
        "  Redis:        {}",
        if cfg!(feature = "redis-backend") { "enabled" } else { "disabled" }
    );
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
