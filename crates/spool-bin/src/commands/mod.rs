// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `run`: Start the buffer service
//! - `validate`: Validate configuration file
//! - `version`: Show version information
//! - `status`: Print the number of pending records
//! - `drain`: Flush everything pending once and exit

mod drain;
mod run;
mod status;
mod validate;
mod version;

pub use drain::drain;
pub use run::run;
pub use status::status;
pub use validate::validate;
pub use version::version;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(&cli),
        Commands::Status(args) => status::status(&cli, args).await,
        Commands::Drain(args) => drain::drain(&cli, args).await,
    }
}
