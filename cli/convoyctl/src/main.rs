//! convoy - deploy jobs to a Nomad cluster and follow them to completion.
//!
//! The CLI wraps the `convoy-deploy` engine: it loads a rendered job file,
//! resolves client settings from config, environment and flags, sets up
//! logging, and maps the engine's outcome to an exit status.

use anyhow::Result;
use clap::Parser;

mod commands;
mod config;
mod error;
mod jobfile;
mod logging;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
