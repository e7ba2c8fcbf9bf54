//! DealScope CLI — CRM deal context aggregation and model analysis.
//!
//! Collects everything the CRM knows about a deal into one chronological
//! document, runs a prompt-driven analysis over it, and records results and
//! feedback locally.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
