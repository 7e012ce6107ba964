//! docbuild CLI: builds the toolchain documentation site.
//!
//! Runs each module's tests against its binary, generates the dictionary,
//! error listing and report pages, renders everything with the module's
//! template, and aggregates the result into one site.

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
