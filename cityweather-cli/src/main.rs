//! Binary crate for the `cityweather` terminal app.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Driving the search loop on a real terminal
//! - Human-friendly output formatting

use clap::Parser;

mod cli;
mod logging;
mod terminal;
mod view;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    cmd.run().await
}
