//! groundwork CLI — retrieval and cache maintenance for a grounded support assistant.
//!
//! Searches the help center, internal pages and ticket history, crawls the
//! help center into the local snapshot cache, and serves both over HTTP.

mod commands;
mod server;

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
