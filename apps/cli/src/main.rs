//! LexRisk CLI: legal risk analysis of documents.
//!
//! Splits a document into chunks, has each chunk reviewed by a reasoning
//! model, and keeps a per-user history of past analyses.

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
