//! lakeexport CLI: export a knowledge-base account to Markdown.
//!
//! `crawl` mirrors the account's documents into local storage, `build`
//! converts the mirror into a Markdown tree, and `convert` handles one file.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli)?;
    commands::run(cli).await
}
