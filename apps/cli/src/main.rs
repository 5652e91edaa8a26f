//! Oireachtas corpus CLI.
//!
//! Harvests debates, committee sessions, and written questions from the
//! Oireachtas API into one XML corpus, and flattens that corpus into rows.

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
