mod cli;
mod commands;
use clap::Parser;

use crate::cli::{Cli, run_cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shared::env::configure_env()?;
    shared::logging::configure_logging()?;

    // CLI args take precedence over OVERVIEW_* env vars
    let cli = Cli::parse();

    run_cli(cli).await
}
