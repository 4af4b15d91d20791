use std::error::Error;

use clap::{Parser, Subcommand};
use shared::error::CommonError;

use crate::commands::{self, matrix::MatrixParams, serve::ServeParams};

pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "overview-server", about = "Compare secrets across environments")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the overview HTTP API
    Serve(ServeParams),
    /// Print the overview matrix of one path
    Matrix(MatrixParams),
    /// Print the OpenAPI document of the HTTP API
    Openapi,
    /// Show version
    Version,
}

fn log_error_chain(err: &(dyn Error)) {
    let mut current: Option<&(dyn Error)> = Some(err);

    while let Some(e) = current {
        eprintln!("Caused by: {e}");
        current = e.source();
    }
}

fn handle_error(err: &CommonError) {
    eprintln!("Error: {err}");
    log_error_chain(&err);
    ::std::process::exit(1);
}

pub async fn run_cli(cli: Cli) -> Result<(), anyhow::Error> {
    let cmd_res = match cli.command {
        Commands::Serve(params) => commands::serve::cmd_serve(params).await,
        Commands::Matrix(params) => commands::matrix::cmd_matrix(params).await,
        Commands::Openapi => commands::cmd_openapi(),
        Commands::Version => {
            println!("overview-server version: {CLI_VERSION}");
            Ok(())
        }
    };

    if let Err(e) = cmd_res {
        handle_error(&e);
    }
    Ok(())
}
