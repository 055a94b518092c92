//! Entry point for mcp-forge.
use std::process::ExitCode;

use clap::Parser;
use mcp_forge::{
    cli::{self, ForgeCli},
    lib::telemetry,
};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = telemetry::init_tracing() {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }

    let args = ForgeCli::parse();
    match cli::execute(args).await {
        Ok(payload) => {
            println!("{payload}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
