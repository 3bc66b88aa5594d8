//! git-capsulate - isolated Git agents in containers

#![cfg_attr(test, allow(clippy::expect_used))]

use std::process::ExitCode;

use capsulate_cli::cli::Cli;
use capsulate_cli::output::json::{error_code, format_error};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            let message = format!("{e:#}");
            if json && let Ok(body) = format_error(&message, error_code(&e)) {
                println!("{body}");
            } else {
                eprintln!("Error: {message}");
            }
            ExitCode::FAILURE
        }
    }
}
