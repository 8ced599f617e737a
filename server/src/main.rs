// server/src/main.rs

// Entry point for the clinic server binary. Argument parsing, logging setup
// and command dispatch live in the CLI module.

use anyhow::Result;
use clinic_server::cli::start_cli;

#[tokio::main]
async fn main() -> Result<()> {
    start_cli().await
}
