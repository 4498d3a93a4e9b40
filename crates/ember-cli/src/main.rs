// ABOUTME: Entry point for the ember CLI
// ABOUTME: Loads .env, parses arguments, sets up logging, and dispatches commands

use anyhow::Result;
use clap::Parser;
use ember_cli::commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so clap sees EMBER_* variables
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    ember_cli::init_logging(cli.verbose);

    ember_cli::run_command(cli).await
}
