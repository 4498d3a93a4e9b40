// ABOUTME: Library exports for the ember CLI
// ABOUTME: Logging setup and command dispatch with resolved settings

use anyhow::Result;
use tracing_subscriber::EnvFilter;

pub mod commands;
pub mod config;

pub use commands::{CaCommand, Cli, Command, SshCommand};
pub use config::{EmberConfig, Overrides, Settings};

/// Logging to stderr. Default: WARN, or DEBUG with `verbose`; RUST_LOG overrides.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

/// Run a parsed command line.
pub async fn run_command(cli: Cli) -> Result<()> {
    let overrides = Overrides {
        authority: cli.authority,
        token: cli.token,
        organization: None,
        timeout_secs: cli.timeout,
    };
    let settings = Settings::resolve(overrides, EmberConfig::load());

    match cli.command {
        Command::Ssh(cmd) => commands::ssh::run(&settings, cmd).await,
        Command::Ca(cmd) => commands::ca::run(&settings, cmd).await,
    }
}
