// ABOUTME: CLI command definitions using clap
// ABOUTME: Global authority flags plus ssh and ca subcommands

use clap::{Parser, Subcommand};
use std::net::SocketAddr;

pub mod ca;
pub mod ssh;

#[derive(Parser, Debug)]
#[command(name = "ember", about = "Single-use SSH credentials", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Certificate authority gRPC address (e.g., http://127.0.0.1:50061)
    #[arg(long, global = true, env = "EMBER_AUTHORITY")]
    pub authority: Option<String>,

    /// Bearer token for the certificate authority
    #[arg(long, global = true, env = "EMBER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Seconds to wait for the certificate authority
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Issue and manage single-use SSH credentials
    #[command(subcommand)]
    Ssh(SshCommand),

    /// Run a local certificate authority
    #[command(subcommand)]
    Ca(CaCommand),
}

#[derive(Subcommand, Debug)]
pub enum SshCommand {
    /// Issue a single-use credential and print it as JSON
    Issue {
        /// Organization whose authority signs the key
        #[arg(long, env = "EMBER_ORG")]
        org: Option<String>,

        /// Host the credential is meant for
        #[arg(long)]
        host: Option<String>,

        /// SSH port on the host
        #[arg(long, default_value_t = 22)]
        port: u16,

        /// Remote user
        #[arg(long, default_value = "root")]
        user: String,

        /// Comment stored in the private key
        #[arg(long)]
        comment: Option<String>,
    },

    /// Create the organization's SSH certificate authority
    Establish {
        /// Organization to establish an authority for
        #[arg(long, env = "EMBER_ORG")]
        org: Option<String>,

        /// Replace an existing authority key
        #[arg(long)]
        replace: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum CaCommand {
    /// Serve an in-memory certificate authority over gRPC
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:50061")]
        listen: SocketAddr,

        /// Longest certificate lifetime the authority will sign, in hours
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        max_valid_hours: u32,
    },
}
