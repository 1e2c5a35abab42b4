//! mcp-harness: stdio JSON-RPC test harness for the Ratchet MCP server.
//!
//! # Subcommands
//!
//! - `run`: Probe readiness, spawn the server, run the scripted steps
//! - `scenarios`: List the scripted steps
//! - `config`: Show resolved configuration

use std::process::ExitCode;

use clap::Parser;

use mcp_harness::cli::{Cli, Commands};
use mcp_harness::{commands, logging};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::run(cli.config.as_deref(), args).await,
        Commands::Scenarios(args) => commands::scenarios::run(cli.config.as_deref(), args),
        Commands::Config(args) => commands::config_cmd::run(cli.config.as_deref(), args),
    }
}
