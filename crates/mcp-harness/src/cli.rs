//! CLI argument types for mcp-harness.
//!
//! Defines the top-level [`Cli`] struct and all subcommand [`Args`] using
//! clap's derive macros. Each subcommand maps to a module in [`crate::commands`].

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Stdio JSON-RPC test harness for the Ratchet MCP server
#[derive(Parser, Debug)]
#[command(name = "mcp-harness", version, about)]
pub struct Cli {
    /// Path to harness config file (default: .mcp-harness.toml, then ~/.config/mcp-harness/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Spawn the MCP server and run the scripted exchange
    Run(RunArgs),
    /// List the scripted steps
    Scenarios(ScenariosArgs),
    /// Show resolved configuration
    Config(ConfigArgs),
}

/// Arguments for the `run` subcommand
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// MCP server binary override
    #[arg(long)]
    pub server_bin: Option<String>,

    /// Server config file override (passed with `-c`)
    #[arg(long)]
    pub server_config: Option<String>,

    /// Base URL of the Ratchet service for the health check
    #[arg(long)]
    pub base_url: Option<String>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Bearer token for the authenticated step
    #[arg(long)]
    pub token: Option<String>,

    /// Skip the HTTP readiness probe
    #[arg(long)]
    pub skip_health_check: bool,

    /// Exit non-zero if a required step fails
    #[arg(long)]
    pub strict: bool,

    /// Run only the named steps (repeatable)
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,
}

/// Arguments for the `scenarios` subcommand
#[derive(Args, Debug)]
pub struct ScenariosArgs {
    /// Print full request bodies
    #[arg(long)]
    pub verbose: bool,
}

/// Arguments for the `config` subcommand
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
