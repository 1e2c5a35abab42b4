//! Command implementations for mcp-harness subcommands.
//!
//! Each module corresponds to a top-level subcommand exposed by the CLI.

pub mod config_cmd;
pub mod run;
pub mod scenarios;
