//! `config` subcommand: show resolved configuration.

use std::path::Path;
use std::process::ExitCode;

use crate::cli::ConfigArgs;
use crate::config::resolve_config;

/// Run the `config` subcommand.
///
/// # Errors
///
/// Returns an error if configuration resolution or serialization fails.
pub fn run(config_path: Option<&Path>, args: ConfigArgs) -> anyhow::Result<ExitCode> {
    let config = resolve_config(config_path)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!("{}", toml::to_string_pretty(&config)?);
        println!("# health check: {}", config.health_url());
    }
    Ok(ExitCode::SUCCESS)
}
