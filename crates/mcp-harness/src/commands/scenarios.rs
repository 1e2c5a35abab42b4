//! `scenarios` subcommand: list the scripted steps.

use std::path::Path;
use std::process::ExitCode;

use crate::cli::ScenariosArgs;
use crate::config::resolve_config;
use crate::scenario::default_scenarios;

/// Run the `scenarios` subcommand.
///
/// # Errors
///
/// Returns an error if configuration resolution or serialization fails.
pub fn run(config_path: Option<&Path>, args: ScenariosArgs) -> anyhow::Result<ExitCode> {
    let config = resolve_config(config_path)?;
    for (i, scenario) in default_scenarios(&config.auth_token).iter().enumerate() {
        let required = if scenario.required { "required" } else { "optional" };
        println!(
            "{}. {:<22} {:<11} {} ({required})",
            i + 1,
            scenario.name,
            scenario.request.method,
            scenario.title
        );
        if args.verbose {
            println!("   {}", serde_json::to_string(&scenario.request)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}
