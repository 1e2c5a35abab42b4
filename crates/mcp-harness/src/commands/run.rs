//! `run` subcommand: probe readiness, spawn the server, run the scripted steps.
//!
//! See [`crate::harness::run_harness`] for the run sequence and
//! [`crate::channel`] for exchange semantics.

use std::path::Path;
use std::process::ExitCode;

use crate::cli::RunArgs;
use crate::config::{HarnessConfig, resolve_config};
use crate::error::HarnessError;
use crate::harness::run_harness;
use crate::process::StdioServer;
use crate::readiness::{AlwaysReady, HttpReadiness, ReadinessProbe};
use crate::report::Reporter;
use crate::scenario::{default_scenarios, select};

/// Exit code when the readiness gate aborts the run.
pub const EXIT_NOT_READY: u8 = 2;

/// Run the `run` subcommand.
///
/// Step failures never make this return an error; they are reported and
/// reflected in the exit code only when `--strict` is in effect.
///
/// # Errors
///
/// Returns an error if configuration resolution fails, no scenario matches
/// `--only`, or the server cannot be spawned or stopped.
pub async fn run(config_path: Option<&Path>, args: RunArgs) -> anyhow::Result<ExitCode> {
    let mut config = resolve_config(config_path)?;
    apply_overrides(&mut config, &args);

    let scenarios = select(default_scenarios(&config.auth_token), &args.only);
    if scenarios.is_empty() {
        anyhow::bail!("no scenarios match --only {:?}", args.only);
    }

    let probe: Box<dyn ReadinessProbe> = if args.skip_health_check {
        Box::new(AlwaysReady)
    } else {
        Box::new(HttpReadiness::from_config(&config))
    };
    let transport = StdioServer::from_config(&config);
    let mut reporter = Reporter::new(std::io::stdout());

    match run_harness(&config, probe.as_ref(), &transport, &scenarios, &mut reporter).await {
        Ok(report) => {
            for step in report.required_failures() {
                tracing::info!(step = step.name, "required step did not pass");
            }
            Ok(ExitCode::from(report.exit_code(config.strict)))
        }
        Err(HarnessError::ReadinessUnavailable { target }) => {
            tracing::error!(%target, "readiness check failed; server not spawned");
            Ok(ExitCode::from(EXIT_NOT_READY))
        }
        Err(e) => {
            reporter.error(&e.to_string());
            Err(e.into())
        }
    }
}

/// Apply CLI flag overrides on top of the resolved configuration.
pub fn apply_overrides(config: &mut HarnessConfig, args: &RunArgs) {
    if let Some(ref bin) = args.server_bin {
        config.server_bin = bin.clone();
    }
    if let Some(ref server_config) = args.server_config {
        config.server_config = server_config.clone();
    }
    if let Some(ref base_url) = args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(ms) = args.timeout_ms {
        config.request_timeout_ms = ms;
    }
    if let Some(ref token) = args.token {
        config.auth_token = token.clone();
    }
    if args.strict {
        config.strict = true;
    }
}
