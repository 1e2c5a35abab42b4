//! Top-level run: readiness gate, spawn, scripted steps, shutdown.

use std::io::Write;

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::process::ServerTransport;
use crate::readiness::ReadinessProbe;
use crate::report::Reporter;
use crate::scenario::{RunReport, Scenario, ScenarioRunner};

/// Run `scenarios` against a freshly spawned server.
///
/// The readiness probe is consulted first; if it fails nothing is spawned.
/// Once the server is running, every scenario is attempted and the server is
/// always shut down and reaped afterwards, whatever the step outcomes. The
/// reaped exit status is stored in [`RunReport::exit_status`].
///
/// # Errors
///
/// - [`HarnessError::ReadinessUnavailable`] if the probe reports not ready
/// - [`HarnessError::Spawn`] if the server cannot be started
/// - [`HarnessError::Shutdown`] if the server cannot be stopped or reaped
pub async fn run_harness<O: Write>(
    config: &HarnessConfig,
    probe: &dyn ReadinessProbe,
    transport: &dyn ServerTransport,
    scenarios: &[Scenario],
    reporter: &mut Reporter<O>,
) -> Result<RunReport, HarnessError> {
    let target = probe.target();
    if !probe.is_ready().await {
        reporter.not_ready(&target);
        return Err(HarnessError::ReadinessUnavailable { target });
    }
    reporter.ready(&target);

    let mut server = transport.spawn().await?;
    tracing::info!(pid = ?server.pid(), "server process started");
    reporter.server_started(server.pid());

    if !config.startup_delay().is_zero() {
        tokio::time::sleep(config.startup_delay()).await;
    }
    if let Some(status) = server.try_exit_status() {
        tracing::warn!(%status, "server exited during startup");
    }

    let runner = ScenarioRunner::new(config.request_timeout());
    let mut report = runner
        .run(server.channel(), scenarios, |index, step| {
            reporter.step(index, step);
        })
        .await;
    reporter.completed(&report);

    let status = server.shutdown(config.shutdown_grace()).await?;
    report.exit_status = Some(status);
    reporter.server_stopped(report.exit_status);

    Ok(report)
}
