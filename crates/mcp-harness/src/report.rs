//! Human-readable run output.
//!
//! Writing is best-effort: a broken stdout must not stop the harness from
//! reaching server shutdown, so write errors are logged and dropped.

use std::io::Write;
use std::process::ExitStatus;

use crate::scenario::{RunReport, StepOutcome, StepReport};

pub struct Reporter<W: Write> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn ready(&mut self, target: &str) {
        self.emit(format_args!("✓ Ratchet server is healthy ({target})\n"));
    }

    pub fn not_ready(&mut self, target: &str) {
        self.emit(format_args!(
            "ERROR: Ratchet server is not running at {target}. Please start it first.\n"
        ));
    }

    pub fn server_started(&mut self, pid: Option<u32>) {
        match pid {
            Some(pid) => self.emit(format_args!("✓ MCP server started (pid {pid})\n")),
            None => self.emit(format_args!("✓ MCP server started\n")),
        }
    }

    /// Print one finished step.
    pub fn step(&mut self, index: usize, step: &StepReport) {
        self.emit(format_args!("\n{}. {}\n", index + 1, step.title));
        match &step.outcome {
            StepOutcome::Passed(response) => {
                self.emit(format_args!(
                    "✓ {} response: {}\n",
                    step.name,
                    pretty(&response.to_value())
                ));
            }
            StepOutcome::Unexpected { response, reason } => {
                self.emit(format_args!(
                    "✗ Unexpected {} response ({reason}): {}\n",
                    step.name,
                    pretty(&response.to_value())
                ));
            }
            StepOutcome::Failed(err) => {
                self.emit(format_args!(
                    "✗ No response received for {} ({}: {err})\n",
                    step.name,
                    err.label()
                ));
            }
        }
    }

    /// Final status line for the scripted sequence.
    pub fn completed(&mut self, report: &RunReport) {
        let marker = if report.passed() == report.total() {
            "✅"
        } else {
            "⚠️"
        };
        self.emit(format_args!(
            "\n{marker} MCP server tests completed: {}/{} steps passed\n",
            report.passed(),
            report.total()
        ));
    }

    pub fn server_stopped(&mut self, status: Option<ExitStatus>) {
        match status {
            Some(status) => self.emit(format_args!("\n✓ MCP server stopped ({status})\n")),
            None => self.emit(format_args!("\n✓ MCP server stopped\n")),
        }
    }

    pub fn error(&mut self, message: &str) {
        self.emit(format_args!("Error during testing: {message}\n"));
    }

    fn emit(&mut self, args: std::fmt::Arguments<'_>) {
        if let Err(e) = self.out.write_fmt(args).and_then(|()| self.out.flush()) {
            tracing::warn!("failed to write report output: {e}");
        }
    }
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
