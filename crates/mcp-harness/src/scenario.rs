//! Scripted scenario table and the sequential runner that executes it.
//!
//! A [`Scenario`] pairs a prepared [`Request`] with an [`Expectation`] about
//! the response. [`ScenarioRunner::run`] executes scenarios strictly one at a
//! time over a [`Channel`]; a failed step is recorded and the next step is
//! still attempted.

use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::channel::Channel;
use crate::error::ExchangeError;
use crate::message::{
    ClientInfo, DEFAULT_PROTOCOL_VERSION, Notification, Request, Response, bearer_headers,
};

/// What a step's response must look like to count as passed.
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    /// Any correlated response, success or JSON-RPC error.
    AnyResponse,
    /// A `result` response.
    Success,
    /// A `result` object containing each of the listed top-level fields.
    ResultHasFields(Vec<&'static str>),
    /// A `tools/call` result, not flagged `isError`, whose text content is
    /// JSON holding `expected` at the JSON pointer. Numbers compare by value,
    /// so `30` matches `30.0`.
    ToolOutputEquals {
        pointer: &'static str,
        expected: Value,
    },
}

impl Expectation {
    /// Check `response`, returning the reason on mismatch.
    ///
    /// # Errors
    ///
    /// Returns a description of the first unmet condition.
    pub fn check(&self, response: &Response) -> Result<(), String> {
        if matches!(self, Self::AnyResponse) {
            return Ok(());
        }
        let result = match (response.result(), response.error()) {
            (Some(result), _) => result,
            (None, Some(err)) => {
                return Err(format!("error response {}: {}", err.code, err.message));
            }
            (None, None) => return Err("response has neither result nor error".to_string()),
        };

        match self {
            Self::AnyResponse | Self::Success => Ok(()),
            Self::ResultHasFields(fields) => {
                let missing: Vec<&str> = fields
                    .iter()
                    .copied()
                    .filter(|f| result.get(*f).is_none())
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(format!("result is missing fields: {}", missing.join(", ")))
                }
            }
            Self::ToolOutputEquals { pointer, expected } => {
                if response.is_tool_error() {
                    return Err(format!(
                        "tool reported an error: {}",
                        response.text_content().unwrap_or_default()
                    ));
                }
                let text = response
                    .text_content()
                    .ok_or_else(|| "result has no content".to_string())?;
                let output: Value = serde_json::from_str(&text)
                    .map_err(|_| format!("tool output is not JSON: {text}"))?;
                let actual = output
                    .pointer(pointer)
                    .ok_or_else(|| format!("tool output has no {pointer}"))?;
                if same_value(actual, expected) {
                    Ok(())
                } else {
                    Err(format!("tool output {pointer} is {actual}, expected {expected}"))
                }
            }
        }
    }
}

fn same_value(actual: &Value, expected: &Value) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => actual == expected,
    }
}

/// One scripted step.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Stable identifier used by `--only`.
    pub name: &'static str,
    /// Heading printed before the step runs.
    pub title: &'static str,
    pub request: Request,
    pub expectation: Expectation,
    /// Whether a failure of this step fails a strict run.
    pub required: bool,
}

/// Tool name for task execution on the Ratchet MCP server.
pub const EXECUTE_TASK_TOOL: &str = "ratchet.execute_task";

/// Tool name for listing tasks on the Ratchet MCP server.
pub const LIST_TASKS_TOOL: &str = "ratchet.list_tasks";

/// Where the `addition` task reports its result in the tool's JSON text.
pub const ADDITION_SUM_POINTER: &str = "/output/sum";

fn addition_arguments(a: i64, b: i64) -> Value {
    json!({
        "task_name": "addition",
        "input": { "a": a, "b": b }
    })
}

/// The standard five-step run against a Ratchet MCP server.
pub fn default_scenarios(auth_token: &str) -> Vec<Scenario> {
    vec![
        Scenario {
            name: "initialize",
            title: "Testing MCP Initialize",
            request: Request::initialize(1, &ClientInfo::default(), DEFAULT_PROTOCOL_VERSION),
            expectation: Expectation::ResultHasFields(vec!["serverInfo", "capabilities"]),
            required: true,
        },
        Scenario {
            name: "tools_list",
            title: "Testing List Tools",
            request: Request::tools_list(2),
            expectation: Expectation::ResultHasFields(vec!["tools"]),
            required: true,
        },
        Scenario {
            name: "list_tasks",
            title: "Testing List Tasks",
            request: Request::tools_call(3, LIST_TASKS_TOOL, json!({}), None),
            expectation: Expectation::Success,
            required: false,
        },
        Scenario {
            name: "execute_task",
            title: "Testing Execute Addition Task",
            request: Request::tools_call(4, EXECUTE_TASK_TOOL, addition_arguments(10, 20), None),
            expectation: Expectation::ToolOutputEquals {
                pointer: ADDITION_SUM_POINTER,
                expected: json!(30),
            },
            required: true,
        },
        Scenario {
            name: "authenticated_execute",
            title: "Testing with Authentication",
            request: Request::tools_call(
                5,
                EXECUTE_TASK_TOOL,
                addition_arguments(5, 7),
                Some(&bearer_headers(auth_token)),
            ),
            expectation: Expectation::ToolOutputEquals {
                pointer: ADDITION_SUM_POINTER,
                expected: json!(12),
            },
            required: true,
        },
    ]
}

/// Keep only scenarios whose name is in `only`; an empty filter keeps all.
pub fn select(scenarios: Vec<Scenario>, only: &[String]) -> Vec<Scenario> {
    if only.is_empty() {
        return scenarios;
    }
    scenarios
        .into_iter()
        .filter(|s| only.iter().any(|o| o == s.name))
        .collect()
}

/// Result of one step.
#[derive(Debug)]
pub enum StepOutcome {
    Passed(Response),
    /// A response arrived but did not meet the expectation.
    Unexpected { response: Response, reason: String },
    /// No usable response: timeout, closed stream, write failure, ...
    Failed(ExchangeError),
}

impl StepOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed(_))
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Passed(r) | Self::Unexpected { response: r, .. } => Some(r),
            Self::Failed(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct StepReport {
    pub name: &'static str,
    pub title: &'static str,
    pub method: String,
    pub required: bool,
    pub outcome: StepOutcome,
    pub elapsed: Duration,
}

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
    /// Server exit status, filled in once the process has been reaped.
    pub exit_status: Option<std::process::ExitStatus>,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_passed()).count()
    }

    pub fn total(&self) -> usize {
        self.steps.len()
    }

    pub fn required_failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|s| s.required && !s.outcome.is_passed())
    }

    /// Process exit code: always 0 unless `strict`, then 1 when a required step failed.
    pub fn exit_code(&self, strict: bool) -> u8 {
        if strict && self.required_failures().next().is_some() {
            1
        } else {
            0
        }
    }
}

/// Runs scenarios sequentially over a channel.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    timeout: Duration,
}

impl ScenarioRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Execute every scenario in order, calling `on_step` after each one.
    ///
    /// Never stops early: each step is attempted regardless of earlier failures.
    pub async fn run<W, R>(
        &self,
        channel: &mut Channel<W, R>,
        scenarios: &[Scenario],
        mut on_step: impl FnMut(usize, &StepReport),
    ) -> RunReport
    where
        W: AsyncWrite + Unpin,
        R: AsyncRead + Unpin,
    {
        let mut report = RunReport::default();

        for (index, scenario) in scenarios.iter().enumerate() {
            let started = Instant::now();
            let outcome = match channel.exchange(&scenario.request, self.timeout).await {
                Ok(response) => match scenario.expectation.check(&response) {
                    Ok(()) => StepOutcome::Passed(response),
                    Err(reason) => {
                        tracing::warn!(step = scenario.name, %reason, "unexpected response");
                        StepOutcome::Unexpected { response, reason }
                    }
                },
                Err(e) => {
                    tracing::warn!(step = scenario.name, error = %e, "step failed");
                    StepOutcome::Failed(e)
                }
            };

            if scenario.request.method == "initialize"
                && outcome.response().is_some_and(Response::is_success)
            {
                if let Err(e) = channel.notify(&Notification::initialized()).await {
                    tracing::warn!(error = %e, "failed to send notifications/initialized");
                }
            }

            let step = StepReport {
                name: scenario.name,
                title: scenario.title,
                method: scenario.request.method.clone(),
                required: scenario.required,
                outcome,
                elapsed: started.elapsed(),
            };
            on_step(index, &step);
            report.steps.push(step);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[test]
    fn default_table_runs_five_steps_in_order() {
        let scenarios = default_scenarios("tok");
        let names: Vec<&str> = scenarios.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["initialize", "tools_list", "list_tasks", "execute_task", "authenticated_execute"]
        );
        let ids: Vec<Value> = scenarios.iter().map(|s| s.request.id.clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);

        let exec = &scenarios[3].request;
        assert_eq!(exec.params["name"], "ratchet.execute_task");
        assert_eq!(exec.params["arguments"]["input"], json!({"a": 10, "b": 20}));

        let auth = &scenarios[4].request;
        assert_eq!(auth.params["headers"]["Authorization"], "Bearer tok");
    }

    #[test]
    fn select_filters_by_name() {
        let only = vec!["tools_list".to_string(), "execute_task".to_string()];
        let picked = select(default_scenarios("t"), &only);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].name, "tools_list");
        assert_eq!(select(default_scenarios("t"), &[]).len(), 5);
    }

    #[test]
    fn expectation_result_fields() {
        let resp = Response::success(1, json!({"serverInfo": {}, "capabilities": {}}));
        assert!(Expectation::ResultHasFields(vec!["serverInfo", "capabilities"]).check(&resp).is_ok());

        let err = Expectation::ResultHasFields(vec!["serverInfo", "tools"]).check(&resp).unwrap_err();
        assert!(err.contains("tools"));
    }

    #[test]
    fn expectation_rejects_error_response() {
        let resp = Response::failure(
            1,
            crate::message::RpcError {
                code: -32001,
                message: "Unauthorized".to_string(),
                data: None,
            },
        );
        assert!(Expectation::AnyResponse.check(&resp).is_ok());
        let reason = Expectation::Success.check(&resp).unwrap_err();
        assert!(reason.contains("Unauthorized"));
    }

    fn tool_output(text: &str, is_error: bool) -> Response {
        Response::success(
            4,
            json!({"content": [{"type": "text", "text": text}], "isError": is_error}),
        )
    }

    #[test]
    fn expectation_tool_output_compares_sum() {
        let sum_30 = Expectation::ToolOutputEquals {
            pointer: ADDITION_SUM_POINTER,
            expected: json!(30),
        };
        let ok = tool_output(r#"{"task_name":"addition","output":{"sum":30.0}}"#, false);
        assert!(sum_30.check(&ok).is_ok());

        let wrong = tool_output(r#"{"task_name":"addition","output":{"sum":300}}"#, false);
        let reason = sum_30.check(&wrong).unwrap_err();
        assert!(reason.contains("300"), "{reason}");
    }

    #[test]
    fn expectation_tool_output_is_not_a_substring_match() {
        let sum_30 = Expectation::ToolOutputEquals {
            pointer: ADDITION_SUM_POINTER,
            expected: json!(30),
        };
        let prose = tool_output("finished in 130ms at 2024-01-01T00:30:00Z", false);
        assert!(sum_30.check(&prose).unwrap_err().contains("not JSON"));

        let elsewhere = tool_output(r#"{"id":30,"output":{"total":30}}"#, false);
        assert!(sum_30.check(&elsewhere).unwrap_err().contains("/output/sum"));

        let tool_err = tool_output(r#"{"output":{"sum":30}}"#, true);
        assert!(sum_30.check(&tool_err).unwrap_err().contains("tool reported an error"));
    }

    #[test]
    fn exit_code_only_strict_and_required() {
        let mut report = RunReport::default();
        report.steps.push(StepReport {
            name: "list_tasks",
            title: "",
            method: "tools/call".into(),
            required: false,
            outcome: StepOutcome::Failed(ExchangeError::StreamClosed),
            elapsed: Duration::ZERO,
        });
        assert_eq!(report.exit_code(true), 0);

        report.steps.push(StepReport {
            name: "initialize",
            title: "",
            method: "initialize".into(),
            required: true,
            outcome: StepOutcome::Failed(ExchangeError::Timeout {
                timeout: Duration::from_secs(5),
            }),
            elapsed: Duration::ZERO,
        });
        assert_eq!(report.exit_code(false), 0);
        assert_eq!(report.exit_code(true), 1);
    }

    /// Minimal in-process server: answers `initialize` and `tools/list`,
    /// ignores everything else, and records every line it receives.
    async fn scripted_server(
        reader: tokio::io::DuplexStream,
        mut writer: tokio::io::DuplexStream,
    ) -> Vec<String> {
        let mut seen = Vec::new();
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let msg: Value = serde_json::from_str(&line).unwrap();
            seen.push(msg["method"].as_str().unwrap_or_default().to_string());
            let reply = match msg["method"].as_str() {
                Some("initialize") => Some(json!({
                    "jsonrpc": "2.0", "id": msg["id"],
                    "result": {"serverInfo": {"name": "Ratchet MCP Server"}, "capabilities": {"tools": {}}}
                })),
                Some("tools/list") => Some(json!({
                    "jsonrpc": "2.0", "id": msg["id"], "result": {"tools": []}
                })),
                _ => None,
            };
            if let Some(reply) = reply {
                let mut out = serde_json::to_string(&reply).unwrap();
                out.push('\n');
                writer.write_all(out.as_bytes()).await.unwrap();
            }
        }
        seen
    }

    #[tokio::test]
    async fn runner_continues_after_timeouts() {
        let (harness_w, server_r) = tokio::io::duplex(8192);
        let (server_w, harness_r) = tokio::io::duplex(8192);
        let server = tokio::spawn(scripted_server(server_r, server_w));

        let mut channel = Channel::new(harness_w, harness_r);
        let runner = ScenarioRunner::new(Duration::from_millis(150));
        let scenarios = default_scenarios("tok");

        let mut seen_steps = Vec::new();
        let report = runner
            .run(&mut channel, &scenarios, |i, step| seen_steps.push((i, step.name)))
            .await;

        assert_eq!(report.total(), 5);
        assert_eq!(report.passed(), 2);
        assert!(report.steps[0].outcome.is_passed());
        assert!(report.steps[1].outcome.is_passed());
        for step in &report.steps[2..] {
            assert!(
                matches!(step.outcome, StepOutcome::Failed(ExchangeError::Timeout { .. })),
                "{} should time out",
                step.name
            );
        }
        assert_eq!(seen_steps.len(), 5);
        assert_eq!(seen_steps[4], (4, "authenticated_execute"));

        drop(channel);
        let methods = server.await.unwrap();
        assert_eq!(methods[0], "initialize");
        assert_eq!(methods[1], "notifications/initialized");
        assert_eq!(methods[2], "tools/list");
        assert_eq!(methods.len(), 6);
    }
}
