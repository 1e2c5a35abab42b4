//! Mock Ratchet MCP server for integration testing.
//!
//! Reads newline-delimited JSON from stdin and writes newline-delimited JSON
//! responses to stdout. Accepts (and ignores) the real server's argument
//! vector, `-c <config> serve --transport stdio`.
//!
//! # Supported methods
//!
//! - `initialize`: returns Ratchet-style server info and capabilities
//! - `tools/list`: returns `ratchet.execute_task` and `ratchet.list_tasks`
//! - `tools/call`: `ratchet.list_tasks` lists tasks; `ratchet.execute_task`
//!   runs the `addition` task and returns the sum
//! - `notifications/*`: accepted, no response
//!
//! # Fault injection (environment variables)
//!
//! - `MOCK_RATCHET_NOISE=N`: emit N log lines (plain text plus one
//!   `notifications/message`) before every response
//! - `MOCK_RATCHET_SILENT=<method>`: never answer `<method>`
//! - `MOCK_RATCHET_CRASH_ON=<method>`: exit with code 42 on `<method>`
//! - `MOCK_RATCHET_TOKEN=<token>`: bearer token accepted in `headers`
//!   (default `test-claude-client-key-12345`)
//! - `MOCK_RATCHET_WRONG_ID=1`: answer every request with `id + 100`
//! - `MOCK_RATCHET_STRAY_BEFORE=<method>`: emit a response for id 999 just
//!   before the real answer to `<method>`
//! - `MOCK_RATCHET_IGNORE_TERM=1`: ignore SIGTERM (unix) and keep running
//!   after stdin closes, so only a kill ends the process

use serde_json::{Value, json};
use std::io::{BufRead, BufReader, Write};

struct Behavior {
    noise: usize,
    silent: Option<String>,
    crash_on: Option<String>,
    token: String,
    wrong_id: bool,
    stray_before: Option<String>,
}

impl Behavior {
    fn from_env() -> Self {
        Self {
            noise: std::env::var("MOCK_RATCHET_NOISE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            silent: std::env::var("MOCK_RATCHET_SILENT").ok(),
            crash_on: std::env::var("MOCK_RATCHET_CRASH_ON").ok(),
            token: std::env::var("MOCK_RATCHET_TOKEN")
                .unwrap_or_else(|_| "test-claude-client-key-12345".to_string()),
            wrong_id: std::env::var("MOCK_RATCHET_WRONG_ID").is_ok(),
            stray_before: std::env::var("MOCK_RATCHET_STRAY_BEFORE").ok(),
        }
    }
}

fn main() {
    #[cfg(unix)]
    if std::env::var("MOCK_RATCHET_IGNORE_TERM").is_ok() {
        // SAFETY: installing SIG_IGN for SIGTERM has no preconditions.
        unsafe {
            libc::signal(libc::SIGTERM, libc::SIG_IGN);
        }
    }

    let behavior = Behavior::from_env();
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let reader = BufReader::new(stdin.lock());
    let mut writer = stdout.lock();

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let msg: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        handle_message(&msg, &behavior, &mut writer);
    }

    if std::env::var("MOCK_RATCHET_IGNORE_TERM").is_ok() {
        loop {
            std::thread::sleep(std::time::Duration::from_secs(1));
        }
    }
}

fn handle_message(msg: &Value, behavior: &Behavior, writer: &mut impl Write) {
    let Some(method) = msg.get("method").and_then(|v| v.as_str()) else {
        return;
    };
    if method.starts_with("notifications/") {
        return;
    }
    if behavior.crash_on.as_deref() == Some(method) {
        std::process::exit(42);
    }
    if behavior.silent.as_deref() == Some(method) {
        return;
    }

    let id = msg.get("id").cloned().unwrap_or(Value::Null);
    let reply_id = match (&id, behavior.wrong_id) {
        (Value::Number(n), true) => json!(n.as_i64().unwrap_or(0) + 100),
        _ => id,
    };

    let outcome = match method {
        "initialize" => Ok(json!({
            "protocolVersion": msg
                .pointer("/params/protocolVersion")
                .cloned()
                .unwrap_or(json!("0.1.0")),
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": {}
            },
            "serverInfo": {
                "name": "Ratchet MCP Server",
                "version": "0.0.0-mock",
                "provider": "ratchet"
            }
        })),
        "tools/list" => Ok(json!({
            "tools": [
                {
                    "name": "ratchet.execute_task",
                    "description": "Execute a Ratchet task with given input",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "task_name": {"type": "string"},
                            "input": {"type": "object"}
                        },
                        "required": ["task_name", "input"]
                    }
                },
                {
                    "name": "ratchet.list_tasks",
                    "description": "List available tasks",
                    "inputSchema": {"type": "object", "properties": {}}
                }
            ]
        })),
        "tools/call" => call_tool(msg, behavior),
        other => Err(json!({
            "code": -32601,
            "message": format!("Method not found: {other}")
        })),
    };

    for i in 0..behavior.noise {
        let _ = writeln!(writer, "2024-01-01T00:00:0{}Z INFO ratchet_mcp::server: handling {method}", i % 10);
        if i == 0 {
            write_msg(
                writer,
                &json!({
                    "jsonrpc": "2.0",
                    "method": "notifications/message",
                    "params": {"level": "info", "data": format!("handling {method}")}
                }),
            );
        }
    }

    if behavior.stray_before.as_deref() == Some(method) {
        write_msg(writer, &json!({"jsonrpc": "2.0", "id": 999, "result": {}}));
    }

    let resp = match outcome {
        Ok(result) => json!({"jsonrpc": "2.0", "id": reply_id, "result": result}),
        Err(error) => json!({"jsonrpc": "2.0", "id": reply_id, "error": error}),
    };
    write_msg(writer, &resp);
}

fn call_tool(msg: &Value, behavior: &Behavior) -> Result<Value, Value> {
    if let Some(auth) = msg
        .pointer("/params/headers/Authorization")
        .and_then(|v| v.as_str())
    {
        if auth != format!("Bearer {}", behavior.token) {
            return Err(json!({"code": -32001, "message": "Unauthorized: invalid bearer token"}));
        }
    }

    let name = msg
        .pointer("/params/name")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let arguments = msg
        .pointer("/params/arguments")
        .cloned()
        .unwrap_or(json!({}));

    match name {
        "ratchet.list_tasks" => Ok(text_result(
            &json!({"tasks": [{"name": "addition", "version": "1.0.0"}]}).to_string(),
            false,
        )),
        "ratchet.execute_task" => {
            let task = arguments.get("task_name").and_then(|v| v.as_str()).unwrap_or("");
            if task != "addition" {
                return Ok(text_result(&format!("Task not found: {task}"), true));
            }
            let a = arguments.pointer("/input/a").and_then(|v| v.as_f64());
            let b = arguments.pointer("/input/b").and_then(|v| v.as_f64());
            match (a, b) {
                (Some(a), Some(b)) => Ok(text_result(
                    &json!({"task_name": "addition", "output": {"sum": a + b}}).to_string(),
                    false,
                )),
                _ => Ok(text_result("addition requires numeric inputs a and b", true)),
            }
        }
        other => Err(json!({"code": -32602, "message": format!("Unknown tool: {other}")})),
    }
}

fn text_result(text: &str, is_error: bool) -> Value {
    json!({
        "content": [{"type": "text", "text": text}],
        "isError": is_error
    })
}

fn write_msg(writer: &mut impl Write, msg: &Value) {
    let s = serde_json::to_string(msg).expect("serialize JSON");
    writeln!(writer, "{s}").expect("write to stdout");
    writer.flush().expect("flush stdout");
}
