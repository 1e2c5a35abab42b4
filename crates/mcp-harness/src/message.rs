//! JSON-RPC 2.0 message types exchanged with the Ratchet MCP server.
//!
//! Requests are built with the constructors on [`Request`]; every line read
//! back from the server is classified with [`IncomingMessage::parse_line`],
//! which separates correlated [`Response`]s from server notifications and
//! other JSON that is not an answer to anything.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// JSON-RPC protocol version tag carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol version the harness announces during `initialize`.
pub const DEFAULT_PROTOCOL_VERSION: &str = "0.1.0";

/// Header carrying the bearer token in authenticated `tools/call` requests.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Client descriptor sent in `initialize` params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "test-client".to_string(),
            version: "1.0.0".to_string(),
        }
    }
}

/// A request that expects exactly one response with the same `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    /// Build a request with an arbitrary method and params payload.
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// `initialize` handshake announcing protocol version, client, and (empty) capabilities.
    pub fn initialize(id: impl Into<Value>, client: &ClientInfo, protocol_version: &str) -> Self {
        Self::new(
            id,
            "initialize",
            json!({
                "protocolVersion": protocol_version,
                "clientInfo": client,
                "capabilities": {}
            }),
        )
    }

    /// `tools/list` capability discovery.
    pub fn tools_list(id: impl Into<Value>) -> Self {
        Self::new(id, "tools/list", json!({}))
    }

    /// `tools/call` invoking `name` with `arguments`.
    ///
    /// When `headers` is given it is carried inside params as a `headers` map;
    /// this is how the authenticated variant passes its bearer token.
    pub fn tools_call(
        id: impl Into<Value>,
        name: &str,
        arguments: Value,
        headers: Option<&BTreeMap<String, String>>,
    ) -> Self {
        let mut params = Map::new();
        params.insert("name".to_string(), Value::String(name.to_string()));
        params.insert("arguments".to_string(), arguments);
        if let Some(headers) = headers {
            params.insert("headers".to_string(), json!(headers));
        }
        Self::new(id, "tools/call", Value::Object(params))
    }

    /// Integer form of the id, if it has one.
    pub fn numeric_id(&self) -> Option<i64> {
        self.id.as_i64()
    }
}

/// Header map carrying `Authorization: Bearer <token>`.
pub fn bearer_headers(token: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert(AUTHORIZATION_HEADER.to_string(), format!("Bearer {token}"));
    headers
}

/// A one-way message; the server never answers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }

    /// `notifications/initialized`, sent once the handshake succeeded.
    pub fn initialized() -> Self {
        Self::new("notifications/initialized", Value::Null)
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Either the `result` or the `error` member of a response; never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseOutcome {
    Result(Value),
    Error(RpcError),
}

/// A response correlated to a request by `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(flatten)]
    pub outcome: ResponseOutcome,
}

impl Response {
    pub fn success(id: impl Into<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            outcome: ResponseOutcome::Result(result),
        }
    }

    pub fn failure(id: impl Into<Value>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            outcome: ResponseOutcome::Error(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ResponseOutcome::Result(_))
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            ResponseOutcome::Result(v) => Some(v),
            ResponseOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RpcError> {
        match &self.outcome {
            ResponseOutcome::Result(_) => None,
            ResponseOutcome::Error(e) => Some(e),
        }
    }

    /// `true` when a `tools/call` result reports `isError: true`.
    pub fn is_tool_error(&self) -> bool {
        self.result()
            .and_then(|r| r.get("isError"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Concatenated text of all `{"type":"text"}` entries in `result.content`.
    ///
    /// Returns `None` when the result has no content array.
    pub fn text_content(&self) -> Option<String> {
        let content = self.result()?.get("content")?.as_array()?;
        let text = content
            .iter()
            .filter(|c| c.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|c| c.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");
        Some(text)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Classification of one parsed line from the server's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    /// Has an `id` and exactly one of `result` / `error`.
    Response(Response),
    /// Has a `method`: a notification (`id` absent) or a server-initiated request.
    Inbound { method: String, id: Option<Value> },
    /// Valid JSON that is neither of the above.
    Other(Value),
}

impl IncomingMessage {
    /// Parse a framed line.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the line is not JSON at all.
    pub fn parse_line(line: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(line)?;
        Ok(Self::classify(value))
    }

    /// Classify an already parsed value by member presence.
    pub fn classify(value: Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::Other(value);
        };

        if let Some(method) = obj.get("method").and_then(Value::as_str) {
            return Self::Inbound {
                method: method.to_string(),
                id: obj.get("id").cloned(),
            };
        }

        let Some(id) = obj.get("id").cloned() else {
            return Self::Other(value);
        };
        let jsonrpc = obj
            .get("jsonrpc")
            .and_then(Value::as_str)
            .unwrap_or(JSONRPC_VERSION)
            .to_string();

        let outcome = match (obj.get("result"), obj.get("error")) {
            (Some(result), None) => ResponseOutcome::Result(result.clone()),
            (None, Some(error)) => match serde_json::from_value::<RpcError>(error.clone()) {
                Ok(e) => ResponseOutcome::Error(e),
                Err(_) => return Self::Other(value),
            },
            _ => return Self::Other(value),
        };

        Self::Response(Response {
            jsonrpc,
            id,
            outcome,
        })
    }
}
