//! Request/response channel over a server's stdin/stdout.
//!
//! [`Channel`] owns the write half (server stdin) and the read half (server
//! stdout) exclusively. Exchanges are strictly sequential: one request is
//! written, then lines are read until the response carrying the same `id`
//! arrives, the deadline passes, or the stream closes.
//!
//! Lines that are not JSON, oversized lines, and JSON that is not a response
//! (log notifications, server-initiated requests), are skipped. When an
//! exchange gives up on a request that was written (timeout, noise cap, or a
//! foreign id), that request's id is abandoned: its reply may still arrive
//! and is discarded as stale. A response for any other id is reported as
//! [`ExchangeError::ProtocolViolation`].

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use crate::error::ExchangeError;
use crate::framing::{Line, LineReader, write_newline_delimited};
use crate::message::{IncomingMessage, Notification, Request, Response};

/// Upper bound on remembered ids of timed-out requests.
const MAX_ABANDONED_IDS: usize = 64;

/// Sequential JSON-RPC channel over a pair of byte streams.
pub struct Channel<W, R> {
    writer: W,
    reader: LineReader<R>,
    next_id: i64,
    /// Ids of requests whose exchange timed out; their late responses are stale.
    abandoned: Vec<Value>,
    max_noise_lines: Option<usize>,
}

impl<W, R> std::fmt::Debug for Channel<W, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("next_id", &self.next_id)
            .field("abandoned", &self.abandoned)
            .field("max_noise_lines", &self.max_noise_lines)
            .finish_non_exhaustive()
    }
}

impl<W, R> Channel<W, R>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    pub fn new(writer: W, reader: R) -> Self {
        Self {
            writer,
            reader: LineReader::new(reader),
            next_id: 1,
            abandoned: Vec::new(),
            max_noise_lines: None,
        }
    }

    /// Cap the length of a single line; longer lines are skipped as noise.
    pub fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.reader = self.reader.with_max_line_bytes(max);
        self
    }

    /// Cap the number of skipped lines per exchange. `None` skips without limit.
    pub fn with_noise_limit(mut self, limit: Option<usize>) -> Self {
        self.max_noise_lines = limit;
        self
    }

    /// Allocate the next request id.
    pub fn next_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Send `method` with a freshly allocated id and await its response.
    ///
    /// # Errors
    ///
    /// See [`Channel::exchange`].
    pub async fn call(
        &mut self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Response, ExchangeError> {
        let request = Request::new(self.next_id(), method, params);
        self.exchange(&request, timeout).await
    }

    /// Write `request` and wait up to `timeout` for the response with its id.
    ///
    /// The deadline starts once the request has been flushed. Both successful
    /// and JSON-RPC error responses are returned as `Ok`.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::WriteFailed`] if the request cannot be written
    /// - [`ExchangeError::Timeout`] if no response arrives before the deadline
    /// - [`ExchangeError::StreamClosed`] if the server's output reaches EOF
    /// - [`ExchangeError::ProtocolViolation`] on a response for an unexpected id
    /// - [`ExchangeError::NoisyStream`] if the noise cap is exceeded
    pub async fn exchange(
        &mut self,
        request: &Request,
        timeout: Duration,
    ) -> Result<Response, ExchangeError> {
        if let Some(id) = request.numeric_id() {
            if id >= self.next_id {
                self.next_id = id + 1;
            }
        }

        let serialized = serde_json::to_string(request)?;
        tracing::debug!(direction = "harness->server", id = %request.id, method = %request.method, "sending request");
        write_newline_delimited(&mut self.writer, &serialized)
            .await
            .map_err(ExchangeError::WriteFailed)?;

        let deadline = Instant::now() + timeout;
        let result = self.await_response(&request.id, deadline, timeout).await;
        if let Err(
            ExchangeError::Timeout { .. }
            | ExchangeError::NoisyStream { .. }
            | ExchangeError::ProtocolViolation { .. },
        ) = &result
        {
            self.abandon(request.id.clone());
        }
        result
    }

    /// Write a notification; nothing is awaited.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::WriteFailed`] if the write fails.
    pub async fn notify(&mut self, notification: &Notification) -> Result<(), ExchangeError> {
        let serialized = serde_json::to_string(notification)?;
        tracing::debug!(direction = "harness->server", method = %notification.method, "sending notification");
        write_newline_delimited(&mut self.writer, &serialized)
            .await
            .map_err(ExchangeError::WriteFailed)
    }

    /// Release both stream halves. Dropping the writer signals EOF to the server.
    pub fn into_parts(self) -> (W, R) {
        (self.writer, self.reader.into_inner())
    }

    async fn await_response(
        &mut self,
        expected: &Value,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<Response, ExchangeError> {
        let mut skipped = 0usize;

        loop {
            let line = match tokio::time::timeout_at(deadline, self.reader.next_line()).await {
                Err(_elapsed) => {
                    tracing::warn!(id = %expected, skipped, "no response within {}ms", timeout.as_millis());
                    return Err(ExchangeError::Timeout { timeout });
                }
                Ok(Err(e)) => return Err(ExchangeError::Read(e)),
                Ok(Ok(None)) => {
                    tracing::warn!(id = %expected, "server output closed while awaiting response");
                    return Err(ExchangeError::StreamClosed);
                }
                Ok(Ok(Some(line))) => line,
            };

            if let Some(response) = self.inspect(line, expected)? {
                return Ok(response);
            }

            skipped += 1;
            if let Some(limit) = self.max_noise_lines {
                if skipped > limit {
                    return Err(ExchangeError::NoisyStream { skipped });
                }
            }
        }
    }

    /// Decide what one frame means for the awaited `expected` id.
    ///
    /// `Ok(Some)` is the correlated response, `Ok(None)` a skipped frame.
    fn inspect(&mut self, line: Line, expected: &Value) -> Result<Option<Response>, ExchangeError> {
        let line = match line {
            Line::Text(line) => line,
            Line::Oversized { len } => {
                tracing::warn!(direction = "server->harness", len, "skipping oversized line");
                return Ok(None);
            }
        };

        match IncomingMessage::parse_line(&line) {
            Ok(IncomingMessage::Response(response)) if response.id == *expected => {
                tracing::debug!(direction = "server->harness", id = %response.id, "received response");
                Ok(Some(response))
            }
            Ok(IncomingMessage::Response(response)) if self.is_abandoned(&response.id) => {
                tracing::warn!(id = %response.id, "discarding late response to abandoned request");
                self.abandoned.retain(|id| *id != response.id);
                Ok(None)
            }
            Ok(IncomingMessage::Response(response)) => Err(ExchangeError::ProtocolViolation {
                expected: expected.clone(),
                actual: response.id,
            }),
            Ok(IncomingMessage::Inbound { method, .. }) => {
                tracing::debug!(direction = "server->harness", %method, "skipping server-initiated message");
                Ok(None)
            }
            Ok(IncomingMessage::Other(_)) => {
                tracing::debug!(direction = "server->harness", "skipping JSON line that is not a response");
                Ok(None)
            }
            Err(e) => {
                tracing::debug!(direction = "server->harness", error = %e, %line, "skipping non-JSON line");
                Ok(None)
            }
        }
    }

    fn is_abandoned(&self, id: &Value) -> bool {
        self.abandoned.iter().any(|a| a == id)
    }

    fn abandon(&mut self, id: Value) {
        if self.abandoned.len() >= MAX_ABANDONED_IDS {
            self.abandoned.remove(0);
        }
        self.abandoned.push(id);
    }
}
