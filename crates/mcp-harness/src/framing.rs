//! Newline-delimited JSON framing for the MCP stdio transport.
//!
//! Each message is one JSON object terminated by `\n`. Writes are flushed
//! immediately so the server sees the request without buffering delay.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Longest line kept in memory; anything longer is reported as [`Line::Oversized`].
pub const DEFAULT_MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// One frame read from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A non-blank line with surrounding whitespace trimmed.
    Text(String),
    /// A line longer than the reader's limit; its bytes were dropped.
    Oversized { len: usize },
}

/// Reads newline-terminated lines from an async reader.
///
/// Bytes are accumulated in an internal buffer that survives cancellation:
/// if a [`LineReader::next_line`] future is dropped mid-line (for example by a
/// deadline), the partial line is kept and completed by the next call. The
/// buffer never grows past the line limit; the rest of an oversized line is
/// counted and discarded up to its newline.
pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    max_line_bytes: usize,
    /// Bytes dropped so far from the current oversized line, 0 when not dropping.
    discarded: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            discarded: 0,
        }
    }

    pub fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }

    /// Read the next frame, returning `None` on EOF.
    ///
    /// Blank lines are skipped. A trailing line without a terminating `\n` is
    /// returned before EOF is reported. Invalid UTF-8 is replaced lossily; the
    /// caller decides whether the line is meaningful.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if reading fails.
    pub async fn next_line(&mut self) -> io::Result<Option<Line>> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(self.finish_line());
            }

            let (take, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            };
            if self.discarded > 0 {
                self.discarded += take;
            } else {
                self.buf.extend_from_slice(&available[..take]);
            }
            self.reader.consume(take);

            if self.discarded == 0 && self.buf.len() > self.max_line_bytes {
                self.discarded = self.buf.len();
                self.buf.clear();
            }

            if complete {
                if let Some(line) = self.finish_line() {
                    return Ok(Some(line));
                }
            }
        }
    }

    /// Take whatever has been accumulated as one frame; `None` if it was blank.
    fn finish_line(&mut self) -> Option<Line> {
        if self.discarded > 0 {
            let len = std::mem::take(&mut self.discarded);
            self.buf.clear();
            return Some(Line::Oversized { len });
        }
        let line = String::from_utf8_lossy(&self.buf).trim().to_string();
        self.buf.clear();
        (!line.is_empty()).then_some(Line::Text(line))
    }

    /// Unwrap the underlying reader, discarding any buffered bytes.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

/// Write a JSON message in newline-delimited format to the given writer.
///
/// Appends `\n` and flushes. The `json` string must not contain embedded newlines.
///
/// # Errors
///
/// Returns an I/O error if writing or flushing fails.
pub async fn write_newline_delimited<W: AsyncWrite + Unpin>(
    writer: &mut W,
    json: &str,
) -> io::Result<()> {
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
