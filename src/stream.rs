//! Streaming response reader for the plan-generation endpoint
//!
//! The server answers with a chunked body framed as text lines: any line
//! beginning with `data: ` carries one UTF-8 JSON document, every other line
//! is ignored. Each frame carries exactly one semantic key, decoded here into
//! [`PlanEvent`] so downstream code matches exhaustively instead of probing a
//! dynamic map.

use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::debug;

use crate::api::ApiError;

/// Prefix marking a line that carries a frame
pub const FRAME_PREFIX: &str = "data: ";

/// One decoded frame from the plan stream, in dispatch priority order
#[derive(Debug, Clone, PartialEq)]
pub enum PlanEvent {
    /// Server-reported error; non-fatal, the stream continues
    Error(String),

    /// Informational warning
    Warning(String),

    /// Progress/status message
    Status(String),

    /// Course introduction; at most one per stream, callers cache it for
    /// merging into the final plan
    Introduction(Value),

    /// One plan step. `number` falls back to a running count starting at 1
    /// when the frame omits `step_number`; `total` is absent when unknown.
    Step {
        payload: Value,
        number: u64,
        total: Option<u64>,
    },

    /// Terminal frame; no further events follow
    Done { plan: Option<Value> },

    /// A `data: ` line whose payload failed JSON decoding. Isolated to the
    /// single frame; subsequent frames are still processed.
    ParseError { raw: String, detail: String },
}

/// Reads frames off a chunked response body
///
/// Generic over the byte-chunk stream so tests can feed it in-memory chunks
/// with arbitrary line/chunk boundaries.
pub struct FrameReader<S> {
    stream: S,
    buf: Vec<u8>,
    steps_seen: u64,
    finished: bool,
    eof: bool,
}

impl<S, B> FrameReader<S>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: Vec::new(),
            steps_seen: 0,
            finished: false,
            eof: false,
        }
    }

    /// Produce the next event, or `None` once the stream is exhausted or a
    /// `done` frame was seen. Transport failures mid-stream surface as `Err`.
    pub async fn next_event(&mut self) -> Result<Option<PlanEvent>, ApiError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            // Drain complete lines already buffered
            while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buf.drain(..=pos).collect();
                if let Some(event) = self.decode_line(&line) {
                    return Ok(Some(event));
                }
            }

            if self.eof {
                // A final frame may arrive without a trailing newline
                if !self.buf.is_empty() {
                    let line = std::mem::take(&mut self.buf);
                    if let Some(event) = self.decode_line(&line) {
                        return Ok(Some(event));
                    }
                }
                return Ok(None);
            }

            match self.stream.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => return Err(ApiError::Network(e)),
                None => self.eof = true,
            }
        }
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<PlanEvent> {
        let text = String::from_utf8_lossy(line);
        let text = text.trim_end_matches(['\r', '\n']);
        let payload = text.strip_prefix(FRAME_PREFIX)?;

        let event = match serde_json::from_str::<Value>(payload) {
            Ok(frame) => self.dispatch(frame)?,
            Err(e) => {
                debug!(error = %e, raw = %payload, "decode_line: frame failed JSON decoding");
                PlanEvent::ParseError {
                    raw: payload.to_string(),
                    detail: e.to_string(),
                }
            }
        };

        if matches!(event, PlanEvent::Done { .. }) {
            self.finished = true;
        }
        Some(event)
    }

    /// First matching key wins; a well-formed frame carries only one
    fn dispatch(&mut self, frame: Value) -> Option<PlanEvent> {
        if let Some(error) = frame.get("error") {
            return Some(PlanEvent::Error(text_of(error)));
        }
        if let Some(warning) = frame.get("warning") {
            return Some(PlanEvent::Warning(text_of(warning)));
        }
        if let Some(message) = frame.get("message") {
            return Some(PlanEvent::Status(text_of(message)));
        }
        if let Some(introduction) = frame.get("introduction") {
            return Some(PlanEvent::Introduction(introduction.clone()));
        }
        if let Some(step) = frame.get("step") {
            self.steps_seen += 1;
            let number = frame
                .get("step_number")
                .and_then(Value::as_u64)
                .unwrap_or(self.steps_seen);
            let total = frame.get("total").and_then(Value::as_u64);
            return Some(PlanEvent::Step {
                payload: step.clone(),
                number,
                total,
            });
        }
        if frame.get("done").and_then(Value::as_bool) == Some(true) {
            return Some(PlanEvent::Done {
                plan: frame.get("plan").cloned(),
            });
        }

        debug!(%frame, "dispatch: frame carries no known key, skipping");
        None
    }
}

/// Render a frame value as plain text, falling back to compact JSON
fn text_of(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}
