//! Server-sent-event line decoding and event accumulation.

use serde_json::Value;
use tracing::warn;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Splits transport chunks into complete lines.
///
/// A line split across two chunks is held until its terminating `\n` arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(line) = decode_line(&raw[..raw.len() - 1]) {
                lines.push(line);
            }
        }
        lines
    }

    /// Flush the trailing unterminated line once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        decode_line(&raw)
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    match std::str::from_utf8(raw) {
        Ok(line) => Some(line.to_string()),
        Err(err) => {
            warn!(error = %err, "skipping stream line that is not valid UTF-8");
            None
        }
    }
}

/// What a single line contributed to the stream state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    /// Comment, blank or non-data line.
    Skipped,
    /// The `[DONE]` sentinel.
    Done,
    /// A data line whose payload is not JSON.
    Malformed,
    /// A decoded event, with any tool names announced by it.
    Event { tools: Vec<String> },
}

/// Folds decoded events into content and sources.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    sources: Vec<Value>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_line(&mut self, line: &str) -> StreamSignal {
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return StreamSignal::Skipped;
        };
        let payload = payload.trim();
        if payload == DONE_SENTINEL {
            return StreamSignal::Done;
        }
        match serde_json::from_str::<Value>(payload) {
            Ok(event) => StreamSignal::Event {
                tools: self.apply_event(&event),
            },
            Err(_) => StreamSignal::Malformed,
        }
    }

    fn apply_event(&mut self, event: &Value) -> Vec<String> {
        let mut tools = Vec::new();
        let choices = event.get("choices").and_then(Value::as_array);
        for choice in choices.into_iter().flatten() {
            let Some(delta) = choice.get("delta") else {
                continue;
            };

            if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
                tools.extend(
                    calls
                        .iter()
                        .filter_map(|call| call.pointer("/function/name"))
                        .filter_map(Value::as_str)
                        .filter(|name| !name.is_empty())
                        .map(str::to_string),
                );
            }

            if let Some(text) = delta.get("content").and_then(Value::as_str) {
                self.content.push_str(text);
            }

            if let Some(sources) = delta.get("sources") {
                self.sources = sources_from(sources);
            }
        }

        if let Some(sources) = event.get("sources") {
            self.sources = sources_from(sources);
        }
        tools
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn sources(&self) -> &[Value] {
        &self.sources
    }

    /// Final content and sources; with `structured`, non-empty content is parsed as JSON
    /// and kept as text if that fails.
    pub fn finish(self, structured: bool) -> (Value, Vec<Value>) {
        let content = if structured && !self.content.is_empty() {
            serde_json::from_str(&self.content).unwrap_or(Value::String(self.content))
        } else {
            Value::String(self.content)
        };
        (content, self.sources)
    }
}

fn sources_from(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}
