//! SSE stream parsing for the two supported provider wire formats.
//!
//! The Anthropic Messages API sends `event:`/`data:` line pairs; the OpenAI
//! Chat Completions API sends bare `data:` lines ending with a `[DONE]`
//! sentinel.  Both are reduced here to the same thing: incremental text
//! deltas (forwarded to the caller as they arrive) plus tool-call fragments
//! accumulated into a final [`ModelOutput`].

use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::turn::{ModelOutput, ToolCall};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A parsed event from an Anthropic SSE stream, reduced to what the
/// orchestration loop consumes.
#[derive(Debug, Clone)]
pub enum SseEvent {
    /// A tool_use content block has started.
    ToolUseStart { id: String, name: String },
    /// An incremental chunk of answer text.
    TextDelta(String),
    /// An incremental chunk of tool-call input JSON.
    InputJsonDelta(String),
    /// The message is complete.
    Stop,
}

// ---------------------------------------------------------------------------
// Anthropic line parser
// ---------------------------------------------------------------------------

/// Parses raw SSE lines from the Anthropic Messages API stream.
///
/// Accumulates partial state across calls because SSE events span multiple
/// lines (`event:` followed by `data:`).
#[derive(Debug, Default)]
pub struct AnthropicSse {
    /// The most recently seen `event:` type.
    current_event_type: Option<String>,
}

impl AnthropicSse {
    /// Create a new parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a single line from the SSE stream.
    ///
    /// Returns `Some(event)` when a complete, relevant event has been
    /// parsed; `None` for blank lines, comments, pings, and event types the
    /// loop does not consume.
    pub fn parse_line(&mut self, line: &str) -> Result<Option<SseEvent>> {
        let line = line.trim_end();

        // SSE comment lines start with `:`.
        if line.starts_with(':') || line.is_empty() {
            return Ok(None);
        }

        // `event: <type>` — stash the type for the next `data:` line.
        if let Some(event_type) = line.strip_prefix("event: ") {
            self.current_event_type = Some(event_type.to_owned());
            return Ok(None);
        }

        // `data: <json>` — combine with the stashed event type.
        if let Some(data) = line.strip_prefix("data: ") {
            let event_type = self
                .current_event_type
                .take()
                .unwrap_or_else(|| "unknown".into());
            return self.parse_event(&event_type, data);
        }

        tracing::trace!(line, "ignoring unrecognised SSE line");
        Ok(None)
    }

    fn parse_event(&self, event_type: &str, data: &str) -> Result<Option<SseEvent>> {
        match event_type {
            "content_block_start" => {
                let v = parse_json(data)?;
                let block = &v["content_block"];
                if block["type"].as_str() == Some("tool_use") {
                    return Ok(Some(SseEvent::ToolUseStart {
                        id: json_string(block, "id"),
                        name: json_string(block, "name"),
                    }));
                }
                Ok(None)
            }

            "content_block_delta" => {
                let v = parse_json(data)?;
                let delta = &v["delta"];
                match delta["type"].as_str() {
                    Some("text_delta") => {
                        Ok(Some(SseEvent::TextDelta(json_string(delta, "text"))))
                    }
                    Some("input_json_delta") => Ok(Some(SseEvent::InputJsonDelta(json_string(
                        delta,
                        "partial_json",
                    )))),
                    other => {
                        tracing::trace!(delta_type = ?other, "ignoring unknown delta type");
                        Ok(None)
                    }
                }
            }

            "message_stop" => Ok(Some(SseEvent::Stop)),

            // message_start / content_block_stop / message_delta / ping carry
            // nothing the loop consumes.
            _ => {
                if data.trim() == "[DONE]" {
                    Ok(Some(SseEvent::Stop))
                } else {
                    tracing::trace!(event_type, "ignoring SSE event type");
                    Ok(None)
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Anthropic accumulator
// ---------------------------------------------------------------------------

/// In-progress tool call being assembled from streaming deltas.
#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    /// Accumulated input JSON string.
    input_json: String,
}

impl PendingCall {
    fn finish(self) -> Result<ToolCall> {
        let arguments: Value = if self.input_json.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&self.input_json).map_err(|e| EngineError::LlmParseFailed {
                reason: format!("invalid JSON in tool call `{}` input: {e}", self.name),
            })?
        };
        Ok(ToolCall {
            id: self.id,
            name: self.name,
            arguments,
        })
    }
}

/// Accumulates Anthropic stream events into a complete [`ModelOutput`].
#[derive(Debug, Default)]
pub struct AnthropicAccumulator {
    text: String,
    calls: Vec<PendingCall>,
}

impl AnthropicAccumulator {
    /// Create a new empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a single stream event, forwarding text deltas to `on_text`.
    pub fn apply<F>(&mut self, event: &SseEvent, on_text: &mut F)
    where
        F: FnMut(&str),
    {
        match event {
            SseEvent::ToolUseStart { id, name } => {
                self.calls.push(PendingCall {
                    id: id.clone(),
                    name: name.clone(),
                    input_json: String::new(),
                });
            }
            SseEvent::TextDelta(t) => {
                self.text.push_str(t);
                on_text(t);
            }
            SseEvent::InputJsonDelta(j) => {
                if let Some(pending) = self.calls.last_mut() {
                    pending.input_json.push_str(j);
                }
            }
            SseEvent::Stop => {}
        }
    }

    /// Convert the accumulated state into a final [`ModelOutput`].
    pub fn into_output(self) -> Result<ModelOutput> {
        if self.calls.is_empty() {
            return Ok(ModelOutput::Final(self.text));
        }
        let calls = self
            .calls
            .into_iter()
            .map(PendingCall::finish)
            .collect::<Result<Vec<_>>>()?;
        Ok(ModelOutput::ToolCalls(calls))
    }
}

// ---------------------------------------------------------------------------
// OpenAI accumulator
// ---------------------------------------------------------------------------

/// Accumulates fragments from an OpenAI SSE stream into a [`ModelOutput`].
///
/// OpenAI streams content and tool call deltas across many `data:` lines;
/// tool call fragments carry an `index` to correlate chunks (the name
/// typically arrives in the first chunk, argument fragments follow).
#[derive(Debug, Default)]
pub struct OpenAiAccumulator {
    text: String,
    calls: Vec<PendingCall>,
    done: bool,
}

impl OpenAiAccumulator {
    /// Create a new empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the `[DONE]` sentinel has been received.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a single SSE line from the stream.
    ///
    /// Returns `Ok(Some(text_delta))` when a text content delta is present
    /// (for incremental rendering), `Ok(None)` otherwise.
    pub fn feed_line(&mut self, line: &str) -> Result<Option<String>> {
        let line = line.trim_end();

        if line.is_empty() || line.starts_with(':') {
            return Ok(None);
        }

        let Some(data) = line.strip_prefix("data: ") else {
            return Ok(None);
        };
        let data = data.trim();

        if data == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        let v: Value = serde_json::from_str(data).map_err(|e| EngineError::LlmParseFailed {
            reason: format!("invalid JSON in OpenAI SSE data: {e}"),
        })?;

        let delta = &v["choices"][0]["delta"];
        if delta.is_null() {
            return Ok(None);
        }

        let mut text_delta: Option<String> = None;
        if let Some(content) = delta["content"].as_str() {
            self.text.push_str(content);
            text_delta = Some(content.to_owned());
        }

        if let Some(tool_calls) = delta["tool_calls"].as_array() {
            for tc in tool_calls {
                let index = tc["index"].as_u64().unwrap_or(0) as usize;
                while self.calls.len() <= index {
                    self.calls.push(PendingCall::default());
                }
                let pending = &mut self.calls[index];

                if let Some(id) = tc["id"].as_str() {
                    pending.id = id.to_owned();
                }
                let func = &tc["function"];
                if let Some(name) = func["name"].as_str() {
                    pending.name.push_str(name);
                }
                if let Some(args) = func["arguments"].as_str() {
                    pending.input_json.push_str(args);
                }
            }
        }

        Ok(text_delta)
    }

    /// Consume the accumulator and produce the final [`ModelOutput`].
    ///
    /// Tool calls take priority over text content, matching the
    /// non-streaming behavior.
    pub fn into_output(self) -> Result<ModelOutput> {
        if self.calls.is_empty() {
            return Ok(ModelOutput::Final(self.text));
        }
        let calls = self
            .calls
            .into_iter()
            .map(PendingCall::finish)
            .collect::<Result<Vec<_>>>()?;
        Ok(ModelOutput::ToolCalls(calls))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_json(data: &str) -> Result<Value> {
    serde_json::from_str(data).map_err(|e| EngineError::LlmParseFailed {
        reason: format!("invalid JSON in SSE data: {e}"),
    })
}

/// Extract a string field from a JSON value, empty if missing.
fn json_string(v: &Value, field: &str) -> String {
    v[field].as_str().unwrap_or_default().to_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anthropic_text_delta() {
        let mut parser = AnthropicSse::new();
        assert!(
            parser
                .parse_line("event: content_block_delta")
                .unwrap()
                .is_none()
        );
        let event = parser
            .parse_line(r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#)
            .unwrap()
            .unwrap();

        match event {
            SseEvent::TextDelta(t) => assert_eq!(t, "Hello"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn anthropic_tool_use_start_and_input_delta() {
        let mut parser = AnthropicSse::new();
        parser.parse_line("event: content_block_start").unwrap();
        let start = parser
            .parse_line(r#"data: {"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"tc_01","name":"calculator"}}"#)
            .unwrap()
            .unwrap();
        match start {
            SseEvent::ToolUseStart { id, name } => {
                assert_eq!(id, "tc_01");
                assert_eq!(name, "calculator");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        parser.parse_line("event: content_block_delta").unwrap();
        let delta = parser
            .parse_line(r#"data: {"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"a\":"}}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(delta, SseEvent::InputJsonDelta(j) if j == r#"{"a":"#));
    }

    #[test]
    fn anthropic_blank_and_comment_lines_ignored() {
        let mut parser = AnthropicSse::new();
        assert!(parser.parse_line("").unwrap().is_none());
        assert!(parser.parse_line(": keepalive").unwrap().is_none());
    }

    #[test]
    fn anthropic_accumulator_builds_tool_calls() {
        let mut acc = AnthropicAccumulator::new();
        let mut sink = |_: &str| {};

        acc.apply(
            &SseEvent::ToolUseStart {
                id: "tc_01".into(),
                name: "calculator".into(),
            },
            &mut sink,
        );
        acc.apply(&SseEvent::InputJsonDelta(r#"{"a":1,"#.into()), &mut sink);
        acc.apply(&SseEvent::InputJsonDelta(r#""b":2}"#.into()), &mut sink);
        acc.apply(&SseEvent::Stop, &mut sink);

        match acc.into_output().unwrap() {
            ModelOutput::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "calculator");
                assert_eq!(calls[0].arguments["a"], 1);
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn anthropic_accumulator_forwards_text() {
        let mut acc = AnthropicAccumulator::new();
        let mut collected = String::new();
        let mut sink = |t: &str| collected.push_str(t);

        acc.apply(&SseEvent::TextDelta("Hel".into()), &mut sink);
        acc.apply(&SseEvent::TextDelta("lo".into()), &mut sink);

        assert_eq!(collected, "Hello");
        match acc.into_output().unwrap() {
            ModelOutput::Final(text) => assert_eq!(text, "Hello"),
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn openai_text_accumulation() {
        let mut acc = OpenAiAccumulator::new();
        let d1 = acc
            .feed_line(r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#)
            .unwrap();
        let d2 = acc
            .feed_line(r#"data: {"choices":[{"delta":{"content":"lo"}}]}"#)
            .unwrap();
        acc.feed_line("data: [DONE]").unwrap();

        assert_eq!(d1.as_deref(), Some("Hel"));
        assert_eq!(d2.as_deref(), Some("lo"));
        assert!(acc.is_done());
        match acc.into_output().unwrap() {
            ModelOutput::Final(text) => assert_eq!(text, "Hello"),
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn openai_tool_call_fragments_assemble_by_index() {
        let mut acc = OpenAiAccumulator::new();
        acc.feed_line(r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"get_weather","arguments":""}}]}}]}"#)
            .unwrap();
        acc.feed_line(r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"city\":"}}]}}]}"#)
            .unwrap();
        acc.feed_line(r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"Oslo\"}"}}]}}]}"#)
            .unwrap();
        acc.feed_line("data: [DONE]").unwrap();

        match acc.into_output().unwrap() {
            ModelOutput::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "call_1");
                assert_eq!(calls[0].name, "get_weather");
                assert_eq!(calls[0].arguments["city"], "Oslo");
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn openai_invalid_json_is_an_error() {
        let mut acc = OpenAiAccumulator::new();
        let result = acc.feed_line("data: {not json");
        assert!(matches!(
            result,
            Err(EngineError::LlmParseFailed { .. })
        ));
    }
}
