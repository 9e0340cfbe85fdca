//! Core conversation types.
//!
//! These types model the data flowing between the orchestrator, the model
//! backend, and the store.  They are provider-agnostic at this layer; the
//! [`crate::llm::client`] module translates them into provider-specific wire
//! formats, and the storage glue at the bottom of this module converts them
//! to and from [`colloquy_store`] rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use colloquy_store::{NewTurn, StoredTurn};

use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Roles and content
// ---------------------------------------------------------------------------

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Input from the human user.
    User,
    /// Output from the model (final text or tool-call requests).
    Assistant,
    /// Result of a tool invocation, fed back to the model.
    ToolResult,
}

impl Role {
    /// The stable string form used in the store and wire formats.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::ToolResult => "tool_result",
        }
    }

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "tool_result" => Ok(Self::ToolResult),
            other => Err(EngineError::Internal(format!("unknown turn role: {other}"))),
        }
    }
}

/// Turn content: either plain text or a sequence of structured blocks.
///
/// The variant is decided once, at the boundary where content enters the
/// system; every consumer goes through [`Content::as_text`] instead of
/// re-inspecting the shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text.
    Text(String),
    /// Ordered structured blocks (e.g. text blocks interleaved with
    /// provider-specific payloads).
    Blocks(Vec<ContentBlock>),
}

/// One block within [`Content::Blocks`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    /// The block type (e.g. `"text"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// The block payload. For `"text"` blocks this is a JSON string.
    pub payload: Value,
}

impl Content {
    /// Normalize to plain text for display and for the model wire formats.
    ///
    /// Non-text blocks are skipped; text blocks are concatenated in order.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter(|b| b.kind == "text")
                .filter_map(|b| b.payload.as_str())
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// Whether the normalized text form is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Blocks(blocks) => !blocks
                .iter()
                .any(|b| b.kind == "text" && b.payload.as_str().is_some_and(|s| !s.is_empty())),
        }
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

// ---------------------------------------------------------------------------
// Tool calls
// ---------------------------------------------------------------------------

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier assigned by the model for correlating results.
    pub id: String,

    /// The name of the tool to invoke (must match a registered tool).
    pub name: String,

    /// Arguments as a JSON value.  The structure depends on the tool's schema.
    pub arguments: Value,
}

/// A tool definition exposed to the model so it knows what tools are available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,

    /// Human-readable description of what the tool does.
    pub description: String,

    /// JSON Schema describing the tool's input parameters.
    pub input_schema: Value,
}

// ---------------------------------------------------------------------------
// Model output
// ---------------------------------------------------------------------------

/// What the model produced for one request: a final answer or a batch of
/// tool-call requests.  The orchestrator's routing decision is a pure
/// function of this shape.
#[derive(Debug, Clone)]
pub enum ModelOutput {
    /// The model produced a final text answer.
    Final(String),

    /// The model wants one or more tools invoked before continuing.
    ToolCalls(Vec<ToolCall>),
}

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// A single immutable turn in a conversation.
///
/// Invariant: a `tool_result` turn's `tool_call_id` references a tool call
/// that appears in an earlier assistant turn of the same thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn.
    pub role: Role,

    /// The turn content.  For assistant turns that carry only tool calls
    /// this may be empty.
    pub content: Content,

    /// Tool calls requested by the model (assistant turns only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Identifies which tool call this turn answers (tool_result turns only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Turn {
    /// Create a user turn.
    pub fn user(content: impl Into<Content>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a final assistant turn.
    pub fn assistant(content: impl Into<Content>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant turn that carries tool calls.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(String::new()),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Create a tool result turn answering `tool_call_id`.
    ///
    /// The payload is serialized to its JSON text form so the model sees
    /// structured results (including `{"error": …}`) verbatim.
    pub fn tool_result(tool_call_id: impl Into<String>, payload: &Value) -> Self {
        Self {
            role: Role::ToolResult,
            content: Content::Text(payload.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// The normalized text form of this turn's content.
    pub fn text(&self) -> String {
        self.content.as_text()
    }
}

// ---------------------------------------------------------------------------
// Storage glue
// ---------------------------------------------------------------------------

impl Turn {
    /// Convert this turn into the row fields the store persists.
    pub fn to_stored(&self) -> Result<NewTurn> {
        Ok(NewTurn {
            role: self.role.as_str().to_owned(),
            content: serde_json::to_string(&self.content)?,
            tool_calls: if self.tool_calls.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&self.tool_calls)?)
            },
            tool_call_id: self.tool_call_id.clone(),
        })
    }

    /// Reconstruct a turn from a stored row.
    pub fn from_stored(row: &StoredTurn) -> Result<Self> {
        let tool_calls = match &row.tool_calls {
            Some(json) => serde_json::from_str(json)?,
            None => Vec::new(),
        };

        Ok(Self {
            role: Role::from_str(&row.role)?,
            content: serde_json::from_str(&row.content)?,
            tool_calls,
            tool_call_id: row.tool_call_id.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_text_normalization() {
        let text = Content::Text("hello".into());
        assert_eq!(text.as_text(), "hello");

        let blocks = Content::Blocks(vec![
            ContentBlock {
                kind: "text".into(),
                payload: json!("one "),
            },
            ContentBlock {
                kind: "image".into(),
                payload: json!({"url": "ignored"}),
            },
            ContentBlock {
                kind: "text".into(),
                payload: json!("two"),
            },
        ]);
        assert_eq!(blocks.as_text(), "one two");
        assert!(!blocks.is_empty());

        let empty_blocks = Content::Blocks(vec![ContentBlock {
            kind: "image".into(),
            payload: json!({}),
        }]);
        assert!(empty_blocks.is_empty());
    }

    #[test]
    fn content_serde_shape_is_self_descriptive() {
        let text: Content = serde_json::from_str("\"plain\"").unwrap();
        assert!(matches!(text, Content::Text(_)));

        let blocks: Content =
            serde_json::from_str(r#"[{"type":"text","payload":"hi"}]"#).unwrap();
        assert!(matches!(blocks, Content::Blocks(_)));
        assert_eq!(blocks.as_text(), "hi");
    }

    #[test]
    fn stored_round_trip_preserves_tool_linkage() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "calculator".into(),
            arguments: json!({"a": 1, "b": 2, "op": "add"}),
        };

        let turn = Turn::assistant_tool_calls(vec![call]);
        let stored = turn.to_stored().unwrap();
        assert_eq!(stored.role, "assistant");
        assert!(stored.tool_calls.is_some());

        let row = StoredTurn {
            id: 1,
            thread_key: "t".into(),
            seq: 0,
            role: stored.role,
            content: stored.content,
            tool_calls: stored.tool_calls,
            tool_call_id: stored.tool_call_id,
            created_at: 0,
        };

        let restored = Turn::from_stored(&row).unwrap();
        assert_eq!(restored.tool_calls.len(), 1);
        assert_eq!(restored.tool_calls[0].id, "call_1");
        assert_eq!(restored.tool_calls[0].arguments["op"], "add");
    }

    #[test]
    fn tool_result_serializes_payload_verbatim() {
        let turn = Turn::tool_result("call_9", &json!({"error": "division by zero"}));
        assert_eq!(turn.role, Role::ToolResult);
        assert_eq!(turn.tool_call_id.as_deref(), Some("call_9"));
        assert_eq!(turn.text(), r#"{"error":"division by zero"}"#);
    }
}
