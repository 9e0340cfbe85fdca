//! Multi-provider LLM client.
//!
//! Supports the **Anthropic Messages API** and the **OpenAI Chat Completions
//! API** (including OpenAI-compatible endpoints such as Ollama, Together, and
//! vLLM) with both streaming SSE and non-streaming modes.

use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::error::{EngineError, Result};
use crate::llm::streaming::{AnthropicAccumulator, AnthropicSse, OpenAiAccumulator, SseEvent};
use crate::turn::{ModelOutput, Role, ToolDefinition, Turn};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default Anthropic API base URL.
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// HTTP timeout for a single model request.
const REQUEST_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// Provider enum
// ---------------------------------------------------------------------------

/// Identifies which LLM provider the client should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI Chat Completions API (also covers OpenAI-compatible endpoints).
    OpenAI,
}

impl LlmProvider {
    fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
        }
    }
}

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to a single LLM provider endpoint.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    /// Which provider this configuration targets.
    pub provider: LlmProvider,
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API (e.g. `https://api.anthropic.com`).
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl LlmClientConfig {
    /// Create a configuration for the Anthropic Claude API.
    pub fn anthropic(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            api_key: api_key.into(),
            base_url: ANTHROPIC_BASE_URL.to_owned(),
            model: model.into(),
            max_tokens: 4096,
            temperature: Some(0.5),
        }
    }

    /// Create a configuration for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_owned(),
            model: model.into(),
            max_tokens: 4096,
            temperature: Some(0.5),
        }
    }

    /// Create a configuration for any OpenAI-compatible API (e.g. Ollama,
    /// Together, vLLM).
    pub fn openai_compatible(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            max_tokens: 4096,
            temperature: Some(0.5),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// An LLM client that communicates with either the Anthropic Messages API or
/// the OpenAI Chat Completions API.
///
/// The client is stateless across requests: it maps (history, declared
/// tools) to the model's next output and holds nothing but configuration
/// and an HTTP connection pool.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: LlmClientConfig,
    /// System prompt sent with every request, if any.
    system_prompt: Option<String>,
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(EngineError::MissingApiKey {
                provider: config.provider.as_str().into(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| EngineError::LlmRequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            config,
            system_prompt: None,
            http,
        })
    }

    /// Attach a system prompt that is sent with every request.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// The configured model identifier.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// The configured provider.
    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Send the conversation and tool declarations, returning the model's
    /// next output (non-streaming).
    pub async fn chat(&self, turns: &[Turn], tools: &[ToolDefinition]) -> Result<ModelOutput> {
        match self.config.provider {
            LlmProvider::Anthropic => self.chat_anthropic(turns, tools).await,
            LlmProvider::OpenAI => self.chat_openai(turns, tools).await,
        }
    }

    /// Streaming variant: text deltas are forwarded to `on_text` as they
    /// arrive; the aggregated output is returned at the end.  Single-pass —
    /// re-invoking re-runs the underlying model call.
    pub async fn chat_streaming(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        on_text: &mut (dyn FnMut(&str) + Send),
    ) -> Result<ModelOutput> {
        match self.config.provider {
            LlmProvider::Anthropic => self.stream_anthropic(turns, tools, on_text).await,
            LlmProvider::OpenAI => self.stream_openai(turns, tools, on_text).await,
        }
    }

    // =======================================================================
    // Anthropic implementation
    // =======================================================================

    async fn chat_anthropic(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
    ) -> Result<ModelOutput> {
        let body = self.build_anthropic_body(turns, tools, false);
        let resp = self.send_anthropic(&body).await?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| EngineError::LlmRequestFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(EngineError::LlmRequestFailed {
                reason: format!("API returned {status}: {text}"),
            });
        }

        let v: Value = serde_json::from_str(&text).map_err(|e| EngineError::LlmParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })?;

        parse_anthropic_response(&v)
    }

    async fn stream_anthropic(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        on_text: &mut (dyn FnMut(&str) + Send),
    ) -> Result<ModelOutput> {
        let body = self.build_anthropic_body(turns, tools, true);
        let resp = self.send_anthropic(&body).await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(EngineError::LlmRequestFailed {
                reason: format!("API returned {status}: {text}"),
            });
        }

        let mut parser = AnthropicSse::new();
        let mut accumulator = AnthropicAccumulator::new();

        let mut byte_stream = resp.bytes_stream();
        let mut line_buffer = String::new();

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = chunk_result.map_err(|e| EngineError::LlmStreamError {
                reason: format!("stream read error: {e}"),
            })?;
            let text = std::str::from_utf8(&chunk).map_err(|e| EngineError::LlmStreamError {
                reason: format!("invalid UTF-8 in stream: {e}"),
            })?;
            line_buffer.push_str(text);

            while let Some(newline_pos) = line_buffer.find('\n') {
                let line = line_buffer[..newline_pos].to_owned();
                line_buffer = line_buffer[newline_pos + 1..].to_owned();

                if let Some(event) = parser.parse_line(&line)? {
                    let stop = matches!(event, SseEvent::Stop);
                    accumulator.apply(&event, &mut |t| on_text(t));
                    if stop {
                        return accumulator.into_output();
                    }
                }
            }
        }

        accumulator.into_output()
    }

    /// Build the JSON body for the Anthropic Messages API.
    fn build_anthropic_body(&self, turns: &[Turn], tools: &[ToolDefinition], stream: bool) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": turns_to_anthropic(turns),
        });

        if let Some(ref system) = self.system_prompt {
            body["system"] = json!(system);
        }
        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }
        if !tools.is_empty() {
            body["tools"] = tools_to_anthropic(tools);
        }
        if stream {
            body["stream"] = json!(true);
        }

        body
    }

    /// Send the HTTP request to the Anthropic Messages API endpoint.
    async fn send_anthropic(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/v1/messages", self.config.base_url);

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key).map_err(|e| {
                EngineError::LlmRequestFailed {
                    reason: format!("invalid API key header: {e}"),
                }
            })?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(url = %url, model = %body["model"], provider = "anthropic", "sending LLM request");

        self.http
            .post(&url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::LlmRequestFailed {
                reason: e.to_string(),
            })
    }

    // =======================================================================
    // OpenAI implementation
    // =======================================================================

    async fn chat_openai(&self, turns: &[Turn], tools: &[ToolDefinition]) -> Result<ModelOutput> {
        let body = self.build_openai_body(turns, tools, false);
        let resp = self.send_openai(&body).await?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| EngineError::LlmRequestFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(EngineError::LlmRequestFailed {
                reason: format!("API returned {status}: {text}"),
            });
        }

        let v: Value = serde_json::from_str(&text).map_err(|e| EngineError::LlmParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })?;

        parse_openai_response(&v)
    }

    async fn stream_openai(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        on_text: &mut (dyn FnMut(&str) + Send),
    ) -> Result<ModelOutput> {
        let body = self.build_openai_body(turns, tools, true);
        let resp = self.send_openai(&body).await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(EngineError::LlmRequestFailed {
                reason: format!("API returned {status}: {text}"),
            });
        }

        let mut accumulator = OpenAiAccumulator::new();

        let mut byte_stream = resp.bytes_stream();
        let mut line_buffer = String::new();

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = chunk_result.map_err(|e| EngineError::LlmStreamError {
                reason: format!("stream read error: {e}"),
            })?;
            let text = std::str::from_utf8(&chunk).map_err(|e| EngineError::LlmStreamError {
                reason: format!("invalid UTF-8 in stream: {e}"),
            })?;
            line_buffer.push_str(text);

            while let Some(newline_pos) = line_buffer.find('\n') {
                let line = line_buffer[..newline_pos].to_owned();
                line_buffer = line_buffer[newline_pos + 1..].to_owned();

                if let Some(delta) = accumulator.feed_line(&line)? {
                    on_text(&delta);
                }
                if accumulator.is_done() {
                    return accumulator.into_output();
                }
            }
        }

        accumulator.into_output()
    }

    /// Build the JSON body for the OpenAI Chat Completions API.
    fn build_openai_body(&self, turns: &[Turn], tools: &[ToolDefinition], stream: bool) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": turns_to_openai(self.system_prompt.as_deref(), turns),
        });

        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }
        if !tools.is_empty() {
            body["tools"] = tools_to_openai(tools);
        }
        if stream {
            body["stream"] = json!(true);
        }

        body
    }

    /// Send the HTTP request to the OpenAI Chat Completions API endpoint.
    async fn send_openai(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| EngineError::LlmRequestFailed {
                reason: format!("invalid authorization header: {e}"),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(url = %url, model = %body["model"], provider = "openai", "sending LLM request");

        self.http
            .post(&url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::LlmRequestFailed {
                reason: e.to_string(),
            })
    }
}

// ===========================================================================
// Anthropic format conversion (free functions)
// ===========================================================================

/// Convert turns to the Anthropic wire format.
///
/// Anthropic takes the system prompt as a top-level field (handled by the
/// request builder), assistant tool calls as `tool_use` content blocks, and
/// tool results as `tool_result` blocks inside a user message.
fn turns_to_anthropic(turns: &[Turn]) -> Vec<Value> {
    let mut wire: Vec<Value> = Vec::with_capacity(turns.len());

    for turn in turns {
        match turn.role {
            Role::User => {
                wire.push(json!({
                    "role": "user",
                    "content": turn.text(),
                }));
            }
            Role::Assistant => {
                if turn.tool_calls.is_empty() {
                    wire.push(json!({
                        "role": "assistant",
                        "content": turn.text(),
                    }));
                } else {
                    let mut content: Vec<Value> = Vec::new();
                    let text = turn.text();
                    if !text.is_empty() {
                        content.push(json!({ "type": "text", "text": text }));
                    }
                    for tc in &turn.tool_calls {
                        content.push(json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.name,
                            "input": tc.arguments,
                        }));
                    }
                    wire.push(json!({ "role": "assistant", "content": content }));
                }
            }
            Role::ToolResult => {
                wire.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": turn.tool_call_id,
                        "content": turn.text(),
                    }],
                }));
            }
        }
    }

    wire
}

/// Convert tool definitions into the Anthropic API format.
fn tools_to_anthropic(tools: &[ToolDefinition]) -> Value {
    let tool_values: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema,
            })
        })
        .collect();
    json!(tool_values)
}

/// Parse a non-streaming Anthropic Messages API response.
fn parse_anthropic_response(v: &Value) -> Result<ModelOutput> {
    let content = v["content"]
        .as_array()
        .ok_or_else(|| EngineError::LlmParseFailed {
            reason: "missing `content` array in response".into(),
        })?;

    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<crate::turn::ToolCall> = Vec::new();

    for block in content {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text_parts.push(t.to_owned());
                }
            }
            Some("tool_use") => {
                tool_calls.push(crate::turn::ToolCall {
                    id: block["id"].as_str().unwrap_or_default().to_owned(),
                    name: block["name"].as_str().unwrap_or_default().to_owned(),
                    arguments: block["input"].clone(),
                });
            }
            _ => {}
        }
    }

    if tool_calls.is_empty() {
        Ok(ModelOutput::Final(text_parts.join("")))
    } else {
        Ok(ModelOutput::ToolCalls(tool_calls))
    }
}

// ===========================================================================
// OpenAI format conversion (free functions)
// ===========================================================================

/// Convert turns to the OpenAI Chat Completions wire format.
///
/// In the OpenAI format the system prompt is part of the `messages` array,
/// tool calls live in `assistant.tool_calls`, and tool results use
/// `role: "tool"` with a `tool_call_id`.
fn turns_to_openai(system_prompt: Option<&str>, turns: &[Turn]) -> Vec<Value> {
    let mut wire: Vec<Value> = Vec::with_capacity(turns.len() + 1);

    if let Some(system) = system_prompt {
        wire.push(json!({ "role": "system", "content": system }));
    }

    for turn in turns {
        match turn.role {
            Role::User => {
                wire.push(json!({ "role": "user", "content": turn.text() }));
            }
            Role::Assistant => {
                if turn.tool_calls.is_empty() {
                    wire.push(json!({ "role": "assistant", "content": turn.text() }));
                } else {
                    let tool_calls: Vec<Value> = turn
                        .tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": tc.arguments.to_string(),
                                }
                            })
                        })
                        .collect();

                    let mut m = json!({ "role": "assistant", "tool_calls": tool_calls });
                    let text = turn.text();
                    if !text.is_empty() {
                        m["content"] = json!(text);
                    }
                    wire.push(m);
                }
            }
            Role::ToolResult => {
                wire.push(json!({
                    "role": "tool",
                    "tool_call_id": turn.tool_call_id,
                    "content": turn.text(),
                }));
            }
        }
    }

    wire
}

/// Convert tool definitions into the OpenAI Chat Completions API format.
fn tools_to_openai(tools: &[ToolDefinition]) -> Value {
    let tool_values: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                }
            })
        })
        .collect();
    json!(tool_values)
}

/// Parse a non-streaming OpenAI Chat Completions API response.
fn parse_openai_response(v: &Value) -> Result<ModelOutput> {
    let message = &v["choices"][0]["message"];

    if message.is_null() {
        return Err(EngineError::LlmParseFailed {
            reason: "missing `choices[0].message` in response".into(),
        });
    }

    if let Some(tool_calls_arr) = message["tool_calls"].as_array() {
        if !tool_calls_arr.is_empty() {
            let calls: Result<Vec<crate::turn::ToolCall>> = tool_calls_arr
                .iter()
                .map(|tc| {
                    let func = &tc["function"];
                    let name = func["name"].as_str().unwrap_or_default().to_owned();
                    let args_str = func["arguments"].as_str().unwrap_or("{}");
                    let arguments: Value = serde_json::from_str(args_str).map_err(|e| {
                        EngineError::LlmParseFailed {
                            reason: format!("invalid JSON in tool call `{name}` arguments: {e}"),
                        }
                    })?;

                    Ok(crate::turn::ToolCall {
                        id: tc["id"].as_str().unwrap_or_default().to_owned(),
                        name,
                        arguments,
                    })
                })
                .collect();

            return Ok(ModelOutput::ToolCalls(calls?));
        }
    }

    let content = message["content"].as_str().unwrap_or_default();
    Ok(ModelOutput::Final(content.to_owned()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::ToolCall;

    fn anthropic_client() -> LlmClient {
        LlmClient::new(LlmClientConfig::anthropic(
            "test-key",
            "claude-sonnet-4-20250514",
        ))
        .unwrap()
        .with_system_prompt("You are helpful.")
    }

    #[test]
    fn empty_api_key_returns_error() {
        let config = LlmClientConfig::anthropic("", "claude-sonnet-4-20250514");
        assert!(matches!(
            LlmClient::new(config),
            Err(EngineError::MissingApiKey { .. })
        ));
    }

    #[test]
    fn anthropic_body_carries_system_and_messages() {
        let client = anthropic_client();
        let turns = vec![Turn::user("Hello")];

        let body = client.build_anthropic_body(&turns, &[], false);

        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["system"], "You are helpful.");
        assert!(body.get("stream").is_none());

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Hello");
    }

    #[test]
    fn anthropic_body_encodes_tool_traffic() {
        let client = anthropic_client();
        let payload = serde_json::json!({"result": 4.0});
        let turns = vec![
            Turn::user("What is 2+2?"),
            Turn::assistant_tool_calls(vec![ToolCall {
                id: "tc_01".into(),
                name: "calculator".into(),
                arguments: serde_json::json!({"a": 2, "b": 2, "op": "add"}),
            }]),
            Turn::tool_result("tc_01", &payload),
        ];

        let body = client.build_anthropic_body(&turns, &[], false);
        let messages = body["messages"].as_array().unwrap();

        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"][0]["type"], "tool_use");
        assert_eq!(messages[1]["content"][0]["id"], "tc_01");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"][0]["type"], "tool_result");
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "tc_01");
    }

    #[test]
    fn openai_body_inlines_system_prompt() {
        let client = LlmClient::new(LlmClientConfig::openai("test-key", "gpt-4o"))
            .unwrap()
            .with_system_prompt("Be brief.");
        let turns = vec![Turn::user("Hi")];

        let body = client.build_openai_body(&turns, &[], true);
        assert_eq!(body["stream"], true);

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "Be brief.");
        assert_eq!(messages[1]["role"], "user");
    }

    #[test]
    fn openai_tool_result_uses_tool_role() {
        let payload = serde_json::json!({"error": "division by zero"});
        let turns = vec![Turn::tool_result("call_1", &payload)];

        let wire = turns_to_openai(None, &turns);
        assert_eq!(wire[0]["role"], "tool");
        assert_eq!(wire[0]["tool_call_id"], "call_1");
        assert!(wire[0]["content"].as_str().unwrap().contains("division"));
    }

    #[test]
    fn parse_anthropic_text_response() {
        let v = serde_json::json!({
            "content": [{"type": "text", "text": "Hello, world!"}],
            "stop_reason": "end_turn",
        });
        match parse_anthropic_response(&v).unwrap() {
            ModelOutput::Final(text) => assert_eq!(text, "Hello, world!"),
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn parse_anthropic_tool_use_response() {
        let v = serde_json::json!({
            "content": [
                {"type": "text", "text": "Let me calculate."},
                {"type": "tool_use", "id": "tc_1", "name": "calculator",
                 "input": {"a": 2, "b": 2, "op": "add"}}
            ],
            "stop_reason": "tool_use",
        });
        match parse_anthropic_response(&v).unwrap() {
            ModelOutput::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "calculator");
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn parse_openai_tool_call_response() {
        let v = serde_json::json!({
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "get_weather",
                            "arguments": "{\"city\":\"Oslo\"}"
                        }
                    }]
                }
            }]
        });
        match parse_openai_response(&v).unwrap() {
            ModelOutput::ToolCalls(calls) => {
                assert_eq!(calls[0].name, "get_weather");
                assert_eq!(calls[0].arguments["city"], "Oslo");
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn parse_openai_malformed_response_is_error() {
        let v = serde_json::json!({"unexpected": true});
        assert!(parse_openai_response(&v).is_err());
    }
}
