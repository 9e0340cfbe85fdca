//! Engine error types.
//!
//! [`EngineError`] covers the orchestration layer (model calls, loop
//! bookkeeping, persistence, retrieval ingest). [`ToolError`] is the failure
//! type tools return from `invoke`; it never escapes the tool registry —
//! the registry folds it into an `{"error": …}` payload that becomes
//! conversation data.

use thiserror::Error;

/// Unified error type for the orchestration engine.
#[derive(Debug, Error)]
pub enum EngineError {
    // -- LLM errors ----------------------------------------------------------
    /// An HTTP request to the LLM provider failed.
    #[error("llm request failed: {reason}")]
    LlmRequestFailed { reason: String },

    /// The LLM response could not be parsed into the expected format.
    #[error("llm response parse error: {reason}")]
    LlmParseFailed { reason: String },

    /// The streaming SSE connection was interrupted or produced invalid data.
    #[error("llm stream error: {reason}")]
    LlmStreamError { reason: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    // -- Orchestration errors ------------------------------------------------
    /// A tool call referenced by the model does not exist in the registry.
    ///
    /// Recoverable inside the loop: the orchestrator substitutes a synthetic
    /// error tool_result and continues.
    #[error("unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    /// The model ⇄ tools loop exceeded the configured round-trip bound.
    ///
    /// Fatal to the current request only; all prior turns remain persisted.
    #[error("tool loop exceeded {max_rounds} rounds for thread {thread_key}")]
    ToolLoopExceeded { thread_key: String, max_rounds: u32 },

    // -- Retrieval errors ----------------------------------------------------
    /// Document ingest failed (unreadable, empty, or unextractable input).
    #[error("document ingest failed: {reason}")]
    IngestFailed { reason: String },

    // -- Upstream crate errors -----------------------------------------------
    /// An error propagated from the persistence layer.
    ///
    /// Fatal to the current request: a turn that was not durably written
    /// must not be treated as part of the conversation.
    #[error("store error: {0}")]
    Store(#[from] colloquy_store::StoreError),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Generic -------------------------------------------------------------
    /// Catch-all for unexpected internal errors.  Prefer a typed variant
    /// whenever possible.
    #[error("internal engine error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmRequestFailed {
            reason: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tool errors
// ---------------------------------------------------------------------------

/// Failure type returned by individual tools.
///
/// Display output is the bare human-readable reason — it is what the model
/// sees inside the `{"error": …}` payload, so keep it short and concrete.
/// The `tool_name` field exists for tracing, not for display.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The arguments supplied to the tool are missing or malformed.
    #[error("{reason}")]
    InvalidParams { tool_name: String, reason: String },

    /// The tool ran but could not produce a result.
    #[error("{reason}")]
    Failed { tool_name: String, reason: String },

    /// An upstream HTTP request failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ToolError {
    /// The name of the tool that produced this error, when known.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::InvalidParams { tool_name, .. } | Self::Failed { tool_name, .. } => {
                Some(tool_name)
            }
            Self::Http(_) => None,
        }
    }
}

/// Convenience alias for tool implementations.
pub type ToolResult<T> = std::result::Result<T, ToolError>;
