//! Conversation orchestration engine for Colloquy.
//!
//! This crate implements the intelligent core of the assistant: the
//! turn-taking state machine that drives a language model, dispatches the
//! tools it requests, persists every turn, and grounds answers in uploaded
//! documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────── Assistant (facade) ──────────────────────┐
//! │                                                                │
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐  │
//! │  │ Orchestrator │───>│ TurnExecutor │    │  ToolRegistry    │  │
//! │  │ (state loop) │    │ (LlmClient)  │    │  (never throws)  │  │
//! │  └──────┬───────┘    └──────────────┘    └────────┬─────────┘  │
//! │         │ persists every turn                     │            │
//! │  ┌──────┴───────┐                      ┌──────────┴─────────┐  │
//! │  │ ThreadStore  │                      │ RetrievalIndex     │  │
//! │  │ (SQLite log) │                      │ Manager (per-thread│  │
//! │  └──────────────┘                      │ document index)    │  │
//! │                                        └────────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`turn`] -- conversation wire types (`Turn`, `Content`, `ToolCall`).
//! - [`llm`] -- the Anthropic/OpenAI HTTP client and SSE parsing.
//! - [`executor`] -- the `TurnExecutor` seam between loop and model.
//! - [`registry`] -- the `Tool` trait and name-keyed registry.
//! - [`orchestrator`] -- the model ⇄ tools state machine.
//! - [`retrieval`] -- per-thread document chunking, embedding, and search.
//! - [`assistant`] -- the public facade.
//! - [`error`] -- engine and tool error types.

pub mod assistant;
pub mod error;
pub mod executor;
pub mod llm;
pub mod orchestrator;
pub mod registry;
pub mod retrieval;
pub mod turn;

// Re-export the most commonly used types at the crate root.
pub use assistant::{Assistant, HistoryEntry, StreamItem};
pub use error::{EngineError, Result, ToolError};
pub use executor::TurnExecutor;
pub use llm::{LlmClient, LlmClientConfig, LlmProvider};
pub use orchestrator::{DEFAULT_MAX_TOOL_ROUNDS, Orchestrator, OrchestratorConfig};
pub use registry::{InvocationContext, Tool, ToolRegistry};
pub use retrieval::{
    Embedder, HashEmbedder, HttpEmbedder, IngestReport, RetrievalIndexManager, ScoredChunk,
};
pub use turn::{Content, ContentBlock, ModelOutput, Role, ToolCall, ToolDefinition, Turn};
