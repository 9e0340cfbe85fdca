//! LLM integration layer.
//!
//! The interface between the orchestration loop and large language model
//! providers:
//!
//! - [`client`] -- HTTP client for the Anthropic and OpenAI APIs.
//! - [`streaming`] -- SSE parsing and response accumulation for both wire
//!   formats.

pub mod client;
pub mod streaming;

// Re-export the most commonly used types for convenience.
pub use client::{LlmClient, LlmClientConfig, LlmProvider};
