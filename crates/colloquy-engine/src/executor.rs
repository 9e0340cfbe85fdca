//! The turn executor seam.
//!
//! [`TurnExecutor`] is the orchestrator's only view of the model: a
//! stateless mapping from (conversation history, declared tools) to the
//! model's next output.  The production implementation is [`LlmClient`];
//! tests substitute scripted executors to drive the loop deterministically.

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::LlmClient;
use crate::turn::{ModelOutput, ToolDefinition, Turn};

/// Maps conversation history to the model's next output.
///
/// Implementations add no state of their own: given the same inputs they may
/// return different outputs (the model is allowed to be non-deterministic),
/// but nothing about a previous call affects the next one.
#[async_trait]
pub trait TurnExecutor: Send + Sync {
    /// Produce the next output for the given history and tool declarations.
    async fn next_turn(&self, turns: &[Turn], tools: &[ToolDefinition]) -> Result<ModelOutput>;

    /// Streaming variant: content fragments are forwarded to `on_text` in
    /// emission order, then the aggregated output is returned.
    ///
    /// Single-pass and not restartable.  The default implementation calls
    /// [`TurnExecutor::next_turn`] and emits final text as one fragment,
    /// which is the correct behavior for backends without native streaming.
    async fn next_turn_streaming(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        on_text: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<ModelOutput> {
        let output = self.next_turn(turns, tools).await?;
        if let ModelOutput::Final(ref text) = output {
            if !text.is_empty() {
                on_text(text);
            }
        }
        Ok(output)
    }
}

#[async_trait]
impl TurnExecutor for LlmClient {
    async fn next_turn(&self, turns: &[Turn], tools: &[ToolDefinition]) -> Result<ModelOutput> {
        self.chat(turns, tools).await
    }

    async fn next_turn_streaming(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        on_text: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<ModelOutput> {
        self.chat_streaming(turns, tools, on_text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An executor that always answers with fixed text.
    struct FixedExecutor(&'static str);

    #[async_trait]
    impl TurnExecutor for FixedExecutor {
        async fn next_turn(
            &self,
            _turns: &[Turn],
            _tools: &[ToolDefinition],
        ) -> Result<ModelOutput> {
            Ok(ModelOutput::Final(self.0.to_owned()))
        }
    }

    #[tokio::test]
    async fn default_streaming_emits_final_text_once() {
        let executor = FixedExecutor("the answer");
        let mut fragments: Vec<String> = Vec::new();

        let output = executor
            .next_turn_streaming(&[], &[], &mut |t| fragments.push(t.to_owned()))
            .await
            .unwrap();

        assert_eq!(fragments, vec!["the answer".to_owned()]);
        assert!(matches!(output, ModelOutput::Final(t) if t == "the answer"));
    }
}
