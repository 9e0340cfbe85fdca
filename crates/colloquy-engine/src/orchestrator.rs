//! The conversation orchestration loop.
//!
//! Drives one user request through the model ⇄ tools state machine:
//!
//! ```text
//!            ┌──────────────────┐   tool calls    ┌────────────────┐
//!  start ───>│  AwaitingModel   │────────────────>│ ExecutingTools │
//!            └──────────────────┘                 └───────┬────────┘
//!                     │  ▲                                │
//!          final text │  └────── results appended ────────┘
//!                     ▼
//!                 ┌──────┐
//!                 │ Done │
//!                 └──────┘
//! ```
//!
//! The routing decision is a pure function of the executor's returned
//! output shape.  Every turn the loop produces is persisted via the store
//! **before** the loop proceeds, so a crash mid-loop leaves a consistent,
//! resumable prefix.

use std::sync::Arc;

use colloquy_store::ThreadStore;
use serde_json::json;

use crate::error::{EngineError, Result};
use crate::executor::TurnExecutor;
use crate::registry::{InvocationContext, ToolRegistry};
use crate::turn::{ModelOutput, ToolCall, Turn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default bound on consecutive model ⇄ tools round-trips per user message.
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 25;

/// Configuration for the orchestration loop.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum number of model ⇄ tools round-trips per user message.
    /// Prevents unbounded tool-call loops.
    pub max_tool_rounds: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// The loop's three states.  `ExecutingTools` and `Done` carry the data
/// that moved the machine into them.
enum LoopState {
    /// Waiting for the model's next output.
    AwaitingModel,
    /// Dispatching a batch of requested tool calls.
    ExecutingTools(Vec<ToolCall>),
    /// Terminal: the final assistant turn is ready.
    Done(Turn),
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs the model ⇄ tools loop for one thread at a time.
///
/// Holds no per-request state; callers pass the loaded history in and the
/// orchestrator appends to it (and to the store) as the loop advances.
pub struct Orchestrator {
    store: ThreadStore,
    registry: Arc<ToolRegistry>,
    executor: Arc<dyn TurnExecutor>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(
        store: ThreadStore,
        registry: Arc<ToolRegistry>,
        executor: Arc<dyn TurnExecutor>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            registry,
            executor,
            config,
        }
    }

    /// Run the loop to completion for a thread whose history ends in a
    /// freshly appended user turn.  Returns the final assistant turn.
    pub async fn run(&self, thread_key: &str, turns: Vec<Turn>) -> Result<Turn> {
        self.drive(thread_key, turns, None).await
    }

    /// Streaming variant: answer-text fragments are forwarded to `on_text`
    /// in emission order as the model produces them.
    pub async fn run_streaming(
        &self,
        thread_key: &str,
        turns: Vec<Turn>,
        on_text: &mut (dyn FnMut(&str) + Send),
    ) -> Result<Turn> {
        self.drive(thread_key, turns, Some(on_text)).await
    }

    async fn drive(
        &self,
        thread_key: &str,
        mut turns: Vec<Turn>,
        mut on_text: Option<&mut (dyn FnMut(&str) + Send)>,
    ) -> Result<Turn> {
        let tools = self.registry.definitions();
        let ctx = InvocationContext {
            thread_key: thread_key.to_owned(),
        };

        tracing::info!(
            thread_key = %thread_key,
            history_len = turns.len(),
            tool_count = tools.len(),
            "starting orchestration loop"
        );

        let mut rounds: u32 = 0;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    let output = match on_text.as_deref_mut() {
                        Some(cb) => {
                            self.executor
                                .next_turn_streaming(&turns, &tools, cb)
                                .await?
                        }
                        None => self.executor.next_turn(&turns, &tools).await?,
                    };

                    // Routing is a pure function of the output shape.
                    match output {
                        ModelOutput::Final(text) => {
                            let turn = Turn::assistant(text);
                            self.persist(thread_key, &turn).await?;
                            LoopState::Done(turn)
                        }
                        ModelOutput::ToolCalls(calls) => {
                            rounds += 1;
                            if rounds > self.config.max_tool_rounds {
                                tracing::error!(
                                    thread_key = %thread_key,
                                    max_rounds = self.config.max_tool_rounds,
                                    "tool loop bound exceeded"
                                );
                                return Err(EngineError::ToolLoopExceeded {
                                    thread_key: thread_key.to_owned(),
                                    max_rounds: self.config.max_tool_rounds,
                                });
                            }

                            tracing::info!(
                                thread_key = %thread_key,
                                round = rounds,
                                tools = ?calls.iter().map(|c| &c.name).collect::<Vec<_>>(),
                                "model requested tool calls"
                            );

                            let turn = Turn::assistant_tool_calls(calls.clone());
                            self.persist(thread_key, &turn).await?;
                            turns.push(turn);
                            LoopState::ExecutingTools(calls)
                        }
                    }
                }

                LoopState::ExecutingTools(calls) => {
                    // All pending results are appended before the state is
                    // left — no transition skips a result.
                    for call in calls {
                        let payload = match self
                            .registry
                            .invoke(&call.name, call.arguments.clone(), &ctx)
                            .await
                        {
                            Ok(payload) => payload,
                            Err(EngineError::UnknownTool { tool_name }) => {
                                // Recoverable: tell the model what went wrong
                                // and let it try something else.
                                tracing::warn!(
                                    thread_key = %thread_key,
                                    tool = %tool_name,
                                    "model requested unregistered tool"
                                );
                                json!({ "error": format!("unknown tool: {tool_name}") })
                            }
                            Err(other) => return Err(other),
                        };

                        let result_turn = Turn::tool_result(&call.id, &payload);
                        self.persist(thread_key, &result_turn).await?;
                        turns.push(result_turn);
                    }
                    LoopState::AwaitingModel
                }

                LoopState::Done(turn) => {
                    tracing::info!(
                        thread_key = %thread_key,
                        rounds,
                        "orchestration loop completed"
                    );
                    return Ok(turn);
                }
            };
        }
    }

    /// Durably append a turn.  Persistence failure aborts the request —
    /// memory and durable state must never diverge.
    async fn persist(&self, thread_key: &str, turn: &Turn) -> Result<()> {
        let stored = turn.to_stored()?;
        self.store.append(thread_key, stored).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use colloquy_store::Database;
    use serde_json::Value;

    use crate::error::{Result as EngineResult, ToolError, ToolResult};
    use crate::registry::Tool;
    use crate::turn::ToolDefinition;

    async fn setup_store() -> ThreadStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        ThreadStore::new(db)
    }

    /// Scripted executor: pops outputs front-to-back, then answers "done".
    struct ScriptedExecutor {
        script: std::sync::Mutex<Vec<ModelOutput>>,
    }

    impl ScriptedExecutor {
        fn new(script: Vec<ModelOutput>) -> Self {
            Self {
                script: std::sync::Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl TurnExecutor for ScriptedExecutor {
        async fn next_turn(
            &self,
            _turns: &[Turn],
            _tools: &[ToolDefinition],
        ) -> EngineResult<ModelOutput> {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok(ModelOutput::Final("done".into()))
            } else {
                Ok(script.remove(0))
            }
        }
    }

    /// Executor that requests the same tool call forever.
    struct LoopingExecutor;

    #[async_trait]
    impl TurnExecutor for LoopingExecutor {
        async fn next_turn(
            &self,
            _turns: &[Turn],
            _tools: &[ToolDefinition],
        ) -> EngineResult<ModelOutput> {
            Ok(ModelOutput::ToolCalls(vec![ToolCall {
                id: "call_loop".into(),
                name: "counter".into(),
                arguments: serde_json::json!({}),
            }]))
        }
    }

    /// Tool that counts its invocations.
    struct CountingTool {
        invocations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "counter".into(),
                description: "Counts invocations".into(),
                input_schema: serde_json::json!({"type": "object"}),
            }
        }

        async fn invoke(
            &self,
            _arguments: Value,
            _ctx: &InvocationContext,
        ) -> ToolResult<Value> {
            let n = self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!({ "count": n }))
        }
    }

    /// Tool that always fails.
    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "broken".into(),
                description: "Always fails".into(),
                input_schema: serde_json::json!({"type": "object"}),
            }
        }

        async fn invoke(
            &self,
            _arguments: Value,
            _ctx: &InvocationContext,
        ) -> ToolResult<Value> {
            Err(ToolError::Failed {
                tool_name: "broken".into(),
                reason: "division by zero".into(),
            })
        }
    }

    fn tool_call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: serde_json::json!({}),
        }
    }

    async fn seed_user_turn(store: &ThreadStore, thread_key: &str, text: &str) -> Vec<Turn> {
        let turn = Turn::user(text);
        store
            .append(thread_key, turn.to_stored().unwrap())
            .await
            .unwrap();
        vec![turn]
    }

    #[tokio::test]
    async fn direct_answer_persists_two_turns() {
        let store = setup_store().await;
        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(ToolRegistry::new()),
            Arc::new(ScriptedExecutor::new(vec![ModelOutput::Final(
                "hello!".into(),
            )])),
            OrchestratorConfig::default(),
        );

        let turns = seed_user_turn(&store, "t1", "hi").await;
        let final_turn = orchestrator.run("t1", turns).await.unwrap();

        assert_eq!(final_turn.text(), "hello!");
        let stored = store.turns("t1").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].role, "user");
        assert_eq!(stored[1].role, "assistant");
    }

    #[tokio::test]
    async fn tool_round_appends_call_and_result_before_final() {
        let store = setup_store().await;
        let registry = ToolRegistry::new().with(Arc::new(CountingTool {
            invocations: Arc::new(AtomicUsize::new(0)),
        }));

        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(registry),
            Arc::new(ScriptedExecutor::new(vec![
                ModelOutput::ToolCalls(vec![tool_call("call_1", "counter")]),
                ModelOutput::Final("counted".into()),
            ])),
            OrchestratorConfig::default(),
        );

        let turns = seed_user_turn(&store, "t1", "count for me").await;
        let final_turn = orchestrator.run("t1", turns).await.unwrap();
        assert_eq!(final_turn.text(), "counted");

        let stored = store.turns("t1").await.unwrap();
        let roles: Vec<&str> = stored.iter().map(|t| t.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "tool_result", "assistant"]);

        // The result is linked to the call that requested it.
        assert_eq!(stored[2].tool_call_id.as_deref(), Some("call_1"));
        assert!(stored[1].tool_calls.as_deref().unwrap().contains("call_1"));
    }

    #[tokio::test]
    async fn tool_failure_is_folded_in_as_data() {
        let store = setup_store().await;
        let registry = ToolRegistry::new().with(Arc::new(BrokenTool));

        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(registry),
            Arc::new(ScriptedExecutor::new(vec![
                ModelOutput::ToolCalls(vec![tool_call("call_1", "broken")]),
                ModelOutput::Final("I could not divide by zero.".into()),
            ])),
            OrchestratorConfig::default(),
        );

        let turns = seed_user_turn(&store, "t1", "divide 1 by 0").await;
        let final_turn = orchestrator.run("t1", turns).await.unwrap();

        // The failure never surfaced as an error, and the loop produced a
        // final answer.
        assert_eq!(final_turn.text(), "I could not divide by zero.");
        let stored = store.turns("t1").await.unwrap();
        assert!(stored[2].content.contains("division by zero"));
    }

    #[tokio::test]
    async fn unknown_tool_yields_synthetic_result_and_loop_continues() {
        let store = setup_store().await;
        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(ToolRegistry::new()),
            Arc::new(ScriptedExecutor::new(vec![
                ModelOutput::ToolCalls(vec![tool_call("call_1", "imaginary")]),
                ModelOutput::Final("recovered".into()),
            ])),
            OrchestratorConfig::default(),
        );

        let turns = seed_user_turn(&store, "t1", "use a tool").await;
        let final_turn = orchestrator.run("t1", turns).await.unwrap();
        assert_eq!(final_turn.text(), "recovered");

        let stored = store.turns("t1").await.unwrap();
        assert_eq!(stored[2].role, "tool_result");
        assert!(stored[2].content.contains("unknown tool: imaginary"));
    }

    #[tokio::test]
    async fn loop_bound_terminates_with_typed_error() {
        let store = setup_store().await;
        let invocations = Arc::new(AtomicUsize::new(0));
        let registry = ToolRegistry::new().with(Arc::new(CountingTool {
            invocations: invocations.clone(),
        }));

        let config = OrchestratorConfig { max_tool_rounds: 3 };
        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(registry),
            Arc::new(LoopingExecutor),
            config,
        );

        let turns = seed_user_turn(&store, "t1", "loop forever").await;
        let result = orchestrator.run("t1", turns).await;

        assert!(matches!(
            result,
            Err(EngineError::ToolLoopExceeded { max_rounds: 3, .. })
        ));
        // Exactly the configured number of round-trips executed tools.
        assert_eq!(invocations.load(Ordering::SeqCst), 3);

        // Prior turns remain valid and persisted: user + 3 × (call + result).
        let stored = store.turns("t1").await.unwrap();
        assert_eq!(stored.len(), 1 + 3 * 2);
    }

    #[tokio::test]
    async fn streaming_forwards_fragments_in_order() {
        let store = setup_store().await;
        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(ToolRegistry::new()),
            Arc::new(ScriptedExecutor::new(vec![ModelOutput::Final(
                "streamed answer".into(),
            )])),
            OrchestratorConfig::default(),
        );

        let turns = seed_user_turn(&store, "t1", "stream please").await;
        let mut fragments: Vec<String> = Vec::new();
        let final_turn = orchestrator
            .run_streaming("t1", turns, &mut |t| fragments.push(t.to_owned()))
            .await
            .unwrap();

        assert_eq!(fragments.concat(), "streamed answer");
        assert_eq!(final_turn.text(), "streamed answer");
    }
}
