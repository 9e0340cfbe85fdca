//! Tool trait and registry.
//!
//! Tools are registered once at startup and resolved by name when the model
//! requests them.  The registry owns the "never throw past this point"
//! contract: a tool's `Err` becomes an `{"error": …}` payload that is folded
//! into the conversation as data the model can react to, not a control-flow
//! exception.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{EngineError, Result, ToolError, ToolResult};
use crate::turn::ToolDefinition;

// ---------------------------------------------------------------------------
// Tool trait
// ---------------------------------------------------------------------------

/// Per-request context passed to every tool invocation.
///
/// Carries the identity of the conversation the request belongs to, so tools
/// with thread-scoped state (document retrieval) can find it without global
/// lookups.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// The thread the current request belongs to.
    pub thread_key: String,
}

/// A callable capability the model may request.
///
/// Implementations validate their own arguments and return either a JSON
/// payload or a [`ToolError`]; they never panic on bad input.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's definition: name, description, and input schema.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given JSON arguments.
    async fn invoke(&self, arguments: Value, ctx: &InvocationContext) -> ToolResult<Value>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable set of invocable tools, keyed by name.
///
/// Register everything at process start; the registry is shared read-only
/// afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.  Later registrations under the same name replace
    /// earlier ones.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        tracing::debug!(tool = %name, "registering tool");
        self.tools.insert(name, tool);
    }

    /// Builder-style registration for wiring code.
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Resolve a tool by name.
    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// All registered tool definitions, for declaring to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition()).collect();
        // Deterministic declaration order keeps request bodies stable.
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name.
    ///
    /// Any failure inside the tool is converted into an `{"error": reason}`
    /// payload — the only error this method itself returns is
    /// [`EngineError::UnknownTool`], which the orchestrator treats as
    /// recoverable.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Value,
        ctx: &InvocationContext,
    ) -> Result<Value> {
        let tool = self.resolve(name).ok_or_else(|| EngineError::UnknownTool {
            tool_name: name.to_owned(),
        })?;

        tracing::debug!(tool = %name, thread_key = %ctx.thread_key, "invoking tool");

        match tool.invoke(arguments, ctx).await {
            Ok(payload) => Ok(payload),
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "tool invocation failed");
                Ok(json!({ "error": e.to_string() }))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".into(),
                description: "Echoes its arguments".into(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn invoke(&self, arguments: Value, _ctx: &InvocationContext) -> ToolResult<Value> {
            Ok(arguments)
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "broken".into(),
                description: "Always fails".into(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn invoke(&self, _arguments: Value, _ctx: &InvocationContext) -> ToolResult<Value> {
            Err(ToolError::Failed {
                tool_name: "broken".into(),
                reason: "upstream data missing".into(),
            })
        }
    }

    fn ctx() -> InvocationContext {
        InvocationContext {
            thread_key: "t1".into(),
        }
    }

    #[tokio::test]
    async fn invoke_dispatches_by_name() {
        let registry = ToolRegistry::new().with(Arc::new(EchoTool));
        let result = registry
            .invoke("echo", json!({"x": 1}), &ctx())
            .await
            .unwrap();
        assert_eq!(result["x"], 1);
    }

    #[tokio::test]
    async fn tool_failure_becomes_error_payload() {
        let registry = ToolRegistry::new().with(Arc::new(FailingTool));
        let result = registry.invoke("broken", json!({}), &ctx()).await.unwrap();
        assert_eq!(result["error"], "upstream data missing");
    }

    #[tokio::test]
    async fn unknown_tool_is_a_typed_error() {
        let registry = ToolRegistry::new();
        let result = registry.invoke("missing", json!({}), &ctx()).await;
        assert!(matches!(
            result,
            Err(EngineError::UnknownTool { tool_name }) if tool_name == "missing"
        ));
    }

    #[test]
    fn definitions_are_sorted_by_name() {
        let registry = ToolRegistry::new()
            .with(Arc::new(FailingTool))
            .with(Arc::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "broken");
        assert_eq!(defs[1].name, "echo");
    }
}
