//! Document retrieval tool.
//!
//! Bridges the model to the engine's per-thread retrieval index.  The
//! orchestrator supplies the thread key through the invocation context, so
//! the model only ever passes a query — it cannot read another thread's
//! document.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use colloquy_engine::{
    InvocationContext, RetrievalIndexManager, Tool, ToolDefinition, ToolError,
    retrieval::DEFAULT_TOP_K,
};

use crate::params::{optional_usize, require_str};

/// Searches the current thread's uploaded document.
pub struct RetrieveDocumentTool {
    retrieval: Arc<RetrievalIndexManager>,
}

impl RetrieveDocumentTool {
    /// Create the retrieval tool over the shared index manager.
    pub fn new(retrieval: Arc<RetrievalIndexManager>) -> Self {
        Self { retrieval }
    }
}

#[async_trait]
impl Tool for RetrieveDocumentTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "retrieve_document".into(),
            description: "Search the document uploaded to this conversation \
                          and return the most relevant passages. Use this \
                          whenever the user asks about the uploaded document."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to look for in the document"
                    },
                    "k": {
                        "type": "integer",
                        "description": "Number of passages to return (default: 3)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn invoke(&self, arguments: Value, ctx: &InvocationContext) -> Result<Value, ToolError> {
        let query = require_str(&arguments, "query", "retrieve_document")?;
        let k = optional_usize(&arguments, "k", DEFAULT_TOP_K);

        debug!(thread_key = %ctx.thread_key, query, k, "retrieving document passages");

        let hits = self
            .retrieval
            .query(&ctx.thread_key, query, k)
            .await
            .map_err(|e| ToolError::Failed {
                tool_name: "retrieve_document".into(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| ToolError::Failed {
                tool_name: "retrieve_document".into(),
                reason: "no document indexed".into(),
            })?;

        let results: Vec<Value> = hits
            .iter()
            .map(|h| {
                json!({
                    "chunk_text": h.text,
                    "score": h.score,
                    "source": {
                        "filename": h.source.filename,
                        "chunk_index": h.source.chunk_index,
                    }
                })
            })
            .collect();

        Ok(json!({ "results": results }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_engine::HashEmbedder;

    fn ctx(thread_key: &str) -> InvocationContext {
        InvocationContext {
            thread_key: thread_key.into(),
        }
    }

    fn tool_with_manager() -> (RetrieveDocumentTool, Arc<RetrievalIndexManager>) {
        let manager = Arc::new(RetrievalIndexManager::new(Arc::new(HashEmbedder::new())));
        (RetrieveDocumentTool::new(manager.clone()), manager)
    }

    #[tokio::test]
    async fn no_index_reports_no_document() {
        let (tool, _manager) = tool_with_manager();
        let err = tool
            .invoke(json!({"query": "anything"}), &ctx("t1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no document indexed");
    }

    #[tokio::test]
    async fn returns_passages_with_source_metadata() {
        let (tool, manager) = tool_with_manager();
        manager
            .ingest(
                "t1",
                b"The quarterly report shows revenue grew by twelve percent.",
                "report.txt",
            )
            .await
            .unwrap();

        let result = tool
            .invoke(json!({"query": "revenue growth"}), &ctx("t1"))
            .await
            .unwrap();

        let results = result["results"].as_array().unwrap();
        assert!(!results.is_empty());
        assert!(results[0]["chunk_text"]
            .as_str()
            .unwrap()
            .contains("revenue"));
        assert_eq!(results[0]["source"]["filename"], "report.txt");
    }

    #[tokio::test]
    async fn queries_are_scoped_to_the_invoking_thread() {
        let (tool, manager) = tool_with_manager();
        manager
            .ingest("a", b"thread a's private document", "a.txt")
            .await
            .unwrap();

        let err = tool
            .invoke(json!({"query": "private"}), &ctx("b"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no document indexed");
    }
}
