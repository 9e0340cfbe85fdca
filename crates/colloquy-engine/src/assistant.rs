//! The public face of the engine.
//!
//! [`Assistant`] owns the store, the tool registry, the turn executor, and
//! the retrieval manager, and exposes the operations a presentation layer
//! consumes: submit/stream a user message, create and list threads, read
//! history, upload a document.
//!
//! Requests on the same thread key are serialized through a per-thread
//! async mutex — turn append order defines conversation semantics, so two
//! interleaved requests on one thread would corrupt tool-call linkage.
//! Requests on different threads run fully in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use colloquy_store::{ThreadMeta, ThreadStore};

use crate::error::Result;
use crate::executor::TurnExecutor;
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::registry::ToolRegistry;
use crate::retrieval::{IngestReport, RetrievalIndexManager};
use crate::turn::{Role, Turn};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Maximum length of a derived thread title, in characters.
const TITLE_MAX_CHARS: usize = 40;

/// Capacity of the fragment channel handed to streaming consumers.
const STREAM_BUFFER: usize = 64;

/// One entry in the external view of a thread's history.
///
/// Tool traffic is internal and excluded from this view.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// `user` or `assistant`.
    pub role: Role,
    /// Normalized text content.
    pub content: String,
}

/// Items delivered on a streaming response channel: zero or more fragments,
/// terminated by exactly one `Final` or `Failed`.
#[derive(Debug)]
pub enum StreamItem {
    /// An incremental piece of the answer text, in emission order.
    Fragment(String),
    /// The completed final turn.
    Final(Turn),
    /// The request failed; prior fragments (if any) are partial output.
    Failed(String),
}

// ---------------------------------------------------------------------------
// Assistant
// ---------------------------------------------------------------------------

/// The conversational assistant engine.
///
/// Cheap to clone; all state is shared behind `Arc`s.
#[derive(Clone)]
pub struct Assistant {
    store: ThreadStore,
    orchestrator: Arc<Orchestrator>,
    retrieval: Arc<RetrievalIndexManager>,
    /// Per-thread request serialization.
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Assistant {
    /// Wire up an assistant from its parts.
    pub fn new(
        store: ThreadStore,
        registry: Arc<ToolRegistry>,
        executor: Arc<dyn TurnExecutor>,
        retrieval: Arc<RetrievalIndexManager>,
        config: OrchestratorConfig,
    ) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            registry,
            executor,
            config,
        ));

        Self {
            store,
            orchestrator,
            retrieval,
            locks: Arc::new(DashMap::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Threads
    // -----------------------------------------------------------------------

    /// Generate a fresh thread key.  No store side effect until the first
    /// message arrives.
    pub fn create_thread(&self) -> String {
        Uuid::now_v7().to_string()
    }

    /// All threads that have at least one turn, most recently updated first.
    pub async fn list_threads(&self) -> Result<Vec<ThreadMeta>> {
        Ok(self.store.list_threads().await?)
    }

    /// The external view of a thread's history: user and assistant text
    /// turns only.
    pub async fn get_history(&self, thread_key: &str) -> Result<Vec<HistoryEntry>> {
        let turns = self.load_turns(thread_key).await?;
        Ok(turns
            .iter()
            .filter(|t| {
                matches!(t.role, Role::User | Role::Assistant)
                    && t.tool_calls.is_empty()
                    && !t.content.is_empty()
            })
            .map(|t| HistoryEntry {
                role: t.role,
                content: t.text(),
            })
            .collect())
    }

    /// The complete turn sequence of a thread, tool traffic included.
    pub async fn get_full_history(&self, thread_key: &str) -> Result<Vec<Turn>> {
        self.load_turns(thread_key).await
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    /// Submit a user message and block until the final assistant turn.
    pub async fn submit_user_message(&self, thread_key: &str, text: &str) -> Result<Turn> {
        let lock = self.thread_lock(thread_key);
        let _guard = lock.lock().await;

        let turns = self.begin_request(thread_key, text).await?;
        self.orchestrator.run(thread_key, turns).await
    }

    /// Submit a user message and stream the answer.
    ///
    /// Returns a bounded channel delivering [`StreamItem`]s: fragments in
    /// emission order, then `Final` (or `Failed`).  Dropping the receiver
    /// abandons delivery; the request still runs to completion so the store
    /// stays consistent, which is safe because tool effects are read-only
    /// or idempotent.
    pub async fn stream_user_message(
        &self,
        thread_key: &str,
        text: &str,
    ) -> mpsc::Receiver<StreamItem> {
        let (out_tx, out_rx) = mpsc::channel::<StreamItem>(STREAM_BUFFER);

        // Fragments are produced by a synchronous callback deep in the SSE
        // read loop; an unbounded relay decouples that callback from the
        // bounded consumer-facing channel, where backpressure applies.
        let (relay_tx, mut relay_rx) = mpsc::unbounded_channel::<StreamItem>();

        tokio::spawn(async move {
            while let Some(item) = relay_rx.recv().await {
                if out_tx.send(item).await.is_err() {
                    // Receiver dropped: consumer cancelled, stop forwarding.
                    break;
                }
            }
        });

        let assistant = self.clone();
        let thread_key = thread_key.to_owned();
        let text = text.to_owned();

        tokio::spawn(async move {
            let lock = assistant.thread_lock(&thread_key);
            let _guard = lock.lock().await;

            let turns = match assistant.begin_request(&thread_key, &text).await {
                Ok(turns) => turns,
                Err(e) => {
                    let _ = relay_tx.send(StreamItem::Failed(e.to_string()));
                    return;
                }
            };

            let fragment_tx = relay_tx.clone();
            let result = assistant
                .orchestrator
                .run_streaming(&thread_key, turns, &mut |fragment| {
                    let _ = fragment_tx.send(StreamItem::Fragment(fragment.to_owned()));
                })
                .await;

            let terminal = match result {
                Ok(turn) => StreamItem::Final(turn),
                Err(e) => StreamItem::Failed(e.to_string()),
            };
            let _ = relay_tx.send(terminal);
        });

        out_rx
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    /// Ingest a document for a thread, replacing any prior index.
    pub async fn upload_document(
        &self,
        thread_key: &str,
        bytes: &[u8],
        filename: &str,
    ) -> Result<IngestReport> {
        self.retrieval.ingest(thread_key, bytes, filename).await
    }

    /// Access to the retrieval manager, for tool wiring.
    pub fn retrieval(&self) -> &Arc<RetrievalIndexManager> {
        &self.retrieval
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Load history, append the new user turn durably, and derive the
    /// thread title on first contact.
    async fn begin_request(&self, thread_key: &str, text: &str) -> Result<Vec<Turn>> {
        let mut turns = self.load_turns(thread_key).await?;
        let first_contact = turns.is_empty();

        let user_turn = Turn::user(text);
        self.store
            .append(thread_key, user_turn.to_stored()?)
            .await?;

        if first_contact {
            self.store
                .set_title(thread_key, &derive_title(text))
                .await?;
        }

        turns.push(user_turn);
        Ok(turns)
    }

    async fn load_turns(&self, thread_key: &str) -> Result<Vec<Turn>> {
        let rows = self.store.turns(thread_key).await?;
        rows.iter().map(Turn::from_stored).collect()
    }

    fn thread_lock(&self, thread_key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(thread_key.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Derive a display title from the first user message.
fn derive_title(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        trimmed.to_owned()
    } else {
        let cut: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
        format!("{cut}...")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_titles_pass_through() {
        assert_eq!(derive_title("  hello there  "), "hello there");
    }

    #[test]
    fn long_titles_are_truncated_with_ellipsis() {
        let long = "x".repeat(100);
        let title = derive_title(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
        assert!(title.ends_with("..."));
    }
}
