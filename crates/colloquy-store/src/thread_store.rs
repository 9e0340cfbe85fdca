//! Durable, append-only conversation storage.
//!
//! Each thread owns an ordered sequence of turns keyed by
//! `(thread_key, seq)`. Turns are never rewritten or deleted once
//! committed — the only mutations are appends and whole-thread removal.
//! Every append is a durable write: when [`ThreadStore::append`] returns
//! `Ok`, the turn survives a process restart.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// Metadata for a conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMeta {
    /// Opaque unique key (UUID v7 in practice; any unique string works).
    pub thread_key: String,
    /// Display title, derived from the first user message. `None` until set.
    pub title: Option<String>,
    /// Number of turns appended so far.
    pub turn_count: i64,
    /// Unix timestamp of the first append.
    pub created_at: i64,
    /// Unix timestamp of the most recent append.
    pub updated_at: i64,
}

/// A single stored turn, exactly as persisted.
///
/// `content` and `tool_calls` hold JSON produced by the engine layer; the
/// store treats them as opaque text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTurn {
    /// Auto-incrementing row ID.
    pub id: i64,
    /// The thread this turn belongs to.
    pub thread_key: String,
    /// Zero-based position within the thread.
    pub seq: i64,
    /// Turn role: "user", "assistant", or "tool_result".
    pub role: String,
    /// JSON-serialized turn content.
    pub content: String,
    /// JSON-serialized tool calls (assistant turns only).
    pub tool_calls: Option<String>,
    /// Back-reference to the requesting tool call (tool_result turns only).
    pub tool_call_id: Option<String>,
    /// Unix timestamp when the turn was committed.
    pub created_at: i64,
}

/// The fields of a turn to append, supplied by the engine layer.
#[derive(Debug, Clone)]
pub struct NewTurn {
    pub role: String,
    pub content: String,
    pub tool_calls: Option<String>,
    pub tool_call_id: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════
//  ThreadStore
// ═══════════════════════════════════════════════════════════════════════

/// Append-only access to conversation threads and their turns.
#[derive(Clone)]
pub struct ThreadStore {
    db: Database,
}

impl ThreadStore {
    /// Create a new thread store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append a turn to the end of a thread's sequence, durably.
    ///
    /// Creates the thread row on first append. The thread row insert, the
    /// turn insert, and the `turn_count` bump commit in one transaction, so
    /// a crash mid-append leaves no partial state. Returns the sequence
    /// number assigned to the new turn.
    #[instrument(skip(self, turn), fields(thread_key = %thread_key, role = %turn.role))]
    pub async fn append(&self, thread_key: &str, turn: NewTurn) -> StoreResult<i64> {
        if thread_key.is_empty() {
            return Err(StoreError::InvalidArgument(
                "thread_key must not be empty".into(),
            ));
        }

        let thread_key = thread_key.to_string();
        let now = Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                conn.execute_batch("BEGIN IMMEDIATE;")?;

                let result = (|| -> StoreResult<i64> {
                    conn.execute(
                        "INSERT INTO threads (thread_key, title, turn_count, created_at, updated_at) \
                         VALUES (?1, NULL, 0, ?2, ?2) \
                         ON CONFLICT(thread_key) DO NOTHING",
                        rusqlite::params![thread_key, now],
                    )?;

                    let seq: i64 = conn.query_row(
                        "SELECT turn_count FROM threads WHERE thread_key = ?1",
                        rusqlite::params![thread_key],
                        |row| row.get(0),
                    )?;

                    conn.execute(
                        "INSERT INTO turns (thread_key, seq, role, content, tool_calls, tool_call_id, created_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        rusqlite::params![
                            thread_key,
                            seq,
                            turn.role,
                            turn.content,
                            turn.tool_calls,
                            turn.tool_call_id,
                            now
                        ],
                    )?;

                    conn.execute(
                        "UPDATE threads SET turn_count = turn_count + 1, updated_at = ?2 \
                         WHERE thread_key = ?1",
                        rusqlite::params![thread_key, now],
                    )?;

                    Ok(seq)
                })();

                match &result {
                    Ok(_) => {
                        conn.execute_batch("COMMIT;")?;
                    }
                    Err(_) => {
                        let _ = conn.execute_batch("ROLLBACK;");
                    }
                }

                result
            })
            .await
    }

    /// Return a thread's full turn history in sequence order.
    ///
    /// Unknown threads yield an empty vector, not an error.
    #[instrument(skip(self))]
    pub async fn turns(&self, thread_key: &str) -> StoreResult<Vec<StoredTurn>> {
        let thread_key = thread_key.to_string();
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, thread_key, seq, role, content, tool_calls, tool_call_id, created_at \
                     FROM turns WHERE thread_key = ?1 ORDER BY seq ASC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![thread_key], |row| {
                        Ok(StoredTurn {
                            id: row.get(0)?,
                            thread_key: row.get(1)?,
                            seq: row.get(2)?,
                            role: row.get(3)?,
                            content: row.get(4)?,
                            tool_calls: row.get(5)?,
                            tool_call_id: row.get(6)?,
                            created_at: row.get(7)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// Enumerate every thread that has at least one append.
    ///
    /// The primary key deduplicates; ordering is most-recently-updated
    /// first for display purposes.
    #[instrument(skip(self))]
    pub async fn list_threads(&self) -> StoreResult<Vec<ThreadMeta>> {
        self.db
            .execute(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT thread_key, title, turn_count, created_at, updated_at \
                     FROM threads ORDER BY updated_at DESC",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(ThreadMeta {
                            thread_key: row.get(0)?,
                            title: row.get(1)?,
                            turn_count: row.get(2)?,
                            created_at: row.get(3)?,
                            updated_at: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// Fetch a single thread's metadata, or `None` if it has never been
    /// written to.
    #[instrument(skip(self))]
    pub async fn get(&self, thread_key: &str) -> StoreResult<Option<ThreadMeta>> {
        let thread_key = thread_key.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT thread_key, title, turn_count, created_at, updated_at \
                     FROM threads WHERE thread_key = ?1",
                    rusqlite::params![thread_key],
                    |row| {
                        Ok(ThreadMeta {
                            thread_key: row.get(0)?,
                            title: row.get(1)?,
                            turn_count: row.get(2)?,
                            created_at: row.get(3)?,
                            updated_at: row.get(4)?,
                        })
                    },
                );
                match result {
                    Ok(meta) => Ok(Some(meta)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Set a thread's display title if it does not already have one.
    ///
    /// Later calls are no-ops: the title is derived from the first user
    /// message and never changes afterwards.
    #[instrument(skip(self, title))]
    pub async fn set_title(&self, thread_key: &str, title: &str) -> StoreResult<()> {
        let thread_key = thread_key.to_string();
        let title = title.to_string();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "UPDATE threads SET title = COALESCE(title, ?2) WHERE thread_key = ?1",
                    rusqlite::params![thread_key, title],
                )?;
                Ok(())
            })
            .await
    }

    /// Delete a thread and its entire turn log (cascade).
    ///
    /// This is the only way a committed turn ever leaves the store.
    #[instrument(skip(self))]
    pub async fn delete(&self, thread_key: &str) -> StoreResult<()> {
        let thread_key = thread_key.to_string();
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM threads WHERE thread_key = ?1",
                    rusqlite::params![thread_key],
                )?;
                if deleted == 0 {
                    return Err(StoreError::NotFound {
                        entity: "thread",
                        id: thread_key,
                    });
                }
                Ok(())
            })
            .await
    }

    /// Number of turns committed to a thread.
    #[instrument(skip(self))]
    pub async fn turn_count(&self, thread_key: &str) -> StoreResult<i64> {
        let thread_key = thread_key.to_string();
        let count = self
            .db
            .execute(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM turns WHERE thread_key = ?1",
                    rusqlite::params![thread_key],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        debug!(count, "turn count");
        Ok(count)
    }
}

// ── tests ────────────────────────────────────────────────────────────
