//! # colloquy-store
//!
//! Storage engine for Colloquy.
//!
//! Provides SQLite-backed persistence for conversation threads: an
//! append-only turn log keyed by `(thread_key, seq)` with per-thread
//! metadata for display. WAL mode keeps appends durable without blocking
//! readers.
//!
//! ## Quick start
//!
//! ```ignore
//! use colloquy_store::{Database, NewTurn, ThreadStore};
//!
//! let db = Database::open_and_migrate("data/colloquy.db").await?;
//! let store = ThreadStore::new(db);
//! store.append("thread-1", NewTurn {
//!     role: "user".into(),
//!     content: "\"hello\"".into(),
//!     tool_calls: None,
//!     tool_call_id: None,
//! }).await?;
//! ```

pub mod db;
pub mod error;
pub mod migration;
pub mod thread_store;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use thread_store::{NewTurn, StoredTurn, ThreadMeta, ThreadStore};
