//! Per-thread document retrieval.
//!
//! - [`chunker`] -- overlapping-window text splitting.
//! - [`embed`] -- embedding backends (HTTP and deterministic fallback).
//! - [`index`] -- the in-memory cosine-similarity index.
//! - [`manager`] -- index lifecycle, keyed by thread.

pub mod chunker;
pub mod embed;
pub mod index;
pub mod manager;

pub use chunker::{Chunk, Chunker, ChunkerConfig};
pub use embed::{Embedder, HashEmbedder, HttpEmbedder};
pub use index::{ChunkSource, DocumentIndex, ScoredChunk};
pub use manager::{DEFAULT_TOP_K, IngestReport, RetrievalIndexManager};
