//! Per-thread retrieval index lifecycle.
//!
//! Each thread owns at most one live [`DocumentIndex`], keyed by thread in a
//! concurrent map.  Ingest extracts text, chunks, embeds, builds the index
//! off to the side, and installs it with a single map insert — concurrent
//! queries see either the old index fully or the new one fully, never a
//! partially swapped state.  Last ingest wins.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{EngineError, Result};
use crate::retrieval::chunker::Chunker;
use crate::retrieval::embed::Embedder;
use crate::retrieval::index::{DocumentIndex, ScoredChunk};

/// Default number of chunks returned per query.
pub const DEFAULT_TOP_K: usize = 3;

/// What an ingest produced.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct IngestReport {
    /// Number of source documents extracted (PDF pages count individually).
    pub document_count: usize,
    /// Number of chunks indexed.
    pub chunk_count: usize,
}

/// Owns the per-thread retrieval indexes.
pub struct RetrievalIndexManager {
    indexes: DashMap<String, Arc<DocumentIndex>>,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
}

impl RetrievalIndexManager {
    /// Create a manager using the given embedder.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            indexes: DashMap::new(),
            chunker: Chunker::default(),
            embedder,
        }
    }

    /// Ingest a document for a thread, replacing any prior index.
    ///
    /// Unreadable or empty input fails with [`EngineError::IngestFailed`];
    /// the caller converts that into structured `{error}` data at the
    /// public boundary.
    pub async fn ingest(
        &self,
        thread_key: &str,
        bytes: &[u8],
        filename: &str,
    ) -> Result<IngestReport> {
        let (text, document_count) = extract_text(bytes, filename)?;

        let chunks = self.chunker.chunk(&text);
        if chunks.is_empty() {
            return Err(EngineError::IngestFailed {
                reason: format!("document `{filename}` contains no indexable text"),
            });
        }

        let mut entries = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = self.embedder.embed(&chunk.text).await?;
            entries.push((embedding, chunk));
        }

        let chunk_count = entries.len();
        let index = Arc::new(DocumentIndex::new(filename, entries));

        // Single insert: the swap is atomic from a reader's perspective.
        self.indexes.insert(thread_key.to_owned(), index);

        tracing::info!(
            thread_key = %thread_key,
            filename = %filename,
            document_count,
            chunk_count,
            "document ingested"
        );

        Ok(IngestReport {
            document_count,
            chunk_count,
        })
    }

    /// Query a thread's index for the `k` most similar chunks.
    ///
    /// Returns `None` when the thread has no live index.
    pub async fn query(
        &self,
        thread_key: &str,
        text: &str,
        k: usize,
    ) -> Result<Option<Vec<ScoredChunk>>> {
        // Clone the Arc out so the map shard lock is not held across the
        // embedding await.
        let index = match self.indexes.get(thread_key) {
            Some(entry) => Arc::clone(entry.value()),
            None => return Ok(None),
        };

        let query_embedding = self.embedder.embed(text).await?;
        Ok(Some(index.top_k(&query_embedding, k)))
    }

    /// Whether a thread currently has a live index.
    pub fn has_index(&self, thread_key: &str) -> bool {
        self.indexes.contains_key(thread_key)
    }

    /// Drop a thread's index, if any.
    pub fn evict(&self, thread_key: &str) {
        if self.indexes.remove(thread_key).is_some() {
            tracing::debug!(thread_key = %thread_key, "retrieval index evicted");
        }
    }
}

// ---------------------------------------------------------------------------
// Text extraction
// ---------------------------------------------------------------------------

/// Extract plain text from uploaded bytes.
///
/// PDFs go through `pdf-extract`; anything else is treated as UTF-8 text.
/// Returns the text plus a document count (PDF pages are separated by form
/// feeds in the extracted text; plain text counts as one document).
fn extract_text(bytes: &[u8], filename: &str) -> Result<(String, usize)> {
    if bytes.is_empty() {
        return Err(EngineError::IngestFailed {
            reason: format!("document `{filename}` is empty"),
        });
    }

    let text = if bytes.starts_with(b"%PDF") {
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| EngineError::IngestFailed {
            reason: format!("failed to extract text from `{filename}`: {e}"),
        })?
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };

    if text.trim().is_empty() {
        return Err(EngineError::IngestFailed {
            reason: format!("document `{filename}` contains no extractable text"),
        });
    }

    let document_count = text
        .split('\u{c}')
        .filter(|page| !page.trim().is_empty())
        .count()
        .max(1);

    Ok((text, document_count))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
