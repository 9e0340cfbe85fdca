//! In-memory similarity index over document chunks.
//!
//! Built once at ingest time and immutable afterwards — replacement happens
//! at the manager level by swapping the whole index, so queries never
//! observe a partially built one.

use crate::retrieval::chunker::Chunk;

/// Source metadata attached to every query hit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChunkSource {
    /// Filename of the ingested document.
    pub filename: String,
    /// Zero-based chunk position within the document.
    pub chunk_index: usize,
    /// Byte offset of the chunk in the extracted text.
    pub offset: usize,
}

/// One query hit.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// The chunk text.
    pub text: String,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub score: f32,
    /// Where the chunk came from.
    pub source: ChunkSource,
}

/// Immutable similarity index over one document's chunks.
pub struct DocumentIndex {
    filename: String,
    /// `(embedding, chunk)` pairs in document order.
    entries: Vec<(Vec<f32>, Chunk)>,
}

impl DocumentIndex {
    /// Build an index from embedded chunks.
    pub fn new(filename: impl Into<String>, entries: Vec<(Vec<f32>, Chunk)>) -> Self {
        Self {
            filename: filename.into(),
            entries,
        }
    }

    /// The filename this index was built from.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the `k` chunks most similar to the query embedding, best
    /// first.  Non-positive scores are filtered out.
    pub fn top_k(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(f32, &Chunk)> = self
            .entries
            .iter()
            .map(|(embedding, chunk)| (cosine_similarity(query, embedding), chunk))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .map(|(score, chunk)| ScoredChunk {
                text: chunk.text.clone(),
                score,
                source: ChunkSource {
                    filename: self.filename.clone(),
                    chunk_index: chunk.index,
                    offset: chunk.offset,
                },
            })
            .collect()
    }
}

/// Cosine similarity between two vectors of equal dimension.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            text: text.into(),
            offset: index * 100,
        }
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_handles_mismatched_and_zero_vectors() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn top_k_orders_by_similarity() {
        let index = DocumentIndex::new(
            "doc.txt",
            vec![
                (vec![1.0, 0.0], chunk(0, "exact match")),
                (vec![0.7, 0.7], chunk(1, "partial match")),
                (vec![-1.0, 0.0], chunk(2, "opposite")),
            ],
        );

        let hits = index.top_k(&[1.0, 0.0], 3);
        // The opposite vector scores negative and is filtered.
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "exact match");
        assert_eq!(hits[1].text, "partial match");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn top_k_caps_at_k() {
        let entries = (0..10)
            .map(|i| (vec![1.0, 0.1 * i as f32], chunk(i, "chunk")))
            .collect();
        let index = DocumentIndex::new("doc.txt", entries);
        assert_eq!(index.top_k(&[1.0, 0.0], 3).len(), 3);
    }

    #[test]
    fn hits_carry_source_metadata() {
        let index = DocumentIndex::new("paper.pdf", vec![(vec![1.0], chunk(4, "quote"))]);
        let hits = index.top_k(&[1.0], 1);
        assert_eq!(hits[0].source.filename, "paper.pdf");
        assert_eq!(hits[0].source.chunk_index, 4);
        assert_eq!(hits[0].source.offset, 400);
    }
}
