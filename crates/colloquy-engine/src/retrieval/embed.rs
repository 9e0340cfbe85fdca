//! Text embedding backends.
//!
//! [`Embedder`] turns text into a dense vector for similarity search.  The
//! HTTP implementation calls an OpenAI-compatible `/embeddings` endpoint;
//! [`HashEmbedder`] is a deterministic, dependency-free fallback (hashed
//! bag-of-words projection) used when no embedding API is configured and in
//! tests.  Index build and query must go through the same embedder for
//! scores to be comparable.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{EngineError, Result};

/// Maps text to a fixed-dimension embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text.  Returns a non-empty vector on success.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

// ---------------------------------------------------------------------------
// Hashed bag-of-words embedder
// ---------------------------------------------------------------------------

/// Dimension of [`HashEmbedder`] vectors.
const HASH_DIM: usize = 256;

/// Deterministic embedding via hashed bag-of-words.
///
/// Each lowercase alphanumeric token is hashed (FNV-1a); the hash selects a
/// dimension and a sign.  The result is L2-normalized so cosine similarity
/// behaves.  Crude compared to a learned model, but deterministic, offline,
/// and good enough for word-overlap relevance.
#[derive(Debug, Default, Clone)]
pub struct HashEmbedder;

impl HashEmbedder {
    /// Create a new hash embedder.
    pub fn new() -> Self {
        Self
    }

    fn embed_sync(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; HASH_DIM];

        for token in tokenize(text) {
            let h = fnv1a64(token.as_bytes());
            let dim = (h % HASH_DIM as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            vector[dim] += sign;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::embed_sync(text))
    }
}

/// Split into lowercase alphanumeric tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// FNV-1a 64-bit hash.
fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

// ---------------------------------------------------------------------------
// HTTP embedder
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    base_url: String,
    api_key: String,
    model: String,
    http: reqwest::Client,
}

impl HttpEmbedder {
    /// Create a new HTTP embedder.
    ///
    /// `base_url` is the API root (e.g. `https://api.openai.com/v1`).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| EngineError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            http,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({ "model": self.model, "input": text });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::IngestFailed {
                reason: format!("embedding request failed: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(EngineError::IngestFailed {
                reason: format!("embedding API returned {status}: {text}"),
            });
        }

        let v: Value = resp.json().await.map_err(|e| EngineError::IngestFailed {
            reason: format!("invalid embedding response: {e}"),
        })?;

        let embedding: Vec<f32> = v["data"][0]["embedding"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|x| x.as_f64())
                    .map(|x| x as f32)
                    .collect()
            })
            .unwrap_or_default();

        if embedding.is_empty() {
            return Err(EngineError::IngestFailed {
                reason: "embedding API returned an empty vector".into(),
            });
        }

        Ok(embedding)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("the quick brown fox").await.unwrap();
        let b = embedder.embed("the quick brown fox").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_DIM);
    }

    #[tokio::test]
    async fn hash_embedder_output_is_normalized() {
        let embedder = HashEmbedder::new();
        let v = embedder.embed("some words to embed").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn similar_texts_score_higher_than_unrelated() {
        let embedder = HashEmbedder::new();
        let base = embedder.embed("rust async runtime scheduling").await.unwrap();
        let near = embedder.embed("async scheduling in rust").await.unwrap();
        let far = embedder.embed("banana bread baking recipe").await.unwrap();

        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&base, &near) > dot(&base, &far));
    }

    #[test]
    fn tokenize_lowercases_and_splits() {
        let tokens = tokenize("Hello, World! 42");
        assert_eq!(tokens, vec!["hello", "world", "42"]);
    }
}
