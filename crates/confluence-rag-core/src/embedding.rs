//! Embedder trait and vector utilities.
//!
//! Every backend returns L2-normalized vectors so that the dot product of a
//! query vector and a stored vector is their cosine similarity. The same
//! embedder instance must serve both ingestion and query time.
//!
//! Concrete model-backed embedders (fastembed, Ollama) live in the
//! `confluence-rag` app crate. [`HashEmbedder`] is a deterministic,
//! dependency-free backend for offline runs and tests.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{RagError, Result};

/// Text-to-vector backend.
///
/// Implementations are shared behind `Arc<dyn Embedder>` and must tolerate
/// concurrent calls.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Returns the output dimensionality.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one unit vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("empty embedding response".to_string()))
    }
}

/// Validate a backend's raw batch output and normalize every vector.
///
/// Fails when the backend returned a different number of vectors than it
/// was given texts, or a vector of the wrong dimensionality.
pub fn finish_batch(
    expected: usize,
    dims: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(RagError::Embedding(format!(
            "model returned {} vectors for {} inputs",
            vectors.len(),
            expected
        )));
    }
    vectors
        .into_iter()
        .map(|mut v| {
            if v.len() != dims {
                return Err(RagError::Embedding(format!(
                    "model returned {}-dim vector, expected {}",
                    v.len(),
                    dims
                )));
            }
            normalize_l2(&mut v);
            Ok(v)
        })
        .collect()
}

/// Scale `v` to unit length in place. Zero vectors are left unchanged.
pub fn normalize_l2(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Dot product; `0.0` when the lengths differ.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance (`1 - cos`), clamped to `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    (1.0 - cosine_similarity(a, b)).clamp(0.0, 2.0)
}

/// Encode a float vector as little-endian f32 bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode bytes written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Default dimensionality of [`HashEmbedder`].
pub const HASH_EMBEDDER_DIMS: usize = 1024;

/// Deterministic bag-of-words embedder.
///
/// Each lower-cased alphanumeric token is hashed with SHA-256 into one of
/// `dims` buckets; the bucket counts are then normalized. Texts sharing
/// words get positive similarity, which is enough for offline smoke runs and
/// for tests, but there is no semantic understanding.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(RagError::Configuration(
                "hash embedder needs dims > 0".to_string(),
            ));
        }
        Ok(Self { dims })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dims as u64) as usize;
            v[idx] += 1.0;
        }
        normalize_l2(&mut v);
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dims: HASH_EMBEDDER_DIMS,
        }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
