//! Data types that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Title shown for hits whose stored record carries no title.
pub const UNTITLED: &str = "Untitled";

/// A contiguous, whitespace-normalized slice of one page's plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub page_id: String,
    pub title: String,
    pub url: String,
    pub text: String,
    pub space_key: String,
    pub version: u32,
    /// Position of this window within its page, starting at 0.
    pub chunk_index: usize,
}

/// A [`Chunk`] plus its unit-length embedding, as written to a vector index.
#[derive(Debug, Clone)]
pub struct IndexedRecord {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

impl IndexedRecord {
    /// Pair a chunk with its vector.
    ///
    /// Rejects empty vectors and vectors containing NaN or infinity; the
    /// embedder is responsible for normalization.
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Result<Self> {
        if vector.is_empty() {
            return Err(RagError::Embedding(format!(
                "empty vector for page {} chunk {}",
                chunk.page_id, chunk.chunk_index
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(RagError::Embedding(format!(
                "non-finite vector for page {} chunk {}",
                chunk.page_id, chunk.chunk_index
            )));
        }
        Ok(Self { chunk, vector })
    }

    pub fn dims(&self) -> usize {
        self.vector.len()
    }
}

/// A record returned by a nearest-neighbor query.
///
/// Stores may hand back records with missing properties. `title`,
/// `space_key` and `version` stay `None` in that case; `url` and `text`
/// become empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub page_id: String,
    pub title: Option<String>,
    pub url: String,
    pub text: String,
    pub space_key: Option<String>,
    pub version: Option<u32>,
    /// Cosine distance to the query vector; lower is more similar.
    pub distance: f32,
}

impl RetrievalHit {
    /// Build a hit from a stored chunk and its distance to the query.
    pub fn from_chunk(chunk: &Chunk, distance: f32) -> Self {
        Self {
            page_id: chunk.page_id.clone(),
            title: Some(chunk.title.clone()).filter(|t| !t.is_empty()),
            url: chunk.url.clone(),
            text: chunk.text.clone(),
            space_key: Some(chunk.space_key.clone()).filter(|s| !s.is_empty()),
            version: Some(chunk.version),
            distance,
        }
    }

    /// The title to display, falling back to [`UNTITLED`].
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(UNTITLED)
    }
}

/// Final output of the read path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundedAnswer {
    pub answer: String,
    pub sources: Vec<RetrievalHit>,
}

/// Counts reported by an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub pages_indexed: usize,
    pub chunks_indexed: usize,
}
