//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait covers everything the pipeline needs from a
//! vector store: idempotent schema creation, batched upserts, filtered
//! nearest-neighbor queries and an explicit release of the connection.
//! Backends: [`memory::InMemoryIndex`] here, Weaviate and SQLite in the
//! `confluence-rag` app crate.

pub mod memory;

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::models::{IndexedRecord, RetrievalHit};

/// Name of the collection holding Confluence chunks.
pub const COLLECTION: &str = "ConfluenceChunk";

/// Stored property names, in schema order.
pub mod props {
    pub const PAGE_ID: &str = "page_id";
    pub const TITLE: &str = "title";
    pub const URL: &str = "url";
    pub const CHUNK: &str = "chunk";
    pub const SPACE_KEY: &str = "space_key";
    pub const VERSION: &str = "version";
}

/// Outcome of an upsert: how many records were asked for and how many landed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub requested: usize,
    pub written: usize,
    /// Per-record failure messages reported by the backend.
    pub errors: Vec<String>,
}

impl UpsertReport {
    pub fn complete(count: usize) -> Self {
        Self {
            requested: count,
            written: count,
            errors: Vec::new(),
        }
    }

    /// Turn a short write into [`RagError::IncompleteUpsert`].
    pub fn ensure_complete(self) -> Result<usize> {
        if self.written == self.requested {
            return Ok(self.written);
        }
        let detail = match self.errors.first() {
            Some(first) if self.errors.len() > 1 => {
                format!("{} (and {} more errors)", first, self.errors.len() - 1)
            }
            Some(first) => first.clone(),
            None => "backend reported no error detail".to_string(),
        };
        Err(RagError::IncompleteUpsert {
            requested: self.requested,
            written: self.written,
            detail,
        })
    }
}

/// Abstract vector store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_schema`](VectorIndex::ensure_schema) | Create the collection if missing |
/// | [`upsert`](VectorIndex::upsert) | Insert records (batched internally) |
/// | [`query`](VectorIndex::query) | Nearest neighbors, optional `space_key` filter |
/// | [`close`](VectorIndex::close) | Release the connection |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the backing collection if it does not exist. Repeated calls
    /// are no-ops.
    async fn ensure_schema(&self) -> Result<()>;

    /// Insert `records`. Per-record failures are counted in the report
    /// rather than aborting the whole call; transport failures are errors.
    async fn upsert(&self, records: Vec<IndexedRecord>) -> Result<UpsertReport>;

    /// Return up to `top_k` records nearest to `vector` by cosine distance,
    /// ascending. `space_key` restricts results to an exact match.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        space_key: Option<&str>,
    ) -> Result<Vec<RetrievalHit>>;

    /// Release the underlying connection.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Reject filters that cannot match anything meaningful.
pub fn validate_space_filter(space_key: Option<&str>) -> Result<Option<&str>> {
    match space_key {
        Some(key) if key.trim().is_empty() => Err(RagError::Index(
            "malformed filter: space_key must not be empty".to_string(),
        )),
        other => Ok(other),
    }
}

/// Ensure every record in a batch has the same dimensionality as `expected`
/// (or as the first record when `expected` is `None`).
pub fn check_dims(records: &[IndexedRecord], expected: Option<usize>) -> Result<Option<usize>> {
    let mut dims = expected;
    for record in records {
        match dims {
            None => dims = Some(record.dims()),
            Some(d) if d != record.dims() => {
                return Err(RagError::Index(format!(
                    "vector dimension mismatch: expected {}, got {} (page {})",
                    d,
                    record.dims(),
                    record.chunk.page_id
                )));
            }
            Some(_) => {}
        }
    }
    Ok(dims)
}
