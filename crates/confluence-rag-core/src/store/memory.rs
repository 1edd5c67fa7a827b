//! In-memory [`VectorIndex`] for tests and embedded use.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`; queries are a
//! brute-force cosine scan. Nothing is persisted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::error::{RagError, Result};
use crate::models::{IndexedRecord, RetrievalHit};

use super::{check_dims, validate_space_filter, UpsertReport, VectorIndex, COLLECTION};

#[derive(Default)]
struct State {
    schema_ready: bool,
    dims: Option<usize>,
    records: Vec<IndexedRecord>,
}

/// In-memory vector index.
#[derive(Default)]
pub struct InMemoryIndex {
    state: RwLock<State>,
    upsert_calls: AtomicUsize,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.read().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of times [`VectorIndex::upsert`] has been called.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| RagError::Index("in-memory index lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| RagError::Index("in-memory index lock poisoned".to_string()))
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_schema(&self) -> Result<()> {
        self.write()?.schema_ready = true;
        Ok(())
    }

    async fn upsert(&self, records: Vec<IndexedRecord>) -> Result<UpsertReport> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.write()?;
        if !state.schema_ready {
            return Err(RagError::Index(format!(
                "collection {} does not exist",
                COLLECTION
            )));
        }
        state.dims = check_dims(&records, state.dims)?;
        let count = records.len();
        state.records.extend(records);
        Ok(UpsertReport::complete(count))
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        space_key: Option<&str>,
    ) -> Result<Vec<RetrievalHit>> {
        let space_key = validate_space_filter(space_key)?;
        let state = self.read()?;
        if top_k == 0 || !state.schema_ready {
            return Ok(Vec::new());
        }
        if let Some(d) = state.dims {
            if d != vector.len() {
                return Err(RagError::Index(format!(
                    "query vector has {} dims, index holds {}",
                    vector.len(),
                    d
                )));
            }
        }

        let mut hits: Vec<RetrievalHit> = state
            .records
            .iter()
            .filter(|r| space_key.map_or(true, |k| r.chunk.space_key == k))
            .map(|r| RetrievalHit::from_chunk(&r.chunk, cosine_distance(vector, &r.vector)))
            .collect();

        // Stable: equal distances keep insertion order.
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn record(page: &str, space: &str, text: &str, vector: Vec<f32>) -> IndexedRecord {
        IndexedRecord::new(
            Chunk {
                page_id: page.to_string(),
                title: format!("Page {}", page),
                url: format!("https://wiki.example.com/wiki/pages/{}", page),
                text: text.to_string(),
                space_key: space.to_string(),
                version: 1,
                chunk_index: 0,
            },
            vector,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_query_orders_by_distance_and_filters() {
        let index = InMemoryIndex::new();
        index.ensure_schema().await.unwrap();
        index
            .upsert(vec![
                record("1", "ARCH", "far", vec![0.0, 1.0]),
                record("2", "ARCH", "near", vec![1.0, 0.0]),
                record("3", "OPS", "nearest elsewhere", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].page_id, "2");
        assert_eq!(hits[1].page_id, "3");
        assert!(hits[0].distance.abs() < 1e-6);
        assert!((hits[2].distance - 1.0).abs() < 1e-6);

        let arch = index.query(&[1.0, 0.0], 10, Some("ARCH")).await.unwrap();
        assert_eq!(arch.len(), 2);
        assert!(arch.iter().all(|h| h.space_key.as_deref() == Some("ARCH")));

        let top1 = index.query(&[1.0, 0.0], 1, None).await.unwrap();
        assert_eq!(top1.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let index = InMemoryIndex::new();
        index.ensure_schema().await.unwrap();
        assert!(index.query(&[1.0, 0.0], 8, None).await.unwrap().is_empty());
        assert!(index.query(&[1.0, 0.0], 0, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_schema_idempotent() {
        let index = InMemoryIndex::new();
        index.ensure_schema().await.unwrap();
        index.ensure_schema().await.unwrap();
        index
            .upsert(vec![record("1", "ARCH", "x", vec![1.0])])
            .await
            .unwrap();
        index.ensure_schema().await.unwrap();
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_without_schema_fails() {
        let index = InMemoryIndex::new();
        let err = index
            .upsert(vec![record("1", "ARCH", "x", vec![1.0])])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = InMemoryIndex::new();
        index.ensure_schema().await.unwrap();
        index
            .upsert(vec![record("1", "ARCH", "x", vec![1.0, 0.0])])
            .await
            .unwrap();
        assert!(index
            .upsert(vec![record("2", "ARCH", "y", vec![1.0, 0.0, 0.0])])
            .await
            .is_err());
        assert!(index.query(&[1.0], 3, None).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_filter_rejected() {
        let index = InMemoryIndex::new();
        index.ensure_schema().await.unwrap();
        assert!(index.query(&[1.0], 3, Some("")).await.is_err());
    }
}
