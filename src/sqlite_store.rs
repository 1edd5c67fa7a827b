//! SQLite-backed [`VectorIndex`] implementation.
//!
//! A single-file alternative to Weaviate for laptops and CI. Chunks live in
//! one table with their vectors stored as little-endian `f32` BLOBs;
//! queries load the candidate rows and rank them by cosine distance in
//! process, the same brute-force scan the in-memory index uses.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use confluence_rag_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use confluence_rag_core::error::{RagError, Result};
use confluence_rag_core::models::{IndexedRecord, RetrievalHit};
use confluence_rag_core::store::{check_dims, validate_space_filter, UpsertReport, VectorIndex};

use crate::db::{self, index_err};

/// Table holding `ConfluenceChunk` records.
const TABLE: &str = "confluence_chunks";

/// SQLite implementation of the [`VectorIndex`] trait.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (and create if needed) the database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(db::connect(path).await?))
    }

    async fn table_exists(&self) -> Result<bool> {
        sqlx::query_scalar("SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?")
            .bind(TABLE)
            .fetch_one(&self.pool)
            .await
            .map_err(index_err)
    }

    async fn stored_dims(&self) -> Result<Option<usize>> {
        let dims: Option<i64> = sqlx::query_scalar(&format!("SELECT dims FROM {} LIMIT 1", TABLE))
            .fetch_optional(&self.pool)
            .await
            .map_err(index_err)?;
        Ok(dims.map(|d| d as usize))
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", TABLE))
            .fetch_one(&self.pool)
            .await
            .map_err(index_err)?;
        Ok(n as usize)
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page_id TEXT NOT NULL,
                title TEXT,
                url TEXT,
                chunk TEXT NOT NULL,
                space_key TEXT,
                version INTEGER,
                chunk_index INTEGER NOT NULL,
                dims INTEGER NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
            TABLE
        ))
        .execute(&self.pool)
        .await
        .map_err(index_err)?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_space_key ON {0}(space_key)",
            TABLE
        ))
        .execute(&self.pool)
        .await
        .map_err(index_err)?;

        Ok(())
    }

    async fn upsert(&self, records: Vec<IndexedRecord>) -> Result<UpsertReport> {
        if !self.table_exists().await? {
            return Err(RagError::Index(format!("table {} does not exist", TABLE)));
        }
        check_dims(&records, self.stored_dims().await?)?;

        let mut tx = self.pool.begin().await.map_err(index_err)?;
        let insert = format!(
            "INSERT INTO {} (page_id, title, url, chunk, space_key, version, chunk_index, dims, embedding) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            TABLE
        );
        for record in &records {
            let c = &record.chunk;
            sqlx::query(&insert)
                .bind(&c.page_id)
                .bind(&c.title)
                .bind(&c.url)
                .bind(&c.text)
                .bind(&c.space_key)
                .bind(c.version as i64)
                .bind(c.chunk_index as i64)
                .bind(record.dims() as i64)
                .bind(vec_to_blob(&record.vector))
                .execute(&mut *tx)
                .await
                .map_err(index_err)?;
        }
        tx.commit().await.map_err(index_err)?;

        Ok(UpsertReport::complete(records.len()))
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        space_key: Option<&str>,
    ) -> Result<Vec<RetrievalHit>> {
        let space_key = validate_space_filter(space_key)?;
        if top_k == 0 || !self.table_exists().await? {
            return Ok(Vec::new());
        }

        let select = format!(
            "SELECT page_id, title, url, chunk, space_key, version, dims, embedding FROM {}",
            TABLE
        );
        let rows = match space_key {
            Some(key) => sqlx::query(&format!("{} WHERE space_key = ? ORDER BY id", select))
                .bind(key)
                .fetch_all(&self.pool)
                .await,
            None => sqlx::query(&format!("{} ORDER BY id", select))
                .fetch_all(&self.pool)
                .await,
        }
        .map_err(index_err)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let dims: i64 = row.get("dims");
            if dims as usize != vector.len() {
                return Err(RagError::Index(format!(
                    "query vector has {} dims, index holds {}",
                    vector.len(),
                    dims
                )));
            }
            let blob: Vec<u8> = row.get("embedding");
            let stored = blob_to_vec(&blob);
            let title: Option<String> = row.get("title");
            let space: Option<String> = row.get("space_key");
            let version: Option<i64> = row.get("version");
            hits.push(RetrievalHit {
                page_id: row.get("page_id"),
                title: title.filter(|t| !t.is_empty()),
                url: row.get::<Option<String>, _>("url").unwrap_or_default(),
                text: row.get("chunk"),
                space_key: space.filter(|s| !s.is_empty()),
                version: version.and_then(|v| u32::try_from(v).ok()),
                distance: cosine_distance(vector, &stored),
            });
        }

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
