//! Weaviate-backed [`VectorIndex`].
//!
//! Talks to Weaviate's REST and GraphQL endpoints directly:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | schema check | `GET /v1/schema/ConfluenceChunk` |
//! | schema create | `POST /v1/schema` |
//! | upsert | `POST /v1/batch/objects`, `batch_size` objects per request |
//! | query | `POST /v1/graphql` with `nearVector` and an optional `where` |
//!
//! The collection uses the snake_case property names of the existing
//! `ConfluenceChunk` schema (`page_id`, `title`, `url`, `chunk`,
//! `space_key`, `version`), no server-side vectorizer and cosine distance,
//! so indexes written by earlier tooling stay queryable.
//!
//! Request bodies and response parsing are plain functions so they can be
//! tested without a server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use confluence_rag_core::error::{RagError, Result};
use confluence_rag_core::models::{IndexedRecord, RetrievalHit};
use confluence_rag_core::store::{
    props, validate_space_filter, UpsertReport, VectorIndex, COLLECTION,
};

use crate::config::IndexConfig;

/// Weaviate REST client bound to the `ConfluenceChunk` collection.
pub struct WeaviateIndex {
    base_url: String,
    client: reqwest::Client,
    batch_size: usize,
}

impl WeaviateIndex {
    pub fn new(url: &str, batch_size: usize, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Index(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            client,
            batch_size: batch_size.max(1),
        })
    }

    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        Self::new(
            &config.url,
            config.batch_size,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<(StatusCode, String)> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| unavailable(&self.base_url, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RagError::Index(format!("failed to read response from {}: {}", path, e)))?;
        Ok((status, text))
    }

    async fn upsert_batch(&self, batch: &[IndexedRecord]) -> Result<UpsertReport> {
        let (status, text) = self.post_json("/v1/batch/objects", &batch_body(batch)).await?;
        if !status.is_success() {
            return Err(RagError::Index(format!(
                "batch write returned {}: {}",
                status,
                truncate(&text)
            )));
        }
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| RagError::Index(format!("invalid batch response: {}", e)))?;
        Ok(parse_batch_response(&json, batch.len()))
    }
}

fn unavailable(base_url: &str, e: reqwest::Error) -> RagError {
    RagError::Index(format!("Weaviate unavailable at {}: {}", base_url, e))
}

fn truncate(text: &str) -> String {
    text.chars().take(300).collect()
}

/// Class definition for `POST /v1/schema`.
pub fn class_definition() -> Value {
    let text = |name: &str| json!({ "name": name, "dataType": ["text"] });
    json!({
        "class": COLLECTION,
        "vectorizer": "none",
        "vectorIndexConfig": { "distance": "cosine" },
        "properties": [
            text(props::PAGE_ID),
            text(props::TITLE),
            text(props::URL),
            text(props::CHUNK),
            text(props::SPACE_KEY),
            { "name": props::VERSION, "dataType": ["int"] },
        ]
    })
}

/// Body for `POST /v1/batch/objects`.
pub fn batch_body(records: &[IndexedRecord]) -> Value {
    let objects: Vec<Value> = records
        .iter()
        .map(|r| {
            json!({
                "class": COLLECTION,
                "properties": {
                    (props::PAGE_ID): r.chunk.page_id,
                    (props::TITLE): r.chunk.title,
                    (props::URL): r.chunk.url,
                    (props::CHUNK): r.chunk.text,
                    (props::SPACE_KEY): r.chunk.space_key,
                    (props::VERSION): r.chunk.version,
                },
                "vector": r.vector,
            })
        })
        .collect();
    json!({ "objects": objects })
}

/// Count per-object failures in a batch response.
///
/// Weaviate answers 200 with one entry per object; failed objects carry
/// `result.errors.error[].message`. Entries missing from the response
/// count as failed.
pub fn parse_batch_response(json: &Value, requested: usize) -> UpsertReport {
    let entries = json.as_array().map(Vec::as_slice).unwrap_or(&[]);
    let mut errors = Vec::new();
    let mut ok = 0usize;

    for entry in entries.iter().take(requested) {
        let messages: Vec<String> = entry
            .pointer("/result/errors/error")
            .and_then(Value::as_array)
            .map(|errs| {
                errs.iter()
                    .map(|e| {
                        e.get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown error")
                            .to_string()
                    })
                    .collect()
            })
            .unwrap_or_default();

        if messages.is_empty() {
            ok += 1;
        } else {
            errors.push(messages.join("; "));
        }
    }

    if entries.len() < requested {
        errors.push(format!(
            "response listed {} of {} objects",
            entries.len(),
            requested
        ));
    }

    UpsertReport {
        requested,
        written: ok,
        errors,
    }
}

/// GraphQL `Get` query for the `top_k` nearest chunks.
pub fn near_vector_query(vector: &[f32], top_k: usize, space_key: Option<&str>) -> String {
    let vector_json = serde_json::to_string(vector).unwrap_or_else(|_| "[]".to_string());
    let filter = match space_key {
        Some(key) => format!(
            ", where: {{path: [\"{}\"], operator: Equal, valueText: {}}}",
            props::SPACE_KEY,
            serde_json::to_string(key).unwrap_or_else(|_| "\"\"".to_string())
        ),
        None => String::new(),
    };
    format!(
        "{{ Get {{ {class}(nearVector: {{vector: {vector}}}, limit: {limit}{filter}) \
         {{ {page_id} {title} {url} {chunk} {space_key} {version} _additional {{ distance }} }} }} }}",
        class = COLLECTION,
        vector = vector_json,
        limit = top_k,
        filter = filter,
        page_id = props::PAGE_ID,
        title = props::TITLE,
        url = props::URL,
        chunk = props::CHUNK,
        space_key = props::SPACE_KEY,
        version = props::VERSION,
    )
}

/// Turn a GraphQL response into hits, in server order.
pub fn parse_query_response(json: &Value) -> Result<Vec<RetrievalHit>> {
    if let Some(errors) = json.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect();
            return Err(RagError::Index(format!(
                "query failed: {}",
                messages.join("; ")
            )));
        }
    }

    let objects = match json.pointer(&format!("/data/Get/{}", COLLECTION)) {
        Some(Value::Array(objects)) => objects,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(other) => {
            return Err(RagError::Index(format!(
                "unexpected query response shape: {}",
                other
            )))
        }
    };

    objects
        .iter()
        .map(|obj| -> Result<RetrievalHit> {
            let text = |name: &str| obj.get(name).and_then(Value::as_str).map(str::to_string);
            let distance = obj
                .pointer("/_additional/distance")
                .and_then(Value::as_f64)
                .ok_or_else(|| RagError::Index("query result missing _additional.distance".to_string()))?;
            Ok(RetrievalHit {
                page_id: text(props::PAGE_ID).unwrap_or_default(),
                title: text(props::TITLE),
                url: text(props::URL).unwrap_or_default(),
                text: text(props::CHUNK).unwrap_or_default(),
                space_key: text(props::SPACE_KEY),
                version: obj
                    .get(props::VERSION)
                    .and_then(Value::as_u64)
                    .and_then(|v| u32::try_from(v).ok()),
                distance: distance as f32,
            })
        })
        .collect()
}

#[async_trait]
impl VectorIndex for WeaviateIndex {
    async fn ensure_schema(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url(&format!("/v1/schema/{}", COLLECTION)))
            .send()
            .await
            .map_err(|e| unavailable(&self.base_url, e))?;

        match response.status() {
            s if s.is_success() => {
                tracing::debug!("collection {} already exists", COLLECTION);
                return Ok(());
            }
            StatusCode::NOT_FOUND => {}
            s => {
                let body = response.text().await.unwrap_or_default();
                return Err(RagError::Index(format!(
                    "schema check returned {}: {}",
                    s,
                    truncate(&body)
                )));
            }
        }

        let (status, text) = self.post_json("/v1/schema", &class_definition()).await?;
        if status.is_success() {
            tracing::info!("created collection {}", COLLECTION);
            return Ok(());
        }
        // Lost a race with another writer.
        if status == StatusCode::UNPROCESSABLE_ENTITY && text.contains("already exists") {
            return Ok(());
        }
        Err(RagError::Index(format!(
            "schema create returned {}: {}",
            status,
            truncate(&text)
        )))
    }

    async fn upsert(&self, records: Vec<IndexedRecord>) -> Result<UpsertReport> {
        let mut report = UpsertReport::default();
        for batch in records.chunks(self.batch_size) {
            let part = self.upsert_batch(batch).await?;
            report.requested += part.requested;
            report.written += part.written;
            report.errors.extend(part.errors);
        }
        tracing::debug!(
            requested = report.requested,
            written = report.written,
            "weaviate upsert"
        );
        Ok(report)
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        space_key: Option<&str>,
    ) -> Result<Vec<RetrievalHit>> {
        let space_key = validate_space_filter(space_key)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let query = near_vector_query(vector, top_k, space_key);
        let (status, text) = self.post_json("/v1/graphql", &json!({ "query": query })).await?;
        if !status.is_success() {
            return Err(RagError::Index(format!(
                "query returned {}: {}",
                status,
                truncate(&text)
            )));
        }
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| RagError::Index(format!("invalid query response: {}", e)))?;
        parse_query_response(&json)
    }

    async fn close(&self) -> Result<()> {
        tracing::debug!("closing weaviate client");
        Ok(())
    }
}
