//! Drives `WeaviateIndex` against an in-process fake of the Weaviate REST API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use confluence_rag::weaviate::WeaviateIndex;
use confluence_rag_core::error::{ErrorKind, RagError};
use confluence_rag_core::models::{Chunk, IndexedRecord};
use confluence_rag_core::store::VectorIndex;

#[derive(Default)]
struct FakeWeaviate {
    class_exists: bool,
    /// Answer schema creation with 422 "already exists".
    racing_creator: bool,
    schema_posts: usize,
    batch_sizes: Vec<usize>,
    queries: Vec<String>,
}

type Shared = Arc<Mutex<FakeWeaviate>>;

async fn get_class(State(state): State<Shared>) -> StatusCode {
    if state.lock().unwrap().class_exists {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn create_class(
    State(state): State<Shared>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut s = state.lock().unwrap();
    s.schema_posts += 1;
    assert_eq!(body["class"], "ConfluenceChunk");
    if s.racing_creator {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": [{ "message": "class name ConfluenceChunk already exists" }] })),
        );
    }
    s.class_exists = true;
    (StatusCode::OK, Json(body))
}

async fn batch_objects(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let objects = body["objects"].as_array().cloned().unwrap_or_default();
    state.lock().unwrap().batch_sizes.push(objects.len());
    let results: Vec<Value> = objects
        .iter()
        .map(|o| {
            if o["properties"]["page_id"] == "bad" {
                json!({ "result": { "errors": { "error": [{ "message": "invalid vector" }] } } })
            } else {
                json!({ "result": {} })
            }
        })
        .collect();
    Json(Value::Array(results))
}

async fn graphql(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let query = body["query"].as_str().unwrap_or_default().to_string();
    state.lock().unwrap().queries.push(query);
    Json(json!({
        "data": { "Get": { "ConfluenceChunk": [
            {
                "page_id": "101",
                "title": "ADR-1 Message bus",
                "url": "https://acme.atlassian.net/wiki/spaces/ARCH/pages/101",
                "chunk": "We chose Kafka.",
                "space_key": "ARCH",
                "version": 3,
                "_additional": { "distance": 0.12 }
            },
            {
                "page_id": "102",
                "chunk": "Postgres for storage.",
                "_additional": { "distance": 0.4 }
            }
        ] } }
    }))
}

async fn spawn_fake(state: Shared) -> String {
    let app = Router::new()
        .route("/v1/schema/ConfluenceChunk", get(get_class))
        .route("/v1/schema", post(create_class))
        .route("/v1/batch/objects", post(batch_objects))
        .route("/v1/graphql", post(graphql))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn record(page_id: &str) -> IndexedRecord {
    IndexedRecord::new(
        Chunk {
            page_id: page_id.to_string(),
            title: "ADR".to_string(),
            url: format!("https://acme.atlassian.net/wiki/pages/{}", page_id),
            text: "We chose Kafka.".to_string(),
            space_key: "ARCH".to_string(),
            version: 1,
            chunk_index: 0,
        },
        vec![0.6, 0.8],
    )
    .unwrap()
}

fn index(url: &str, batch_size: usize) -> WeaviateIndex {
    WeaviateIndex::new(url, batch_size, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_ensure_schema_creates_once() {
    let state = Shared::default();
    let url = spawn_fake(state.clone()).await;
    let idx = index(&url, 100);

    idx.ensure_schema().await.unwrap();
    idx.ensure_schema().await.unwrap();

    assert_eq!(state.lock().unwrap().schema_posts, 1);
}

#[tokio::test]
async fn test_ensure_schema_tolerates_concurrent_create() {
    let state = Shared::default();
    state.lock().unwrap().racing_creator = true;
    let url = spawn_fake(state.clone()).await;

    index(&url, 100).ensure_schema().await.unwrap();
    assert_eq!(state.lock().unwrap().schema_posts, 1);
}

#[tokio::test]
async fn test_upsert_batches_and_counts_failures() {
    let state = Shared::default();
    let url = spawn_fake(state.clone()).await;
    let idx = index(&url, 2);

    let records = vec![
        record("1"),
        record("2"),
        record("bad"),
        record("4"),
        record("5"),
    ];
    let report = idx.upsert(records).await.unwrap();

    assert_eq!(state.lock().unwrap().batch_sizes, vec![2, 2, 1]);
    assert_eq!(report.requested, 5);
    assert_eq!(report.written, 4);
    let err = report.ensure_complete().unwrap_err();
    assert!(matches!(
        err,
        RagError::IncompleteUpsert {
            requested: 5,
            written: 4,
            ..
        }
    ));
    assert!(err.to_string().contains("invalid vector"));
}

#[tokio::test]
async fn test_query_parses_hits_and_sends_filter() {
    let state = Shared::default();
    let url = spawn_fake(state.clone()).await;
    let idx = index(&url, 100);

    let hits = idx.query(&[0.6, 0.8], 2, Some("ARCH")).await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].title.as_deref(), Some("ADR-1 Message bus"));
    assert_eq!(hits[0].version, Some(3));
    assert!((hits[0].distance - 0.12).abs() < 1e-6);
    assert_eq!(hits[1].title, None);
    assert_eq!(hits[1].url, "");

    let queries = state.lock().unwrap().queries.clone();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains("limit: 2"));
    assert!(queries[0].contains("valueText: \"ARCH\""));
}

#[tokio::test]
async fn test_query_blank_space_rejected_before_request() {
    let state = Shared::default();
    let url = spawn_fake(state.clone()).await;

    let err = index(&url, 100)
        .query(&[1.0, 0.0], 4, Some(""))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Index);
    assert!(state.lock().unwrap().queries.is_empty());
}

#[tokio::test]
async fn test_unreachable_server_is_index_error() {
    // Nothing listens on port 9 (discard) in the test environment.
    let err = index("http://127.0.0.1:9", 100)
        .ensure_schema()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Index);
}
