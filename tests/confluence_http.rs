//! `ConfluenceClient` against an in-process fake of the Confluence REST API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use confluence_rag::config::ConfluenceSettings;
use confluence_rag::confluence::ConfluenceClient;
use confluence_rag_core::chunk::ChunkWindow;
use confluence_rag_core::error::ErrorKind;
use confluence_rag_core::ingest::{self, NoProgress};
use confluence_rag_core::wiki::WikiSource;

// "a@acme.com:tok"
const EXPECTED_AUTH: &str = "Basic YUBhY21lLmNvbTp0b2s=";

#[derive(Default)]
struct Seen {
    searches: Vec<HashMap<String, String>>,
    expands: Vec<String>,
}

type Shared = Arc<Mutex<Seen>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == EXPECTED_AUTH)
}

async fn search(
    State(seen): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "bad credentials" })));
    }
    seen.lock().unwrap().searches.push(params);
    (
        StatusCode::OK,
        Json(json!({
            "results": [
                { "id": "101", "title": "ADR-1 Message bus", "type": "page" },
                { "id": "102", "title": "ADR-2 Database", "type": "page" }
            ],
            "size": 2
        })),
    )
}

async fn content(
    State(seen): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "bad credentials" })));
    }
    seen.lock()
        .unwrap()
        .expands
        .push(params.get("expand").cloned().unwrap_or_default());
    let body = match id.as_str() {
        "101" => "<p>We chose <strong>Kafka</strong> as the message bus.</p>",
        "102" => "<p>Postgres is the system of record.</p>",
        _ => return (StatusCode::NOT_FOUND, Json(json!({ "message": "not found" }))),
    };
    (
        StatusCode::OK,
        Json(json!({
            "id": id,
            "title": format!("ADR {}", id),
            "version": { "number": 4 },
            "space": { "key": "ARCH" },
            "body": { "storage": { "value": body, "representation": "storage" } },
            "_links": { "webui": format!("/spaces/ARCH/pages/{}", id), "base": "/wiki" }
        })),
    )
}

async fn spawn_fake(seen: Shared) -> String {
    let app = Router::new()
        .route("/wiki/rest/api/content/search", get(search))
        .route("/wiki/rest/api/content/{id}", get(content))
        .with_state(seen);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn settings(base_url: &str, token: &str) -> ConfluenceSettings {
    ConfluenceSettings {
        base_url: base_url.to_string(),
        email: "a@acme.com".to_string(),
        api_token: token.to_string(),
        space_key: None,
    }
}

#[tokio::test]
async fn test_search_sends_cql_and_limit() {
    let seen = Shared::default();
    let base = spawn_fake(seen.clone()).await;
    let client = ConfluenceClient::new(&settings(&base, "tok")).unwrap();

    let refs = client
        .search_pages("type=page AND (text ~ \"ADR\")", 25)
        .await
        .unwrap();
    assert_eq!(refs.len(), 2);
    assert_eq!(refs[0].id, "101");

    let seen = seen.lock().unwrap();
    let searches = &seen.searches;
    assert_eq!(searches[0]["cql"], "type=page AND (text ~ \"ADR\")");
    assert_eq!(searches[0]["limit"], "25");
}

#[tokio::test]
async fn test_get_page_expands_and_resolves_url() {
    let seen = Shared::default();
    let base = spawn_fake(seen.clone()).await;
    let client = ConfluenceClient::new(&settings(&base, "tok")).unwrap();

    let page = client.get_page("101").await.unwrap();
    assert_eq!(page.title(), "ADR 101");
    assert_eq!(page.version_number(), 4);
    assert_eq!(page.space_key(), Some("ARCH"));
    assert_eq!(
        client.page_url(&page),
        format!("{}/wiki/spaces/ARCH/pages/101", base)
    );
    assert_eq!(
        seen.lock().unwrap().expands[0],
        "body.storage,version,space,_links"
    );
}

#[tokio::test]
async fn test_bad_credentials_are_collaborator_errors() {
    let base = spawn_fake(Shared::default()).await;
    let client = ConfluenceClient::new(&settings(&base, "wrong")).unwrap();

    let err = client.search_pages("type=page", 5).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Collaborator);
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_missing_page_is_collaborator_error() {
    let base = spawn_fake(Shared::default()).await;
    let client = ConfluenceClient::new(&settings(&base, "tok")).unwrap();

    let err = client.get_page("999").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Collaborator);
}

#[tokio::test]
async fn test_dry_run_over_http() {
    let base = spawn_fake(Shared::default()).await;
    let client = ConfluenceClient::new(&settings(&base, "tok")).unwrap();
    let terms = ["Agentic AI"];

    let stats = ingest::dry_run(
        &client,
        &ChunkWindow::default(),
        &terms[..],
        Some("ARCH"),
        10,
        &NoProgress,
    )
    .await
    .unwrap();
    assert_eq!(stats.pages_indexed, 2);
    assert_eq!(stats.chunks_indexed, 2);
}
