//! Confluence Cloud REST client.
//!
//! Implements [`WikiSource`] over the v1 content API:
//!
//! - `GET {base}/wiki/rest/api/content/search?cql=…&limit=…`
//! - `GET {base}/wiki/rest/api/content/{id}?expand=body.storage,version,space,_links`
//!
//! Requests carry HTTP Basic auth built from the account email and API
//! token. Any transport failure or non-2xx status becomes a wiki
//! [`RagError::Collaborator`]; nothing is retried.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;

use confluence_rag_core::error::{RagError, Result};
use confluence_rag_core::wiki::{resolve_page_url, PageRef, WikiPage, WikiSource};

use crate::config::ConfluenceSettings;

/// Per-request timeout for wiki calls.
pub const WIKI_TIMEOUT_SECS: u64 = 30;

const PAGE_EXPAND: &str = "body.storage,version,space,_links";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<PageRef>,
}

/// Authenticated client for one Confluence site.
pub struct ConfluenceClient {
    base_url: String,
    client: reqwest::Client,
}

impl ConfluenceClient {
    pub fn new(settings: &ConfluenceSettings) -> Result<Self> {
        Self::with_timeout(settings, Duration::from_secs(WIKI_TIMEOUT_SECS))
    }

    pub fn with_timeout(settings: &ConfluenceSettings, timeout: Duration) -> Result<Self> {
        let credentials = STANDARD.encode(format!("{}:{}", settings.email, settings.api_token));
        let mut auth = HeaderValue::from_str(&format!("Basic {}", credentials))
            .map_err(|e| RagError::Configuration(format!("invalid Confluence credentials: {}", e)))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| RagError::wiki(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Site root without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| RagError::wiki(format!("GET {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(RagError::wiki(format!(
                "GET {} returned {}: {}",
                path, status, snippet
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RagError::wiki(format!("invalid JSON from {}: {}", path, e)))
    }
}

#[async_trait]
impl WikiSource for ConfluenceClient {
    async fn search_pages(&self, cql: &str, limit: usize) -> Result<Vec<PageRef>> {
        tracing::debug!(%cql, limit, "searching confluence");
        let resp: SearchResponse = self
            .get_json(
                "/wiki/rest/api/content/search",
                &[("cql", cql.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(resp.results)
    }

    async fn get_page(&self, id: &str) -> Result<WikiPage> {
        let path = format!("/wiki/rest/api/content/{}", id);
        self.get_json(&path, &[("expand", PAGE_EXPAND.to_string())])
            .await
    }

    fn page_url(&self, page: &WikiPage) -> String {
        resolve_page_url(&self.base_url, page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(base: &str) -> ConfluenceSettings {
        ConfluenceSettings {
            base_url: base.to_string(),
            email: "a@acme.com".to_string(),
            api_token: "tok".to_string(),
            space_key: None,
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ConfluenceClient::new(&settings("https://acme.atlassian.net/")).unwrap();
        assert_eq!(client.base_url(), "https://acme.atlassian.net");
    }

    #[test]
    fn test_search_response_parsing() {
        let resp: SearchResponse = serde_json::from_str(
            r#"{"results":[{"id":"1","title":"ADR-1","type":"page"},{"id":"2"}],"size":2}"#,
        )
        .unwrap();
        assert_eq!(resp.results.len(), 2);
        assert_eq!(resp.results[1].id, "2");

        let empty: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.results.is_empty());
    }
}
