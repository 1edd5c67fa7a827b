//! Index-free decision context assembled straight from the wiki.
//!
//! Pages are searched and chunked like ingestion, then every chunk is
//! reranked against the question and the best ones are rendered as a
//! context block. Useful before anything has been ingested, or to check
//! what the wiki currently says.

use std::sync::Arc;

use serde::Serialize;

use crate::chunk::ChunkWindow;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::ingest::{fetch_decision_chunks, NoProgress};
use crate::models::Chunk;
use crate::rerank::rerank;
use crate::wiki::{decision_cql, search_terms, WikiSource, DEFAULT_DOMAIN_TERMS};

/// Extra search terms used only by live lookups.
pub const LIVE_HINT_TERMS: &[&str] = &["Outcome", "agentic platform"];

/// Rendered context plus the chunks it was built from.
#[derive(Debug, Clone, Serialize)]
pub struct LiveContext {
    pub context: String,
    pub sources: Vec<Chunk>,
    /// The CQL query that selected the pages.
    pub cql: String,
}

pub struct LiveContextBuilder {
    wiki: Arc<dyn WikiSource>,
    embedder: Arc<dyn Embedder>,
    window: ChunkWindow,
    domain_terms: Vec<String>,
}

impl LiveContextBuilder {
    pub fn new(wiki: Arc<dyn WikiSource>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            wiki,
            embedder,
            window: ChunkWindow::default(),
            domain_terms: DEFAULT_DOMAIN_TERMS.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn with_window(mut self, window: ChunkWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_domain_terms(mut self, terms: Vec<String>) -> Self {
        self.domain_terms = terms;
        self
    }

    pub fn cql(&self, space_key: Option<&str>) -> String {
        let mut extra = self.domain_terms.clone();
        extra.extend(LIVE_HINT_TERMS.iter().map(|t| t.to_string()));
        decision_cql(&search_terms(&extra), space_key)
    }

    /// Fetch up to `page_limit` pages and keep the `top_k` chunks most
    /// relevant to `question`.
    pub async fn build(
        &self,
        question: &str,
        space_key: Option<&str>,
        page_limit: usize,
        top_k: usize,
    ) -> Result<LiveContext> {
        let cql = self.cql(space_key);
        if page_limit == 0 {
            return Ok(LiveContext {
                context: String::new(),
                sources: Vec::new(),
                cql,
            });
        }

        let pages = fetch_decision_chunks(
            self.wiki.as_ref(),
            &self.window,
            &cql,
            space_key,
            page_limit,
            &NoProgress,
        )
        .await?;
        let candidates: Vec<Chunk> = pages.into_iter().flatten().collect();
        tracing::debug!(candidates = candidates.len(), "live context candidates");

        let sources: Vec<Chunk> = rerank(self.embedder.as_ref(), question, candidates, top_k)
            .await?
            .into_iter()
            .map(|s| s.item)
            .collect();

        Ok(LiveContext {
            context: render_context(&sources),
            sources,
            cql,
        })
    }
}

/// `Source: <title> (<url>)\nExcerpt: <text>` blocks separated by blank lines.
pub fn render_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| format!("Source: {} ({})\nExcerpt: {}", c.title, c.url, c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(title: &str, url: &str, text: &str) -> Chunk {
        Chunk {
            page_id: "1".to_string(),
            title: title.to_string(),
            url: url.to_string(),
            text: text.to_string(),
            space_key: "ARCH".to_string(),
            version: 1,
            chunk_index: 0,
        }
    }

    #[test]
    fn test_render_context_blocks() {
        let out = render_context(&[
            chunk("ADR-1", "https://w/1", "Use Kafka."),
            chunk("ADR-2", "https://w/2", "Use Postgres."),
        ]);
        assert_eq!(
            out,
            "Source: ADR-1 (https://w/1)\nExcerpt: Use Kafka.\n\n\
             Source: ADR-2 (https://w/2)\nExcerpt: Use Postgres."
        );
        assert_eq!(render_context(&[]), "");
    }
}
