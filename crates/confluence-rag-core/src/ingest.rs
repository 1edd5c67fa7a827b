//! Ingestion pipeline: wiki → plain text → chunks → embeddings → index.
//!
//! One run searches the wiki with a decision-biased CQL query, fetches each
//! result, extracts and chunks its text, embeds each page's chunks in one
//! batch, then writes every record with a single upsert. Nothing is
//! retried and nothing is deduplicated against earlier runs.

use std::sync::Arc;

use crate::chunk::ChunkWindow;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::markup;
use crate::models::{Chunk, IndexedRecord, IngestStats};
use crate::store::VectorIndex;
use crate::wiki::{decision_cql, search_terms, WikiPage, WikiSource, DEFAULT_DOMAIN_TERMS};

/// Progress events emitted during ingestion.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    /// The wiki returned `total` candidate pages.
    Found { total: usize },
    /// Page `n` of `total` was fetched and split into `chunks` chunks.
    Page {
        n: usize,
        total: usize,
        title: String,
        chunks: usize,
    },
    /// Records are about to be written.
    Writing { records: usize },
}

/// Receives [`IngestEvent`]s. Implementations must not fail.
pub trait IngestProgress: Send + Sync {
    fn report(&self, event: IngestEvent);
}

/// Reporter that drops every event.
pub struct NoProgress;

impl IngestProgress for NoProgress {
    fn report(&self, _event: IngestEvent) {}
}

/// Turn one fetched page into chunks.
///
/// `fallback_space` is used when the page carries no `space.key`. Pages
/// with no extractable text yield no chunks.
pub fn chunk_page(
    page: &WikiPage,
    url: &str,
    window: &ChunkWindow,
    fallback_space: Option<&str>,
) -> Vec<Chunk> {
    let text = markup::to_plain_text(page.storage_markup());
    let space_key = page.space_key().or(fallback_space).unwrap_or("");

    window
        .split(&text)
        .into_iter()
        .enumerate()
        .map(|(i, piece)| Chunk {
            page_id: page.id.clone(),
            title: page.title().to_string(),
            url: url.to_string(),
            text: piece,
            space_key: space_key.to_string(),
            version: page.version_number(),
            chunk_index: i,
        })
        .collect()
}

/// Fetch the pages matching the decision query and chunk each one.
///
/// Returns one chunk list per page that produced at least one chunk, in
/// search order.
pub(crate) async fn fetch_decision_chunks(
    wiki: &dyn WikiSource,
    window: &ChunkWindow,
    cql: &str,
    space_key: Option<&str>,
    page_limit: usize,
    progress: &dyn IngestProgress,
) -> Result<Vec<Vec<Chunk>>> {
    let refs = wiki.search_pages(cql, page_limit).await?;
    let total = refs.len().min(page_limit);
    progress.report(IngestEvent::Found { total });
    tracing::info!(pages = total, "wiki search complete");

    let mut pages = Vec::with_capacity(total);
    for (i, page_ref) in refs.iter().take(page_limit).enumerate() {
        let mut page = wiki.get_page(&page_ref.id).await?;
        if page.id.is_empty() {
            page.id = page_ref.id.clone();
        }
        let url = wiki.page_url(&page);
        let chunks = chunk_page(&page, &url, window, space_key);

        progress.report(IngestEvent::Page {
            n: i + 1,
            total,
            title: page.title().to_string(),
            chunks: chunks.len(),
        });

        if chunks.is_empty() {
            tracing::debug!(page_id = %page.id, "page has no text, skipping");
            continue;
        }
        pages.push(chunks);
    }
    Ok(pages)
}

/// Drives ingestion from a [`WikiSource`] into a [`VectorIndex`].
pub struct Ingestor {
    wiki: Arc<dyn WikiSource>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    window: ChunkWindow,
    domain_terms: Vec<String>,
    progress: Arc<dyn IngestProgress>,
}

impl Ingestor {
    pub fn new(
        wiki: Arc<dyn WikiSource>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            wiki,
            embedder,
            index,
            window: ChunkWindow::default(),
            domain_terms: DEFAULT_DOMAIN_TERMS.iter().map(|t| t.to_string()).collect(),
            progress: Arc::new(NoProgress),
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

    pub fn with_progress(mut self, progress: Arc<dyn IngestProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// The CQL query used for `space_key`.
    pub fn cql(&self, space_key: Option<&str>) -> String {
        decision_cql(&search_terms(&self.domain_terms), space_key)
    }

    /// Index up to `page_limit` decision pages, optionally restricted to one space.
    pub async fn ingest(&self, space_key: Option<&str>, page_limit: usize) -> Result<IngestStats> {
        self.index.ensure_schema().await?;
        if page_limit == 0 {
            return Ok(IngestStats::default());
        }

        let cql = self.cql(space_key);
        tracing::info!(%cql, limit = page_limit, "starting ingest");
        let pages = fetch_decision_chunks(
            self.wiki.as_ref(),
            &self.window,
            &cql,
            space_key,
            page_limit,
            self.progress.as_ref(),
        )
        .await?;

        let mut stats = IngestStats::default();
        let mut records = Vec::new();
        for chunks in pages {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != chunks.len() {
                return Err(RagError::Embedding(format!(
                    "expected {} vectors for page {}, got {}",
                    chunks.len(),
                    chunks[0].page_id,
                    vectors.len()
                )));
            }
            stats.pages_indexed += 1;
            stats.chunks_indexed += chunks.len();
            for (chunk, vector) in chunks.into_iter().zip(vectors) {
                records.push(IndexedRecord::new(chunk, vector)?);
            }
        }

        if records.is_empty() {
            tracing::info!("no chunks to index");
            return Ok(stats);
        }

        self.progress.report(IngestEvent::Writing {
            records: records.len(),
        });
        let written = self.index.upsert(records).await?.ensure_complete()?;
        tracing::info!(
            pages = stats.pages_indexed,
            chunks = written,
            "ingest complete"
        );
        Ok(stats)
    }
}

/// Search, fetch and chunk exactly like [`Ingestor::ingest`], but embed
/// nothing and touch no index.
pub async fn dry_run<S: AsRef<str>>(
    wiki: &dyn WikiSource,
    window: &ChunkWindow,
    domain_terms: &[S],
    space_key: Option<&str>,
    page_limit: usize,
    progress: &dyn IngestProgress,
) -> Result<IngestStats> {
    if page_limit == 0 {
        return Ok(IngestStats::default());
    }
    let cql = decision_cql(&search_terms(domain_terms), space_key);
    let pages = fetch_decision_chunks(wiki, window, &cql, space_key, page_limit, progress).await?;

    Ok(IngestStats {
        pages_indexed: pages.len(),
        chunks_indexed: pages.iter().map(Vec::len).sum(),
    })
}
