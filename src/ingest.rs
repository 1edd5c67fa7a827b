//! `carag ingest`: index decision pages from Confluence.

use std::sync::Arc;

use anyhow::Result;

use confluence_rag_core::ingest::{self, IngestProgress, Ingestor};
use confluence_rag_core::wiki::{decision_cql, search_terms};

use crate::config::{Config, ConfluenceSettings};
use crate::confluence::ConfluenceClient;
use crate::embedding::create_embedder;
use crate::index::{close_after, open_index};

/// Run an ingest (or a dry run) and print the counts.
pub async fn run_ingest(
    config: &Config,
    settings: &ConfluenceSettings,
    space: Option<&str>,
    limit: Option<usize>,
    dry_run: bool,
    progress: Arc<dyn IngestProgress>,
) -> Result<()> {
    let space_key = settings.space_or_default(space);
    let limit = limit.unwrap_or(config.ingest.page_limit);

    let wiki = Arc::new(ConfluenceClient::new(settings)?);
    let window = config.chunking.window()?;

    if dry_run {
        let terms = config.ingest.domain_terms.as_slice();
        println!("CQL: {}", decision_cql(&search_terms(terms), space_key));
        let stats = ingest::dry_run(
            wiki.as_ref(),
            &window,
            terms,
            space_key,
            limit,
            progress.as_ref(),
        )
        .await?;
        println!(
            "Dry run. Pages={} Chunks={}",
            stats.pages_indexed, stats.chunks_indexed
        );
        return Ok(());
    }

    let embedder = create_embedder(&config.embedding)?;
    let index = open_index(config).await?;
    let ingestor = Ingestor::new(wiki, embedder, Arc::clone(&index))
        .with_window(window)
        .with_domain_terms(config.ingest.domain_terms.clone())
        .with_progress(progress);

    let result = ingestor
        .ingest(space_key, limit)
        .await
        .map_err(anyhow::Error::from);
    let stats = close_after(index.as_ref(), result).await?;

    println!(
        "Done. Pages={} Chunks={}",
        stats.pages_indexed, stats.chunks_indexed
    );
    Ok(())
}
