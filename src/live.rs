//! `carag live`: build question-specific context straight from Confluence.
//!
//! Nothing is read from or written to the vector index. Pages matching the
//! decision search are chunked in memory and reranked against the question.

use std::sync::Arc;

use anyhow::Result;

use confluence_rag_core::live::LiveContextBuilder;

use crate::config::{Config, ConfluenceSettings};
use crate::confluence::ConfluenceClient;
use crate::embedding::create_embedder;

pub const DEFAULT_LIVE_PAGE_LIMIT: usize = 10;

pub async fn run_live(
    config: &Config,
    settings: &ConfluenceSettings,
    question: &str,
    space: Option<&str>,
    page_limit: usize,
    top_k: usize,
    json: bool,
) -> Result<()> {
    let space_key = settings.space_or_default(space);
    let wiki = Arc::new(ConfluenceClient::new(settings)?);
    let embedder = create_embedder(&config.embedding)?;

    let builder = LiveContextBuilder::new(wiki, embedder)
        .with_window(config.chunking.window()?)
        .with_domain_terms(config.ingest.domain_terms.clone());
    let live = builder.build(question, space_key, page_limit, top_k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&live)?);
    } else if live.sources.is_empty() {
        println!("No matching pages.");
    } else {
        println!("{}", live.context);
    }
    Ok(())
}
