//! `carag search`: show the indexed excerpts closest to a question.
//!
//! Runs the same retrieval as `ask` (embed, query, normalize and
//! deduplicate) but stops before the language model.

use std::sync::Arc;

use anyhow::Result;

use confluence_rag_core::grounding::{excerpt, UrlNormalizer};
use confluence_rag_core::llm::StubLlm;
use confluence_rag_core::models::RetrievalHit;
use confluence_rag_core::retrieval::DecisionAssistant;

use crate::config::{Config, ConfluenceSettings};
use crate::embedding::create_embedder;
use crate::index::{close_after, open_index};

pub async fn run_search(
    config: &Config,
    settings: &ConfluenceSettings,
    question: &str,
    space: Option<&str>,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let space_key = settings.space_or_default(space);
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let embedder = create_embedder(&config.embedding)?;
    let index = open_index(config).await?;
    let assistant = DecisionAssistant::new(
        embedder,
        Arc::clone(&index),
        Arc::new(StubLlm),
        UrlNormalizer::new(&settings.base_url),
    );

    let result = assistant
        .retrieve(question, space_key, top_k)
        .await
        .map_err(anyhow::Error::from);
    let hits = close_after(index.as_ref(), result).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        print!("{}", render_hits(&hits));
    }
    Ok(())
}

fn render_hits(hits: &[RetrievalHit]) -> String {
    if hits.is_empty() {
        return "No results.\n".to_string();
    }
    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!(
            "{}. [{:.4}] {}\n",
            i + 1,
            hit.distance,
            hit.display_title()
        ));
        if let Some(space) = &hit.space_key {
            out.push_str(&format!("    space: {}\n", space));
        }
        out.push_str(&format!("    url: {}\n", hit.url));
        out.push_str(&format!("    excerpt: \"{}\"\n\n", excerpt(&hit.text)));
    }
    out
}
