//! `carag ask`: answer a question from indexed decision pages.

use std::sync::Arc;

use anyhow::Result;

use confluence_rag_core::grounding::UrlNormalizer;
use confluence_rag_core::models::{GroundedAnswer, RetrievalHit};
use confluence_rag_core::retrieval::DecisionAssistant;
use confluence_rag_core::router::{route, Route};

use crate::config::{Config, ConfluenceSettings};
use crate::embedding::create_embedder;
use crate::index::{close_after, open_index};
use crate::llm::create_llm;

/// Options for one `ask` invocation.
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub space: Option<String>,
    pub top_k: Option<usize>,
    pub rerank: bool,
    pub json: bool,
}

pub async fn run_ask(
    config: &Config,
    settings: &ConfluenceSettings,
    question: &str,
    opts: &AskOptions,
) -> Result<()> {
    if route(question) == Route::Unknown {
        tracing::info!("question has no decision cues; answering from the index anyway");
    }

    let space_key = settings.space_or_default(opts.space.as_deref());
    let top_k = opts.top_k.unwrap_or(config.retrieval.top_k);
    let rerank = opts.rerank || config.retrieval.rerank;

    let embedder = create_embedder(&config.embedding)?;
    let llm = create_llm(&config.llm)?;
    let index = open_index(config).await?;
    let assistant = DecisionAssistant::new(
        embedder,
        Arc::clone(&index),
        llm,
        UrlNormalizer::new(&settings.base_url),
    );

    let result = assistant
        .answer(question, space_key, top_k, rerank)
        .await
        .map_err(anyhow::Error::from);
    let answer = close_after(index.as_ref(), result).await?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print!("{}", render_answer(&answer, config.retrieval.max_sources_shown));
    }
    Ok(())
}

/// Plain-text rendering: the answer, then at most `max_sources` sources.
pub fn render_answer(answer: &GroundedAnswer, max_sources: usize) -> String {
    let mut out = String::new();
    out.push_str("\nAnswer:\n");
    out.push_str(&answer.answer);
    out.push('\n');
    if answer.sources.is_empty() {
        return out;
    }
    out.push_str("\nTop Sources:\n");
    for hit in answer.sources.iter().take(max_sources) {
        out.push_str(&source_line(hit));
        out.push('\n');
    }
    out
}

pub(crate) fn source_line(hit: &RetrievalHit) -> String {
    format!(
        "- {} ({}) distance={:.4}",
        hit.display_title(),
        hit.url,
        hit.distance
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: Option<&str>, url: &str, distance: f32) -> RetrievalHit {
        RetrievalHit {
            page_id: "1".to_string(),
            title: title.map(str::to_string),
            url: url.to_string(),
            text: "text".to_string(),
            space_key: None,
            version: None,
            distance,
        }
    }

    #[test]
    fn test_render_answer_limits_sources() {
        let answer = GroundedAnswer {
            answer: "We chose Postgres.".to_string(),
            sources: (0..7)
                .map(|i| hit(Some("ADR-1"), &format!("https://w/{}", i), 0.1))
                .collect(),
        };
        let out = render_answer(&answer, 5);
        assert!(out.starts_with("\nAnswer:\nWe chose Postgres.\n"));
        assert_eq!(out.matches("- ADR-1").count(), 5);
        assert!(out.contains("- ADR-1 (https://w/0) distance=0.1000"));
    }

    #[test]
    fn test_render_answer_without_sources() {
        let answer = GroundedAnswer {
            answer: "I don't have enough information in Confluence.".to_string(),
            sources: Vec::new(),
        };
        let out = render_answer(&answer, 5);
        assert!(!out.contains("Top Sources"));
    }

    #[test]
    fn test_source_line_untitled() {
        assert_eq!(
            source_line(&hit(None, "https://w/x", 0.25)),
            "- Untitled (https://w/x) distance=0.2500"
        );
    }
}
