//! Read path: question → hits → grounded answer.

use std::sync::Arc;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::grounding::{build_prompt, dedup_hits, UrlNormalizer, INSUFFICIENT_INFO};
use crate::llm::LanguageModel;
use crate::models::{GroundedAnswer, RetrievalHit};
use crate::rerank::rerank;
use crate::store::VectorIndex;

/// Default number of hits requested from the index.
pub const DEFAULT_TOP_K: usize = 8;

/// Answers questions from indexed Confluence chunks.
pub struct DecisionAssistant {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LanguageModel>,
    normalizer: UrlNormalizer,
}

impl DecisionAssistant {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LanguageModel>,
        normalizer: UrlNormalizer,
    ) -> Self {
        Self {
            embedder,
            index,
            llm,
            normalizer,
        }
    }

    /// Embed `question`, query the index and return normalized, deduplicated hits.
    pub async fn retrieve(
        &self,
        question: &str,
        space_key: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<RetrievalHit>> {
        let vector = self.embedder.embed(question).await?;
        let hits = self.index.query(&vector, top_k, space_key).await?;
        let raw = hits.len();
        let hits = dedup_hits(hits, &self.normalizer);
        tracing::debug!(raw, kept = hits.len(), "retrieved hits");
        Ok(hits)
    }

    /// Answer `question` from at most `top_k` excerpts.
    ///
    /// With no hits the sentinel answer is returned and the model is not
    /// called. When `rerank` is set the hits are rescored against the
    /// question before the prompt is built.
    pub async fn answer(
        &self,
        question: &str,
        space_key: Option<&str>,
        top_k: usize,
        rerank_hits: bool,
    ) -> Result<GroundedAnswer> {
        let mut hits = self.retrieve(question, space_key, top_k).await?;

        if rerank_hits && !hits.is_empty() {
            hits = rerank(self.embedder.as_ref(), question, hits, top_k)
                .await?
                .into_iter()
                .map(|s| s.item)
                .collect();
        }

        if hits.is_empty() {
            tracing::info!("no hits, returning sentinel answer");
            return Ok(GroundedAnswer {
                answer: INSUFFICIENT_INFO.to_string(),
                sources: Vec::new(),
            });
        }

        let prompt = build_prompt(question, &hits);
        tracing::debug!(model = self.llm.name(), chars = prompt.len(), "generating answer");
        let answer = self.llm.generate(&prompt).await?;

        Ok(GroundedAnswer {
            answer,
            sources: hits,
        })
    }
}
