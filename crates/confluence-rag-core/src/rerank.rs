//! Embedding-based relevance reranking.
//!
//! Candidates are rescored by cosine similarity between the question and
//! each candidate's text. The question and all candidates are embedded in
//! a single batch so a remote embedder sees one request.

use crate::embedding::{dot, Embedder};
use crate::error::{RagError, Result};
use crate::models::{Chunk, RetrievalHit};

/// Anything the reranker can score.
pub trait RerankText {
    fn rerank_text(&self) -> &str;
}

impl RerankText for Chunk {
    fn rerank_text(&self) -> &str {
        &self.text
    }
}

impl RerankText for RetrievalHit {
    fn rerank_text(&self) -> &str {
        &self.text
    }
}

/// A candidate with its similarity to the question (higher is better).
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    pub item: T,
    pub score: f32,
}

/// Return the `top_k` candidates most similar to `question`, best first.
///
/// Ties keep their input order. An empty candidate list returns
/// immediately without touching the embedder.
pub async fn rerank<T: RerankText>(
    embedder: &dyn Embedder,
    question: &str,
    candidates: Vec<T>,
    top_k: usize,
) -> Result<Vec<Scored<T>>> {
    if candidates.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let mut texts = Vec::with_capacity(candidates.len() + 1);
    texts.push(question.to_string());
    texts.extend(candidates.iter().map(|c| c.rerank_text().to_string()));

    let vectors = embedder.embed_batch(&texts).await?;
    if vectors.len() != texts.len() {
        return Err(RagError::Embedding(format!(
            "expected {} vectors, got {}",
            texts.len(),
            vectors.len()
        )));
    }
    let (question_vec, candidate_vecs) = vectors.split_at(1);
    let question_vec = &question_vec[0];

    let mut scored: Vec<Scored<T>> = candidates
        .into_iter()
        .zip(candidate_vecs)
        .map(|(item, v)| Scored {
            item,
            score: dot(question_vec, v),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);

    tracing::debug!(kept = scored.len(), "reranked candidates");
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chunk(text: &str) -> Chunk {
        Chunk {
            page_id: "p".to_string(),
            title: "t".to_string(),
            url: "https://wiki.example.com/p".to_string(),
            text: text.to_string(),
            space_key: "ARCH".to_string(),
            version: 1,
            chunk_index: 0,
        }
    }

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }

        fn dims(&self) -> usize {
            2
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_apple_pie_above_car_engine() {
        let embedder = HashEmbedder::default();
        let out = rerank(
            &embedder,
            "apple recipe",
            vec![chunk("car engine"), chunk("apple pie")],
            2,
        )
        .await
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].item.text, "apple pie");
        assert_eq!(out[1].item.text, "car engine");
        assert!(out[0].score > out[1].score);
    }

    #[tokio::test]
    async fn test_empty_candidates_skip_embedder() {
        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
        };
        let out = rerank::<Chunk>(&embedder, "anything", Vec::new(), 5)
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_single_batch_and_stable_ties() {
        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
        };
        let out = rerank(
            &embedder,
            "q",
            vec![chunk("first"), chunk("second"), chunk("third")],
            2,
        )
        .await
        .unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        let texts: Vec<&str> = out.iter().map(|s| s.item.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_hits_are_rerankable() {
        let embedder = HashEmbedder::default();
        let hits = vec![
            RetrievalHit::from_chunk(&chunk("quarterly offsite agenda"), 0.1),
            RetrievalHit::from_chunk(&chunk("the database decision record"), 0.4),
        ];
        let out = rerank(&embedder, "database decision", hits, 8).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].item.text, "the database decision record");
        assert!(out[0].score > out[1].score);
    }
}
