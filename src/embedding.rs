//! Embedding backends for the `carag` binary.
//!
//! Implements the core [`Embedder`] trait for:
//! - **[`LocalEmbedder`]** runs a sentence-embedding model locally via
//!   fastembed. The model is downloaded and loaded on first use, at most
//!   once per process, then shared; inference runs on a blocking thread.
//! - **[`OllamaEmbedder`]** calls a local Ollama instance's `/api/embed`.
//! - [`HashEmbedder`] (from the core crate) for offline runs.
//!
//! Use [`create_embedder`] to build the configured backend. No backend
//! retries; a failed call is an embedding error.
//!
//! # Supported local models
//!
//! | Config value | Dims |
//! |--------------|------|
//! | `all-minilm-l6-v2` (default) | 384 |
//! | `bge-small-en-v1.5` | 384 |
//! | `bge-base-en-v1.5` | 768 |
//! | `nomic-embed-text-v1.5` | 768 |
//! | `multilingual-e5-small` | 384 |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use confluence_rag_core::embedding::{finish_batch, Embedder, HashEmbedder, HASH_EMBEDDER_DIMS};
use confluence_rag_core::error::{RagError, Result};

use crate::config::EmbeddingConfig;

/// Model used when `embedding.model` is not set.
pub const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";

/// Output dimensionality of a known local model.
pub fn local_model_dims(name: &str) -> usize {
    match name {
        "all-minilm-l6-v2" => 384,
        "bge-small-en-v1.5" => 384,
        "bge-base-en-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        "multilingual-e5-small" => 384,
        "multilingual-e5-base" => 768,
        "multilingual-e5-large" => 1024,
        _ => 384,
    }
}

// ============ Local Embedder (fastembed) ============

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => Err(RagError::Configuration(format!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ))),
    }
}

/// Lazily loaded fastembed model.
///
/// Construction is cheap and never touches the network; the first
/// `embed_batch` call downloads (if needed) and loads the model. Later
/// calls reuse it. Encode calls serialize on the model's mutex.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: tokio::sync::OnceCell<Arc<std::sync::Mutex<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());
        // Fail on unknown names before any download is attempted.
        config_to_fastembed_model(&model_name)?;
        let dims = config.dims.unwrap_or_else(|| local_model_dims(&model_name));
        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            model: tokio::sync::OnceCell::new(),
        })
    }

    async fn model(&self) -> Result<Arc<std::sync::Mutex<fastembed::TextEmbedding>>> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let fastembed_model = config_to_fastembed_model(&self.model_name)?;
                tracing::info!(model = %self.model_name, "loading local embedding model");
                let loaded = tokio::task::spawn_blocking(move || {
                    fastembed::TextEmbedding::try_new(
                        fastembed::InitOptions::new(fastembed_model)
                            .with_show_download_progress(true),
                    )
                })
                .await
                .map_err(|e| RagError::Embedding(format!("model loader panicked: {}", e)))?
                .map_err(|e| {
                    RagError::Embedding(format!(
                        "Failed to initialize local embedding model: {}",
                        e
                    ))
                })?;
                Ok::<_, RagError>(Arc::new(std::sync::Mutex::new(loaded)))
            })
            .await?;
        Ok(Arc::clone(model))
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.model().await?;
        let batch_size = self.batch_size;
        let owned = texts.to_vec();

        let vectors = tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|_| RagError::Embedding("embedding model lock poisoned".to_string()))?;
            guard
                .embed(owned, Some(batch_size))
                .map_err(|e| RagError::Embedding(format!("Local embedding failed: {}", e)))
        })
        .await
        .map_err(|e| RagError::Embedding(format!("embedding task panicked: {}", e)))??;

        finish_batch(texts.len(), self.dims, vectors)
    }
}

// ============ Ollama Embedder ============

/// Embedder backed by a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default
/// `http://localhost:11434`). Texts are sent `batch_size` at a time.
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    batch_size: usize,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            RagError::Configuration("embedding.model required for Ollama provider".to_string())
        })?;
        let dims = config.dims.unwrap_or_else(|| local_model_dims(&model));
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::Embedding(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            model,
            dims,
            url: url.trim_end_matches('/').to_string(),
            batch_size: config.batch_size.max(1),
            client,
        })
    }

    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                RagError::Embedding(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "Ollama API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("invalid Ollama response: {}", e)))?;
        parse_ollama_response(&json)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            out.extend(self.embed_chunk(chunk).await?);
        }
        finish_batch(texts.len(), self.dims, out)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            RagError::Embedding("Invalid Ollama response: missing embeddings array".to_string())
        })?;

    embeddings
        .iter()
        .map(|embedding| {
            let values = embedding.as_array().ok_or_else(|| {
                RagError::Embedding(
                    "Invalid Ollama response: embedding is not an array".to_string(),
                )
            })?;
            values
                .iter()
                .map(|v| {
                    v.as_f64().map(|f| f as f32).ok_or_else(|| {
                        RagError::Embedding(
                            "Invalid Ollama response: non-numeric component".to_string(),
                        )
                    })
                })
                .collect::<Result<Vec<f32>>>()
        })
        .collect()
}

/// Create the configured [`Embedder`].
///
/// | Config value | Backend |
/// |--------------|---------|
/// | `"local"` | [`LocalEmbedder`] (requires `local-embeddings-fastembed`) |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"hash"` | [`HashEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => Err(RagError::Configuration(
            "Local embedding provider requires --features local-embeddings-fastembed".to_string(),
        )),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "hash" => Ok(Arc::new(HashEmbedder::new(
            config.dims.unwrap_or(HASH_EMBEDDER_DIMS),
        )?)),
        other => Err(RagError::Configuration(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ollama_response() {
        let json = serde_json::json!({ "embeddings": [[0.1, 0.2], [0.3, 0.4]] });
        let out = parse_ollama_response(&json).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[1][0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_parse_ollama_response_rejects_garbage() {
        assert!(parse_ollama_response(&serde_json::json!({})).is_err());
        assert!(parse_ollama_response(&serde_json::json!({ "embeddings": [[0.1, "x"]] })).is_err());
    }

    #[test]
    fn test_create_hash_embedder() {
        let config = EmbeddingConfig {
            provider: "hash".to_string(),
            dims: Some(64),
            ..EmbeddingConfig::default()
        };
        let e = create_embedder(&config).unwrap();
        assert_eq!(e.model_name(), "hash");
        assert_eq!(e.dims(), 64);
    }

    #[test]
    fn test_ollama_requires_model() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }

    #[cfg(feature = "local-embeddings-fastembed")]
    #[test]
    fn test_local_embedder_is_lazy() {
        // Construction must not download or load anything.
        let e = create_embedder(&EmbeddingConfig::default()).unwrap();
        assert_eq!(e.model_name(), "all-minilm-l6-v2");
        assert_eq!(e.dims(), 384);
    }

    #[cfg(feature = "local-embeddings-fastembed")]
    #[test]
    fn test_unknown_local_model_rejected() {
        let config = EmbeddingConfig {
            model: Some("not-a-model".to_string()),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }
}
