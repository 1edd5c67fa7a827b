//! Language-model backends for the `carag` binary.
//!
//! - `stub`: [`StubLlm`] from the core crate; echoes the prompt.
//! - `ollama`: [`OllamaLlm`], `POST /api/generate` with `stream: false`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use confluence_rag_core::error::{RagError, Result};
use confluence_rag_core::llm::{LanguageModel, StubLlm};

use crate::config::LlmConfig;

/// Text generation through a local Ollama instance.
pub struct OllamaLlm {
    name: String,
    model: String,
    url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaLlm {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            RagError::Configuration("llm.model required for Ollama provider".to_string())
        })?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::llm(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: format!("ollama:{}", model),
            model,
            url: url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaLlm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                RagError::llm(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::llm(format!(
                "Ollama API error {}: {}",
                status, body_text
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RagError::llm(format!("invalid Ollama response: {}", e)))?;
        parse_generate(parsed)
    }
}

fn parse_generate(resp: GenerateResponse) -> Result<String> {
    if let Some(err) = resp.error {
        return Err(RagError::llm(err));
    }
    resp.response
        .ok_or_else(|| RagError::llm("Ollama response missing `response` field"))
}

/// Create the configured [`LanguageModel`].
pub fn create_llm(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "stub" => Ok(Arc::new(StubLlm)),
        "ollama" => Ok(Arc::new(OllamaLlm::new(config)?)),
        other => Err(RagError::Configuration(format!(
            "Unknown llm provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate() {
        let ok: GenerateResponse =
            serde_json::from_str(r#"{"model":"m","response":"We chose Kafka.","done":true}"#).unwrap();
        assert_eq!(parse_generate(ok).unwrap(), "We chose Kafka.");

        let err: GenerateResponse = serde_json::from_str(r#"{"error":"model not found"}"#).unwrap();
        assert!(parse_generate(err).unwrap_err().to_string().contains("model not found"));
    }

    #[test]
    fn test_create_llm() {
        assert_eq!(create_llm(&LlmConfig::default()).unwrap().name(), "stub");
        let cfg = LlmConfig {
            provider: "ollama".to_string(),
            model: Some("llama3.1".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(create_llm(&cfg).unwrap().name(), "ollama:llama3.1");
    }
}
