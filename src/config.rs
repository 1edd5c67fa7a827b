//! Configuration parsing and validation.
//!
//! Tunables come from an optional TOML file (default
//! `./config/carag.toml`); every section and key has a built-in default, so
//! a missing file is the same as an empty one. Confluence credentials are
//! never read from the file: they come from the environment through
//! [`ConfluenceSettings::from_env`].
//!
//! # Example
//!
//! ```toml
//! [chunking]
//! max_chars = 1200
//! overlap_chars = 200
//!
//! [retrieval]
//! top_k = 8
//! rerank = false
//!
//! [ingest]
//! page_limit = 50
//! domain_terms = ["Agentic AI", "Agentic AI Platform"]
//!
//! [index]
//! backend = "weaviate"
//! url = "http://localhost:6060"
//!
//! [embedding]
//! provider = "local"
//! model = "all-minilm-l6-v2"
//!
//! [llm]
//! provider = "stub"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use confluence_rag_core::chunk::{ChunkWindow, DEFAULT_MAX_CHARS, DEFAULT_OVERLAP_CHARS};
use confluence_rag_core::error::RagError;
use confluence_rag_core::wiki::DEFAULT_DOMAIN_TERMS;

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

impl ChunkingConfig {
    pub fn window(&self) -> Result<ChunkWindow> {
        Ok(ChunkWindow::new(self.max_chars, self.overlap_chars)?)
    }
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}
fn default_overlap_chars() -> usize {
    DEFAULT_OVERLAP_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub rerank: bool,
    /// Sources printed under an answer.
    #[serde(default = "default_max_sources_shown")]
    pub max_sources_shown: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            rerank: false,
            max_sources_shown: default_max_sources_shown(),
        }
    }
}

fn default_top_k() -> usize {
    8
}
fn default_max_sources_shown() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
    #[serde(default = "default_domain_terms")]
    pub domain_terms: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            page_limit: default_page_limit(),
            domain_terms: default_domain_terms(),
        }
    }
}

fn default_page_limit() -> usize {
    50
}
fn default_domain_terms() -> Vec<String> {
    DEFAULT_DOMAIN_TERMS.iter().map(|t| t.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `"weaviate"` or `"sqlite"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_index_url")]
    pub url: String,
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_index_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_index_url(),
            path: default_index_path(),
            batch_size: default_index_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "weaviate".to_string()
}
fn default_index_url() -> String {
    "http://localhost:6060".to_string()
}
fn default_index_path() -> PathBuf {
    PathBuf::from("./data/carag.sqlite")
}
fn default_index_batch_size() -> usize {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"local"`, `"ollama"` or `"hash"`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_embedding_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_embedding_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `"stub"` or `"ollama"`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            url: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "stub".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

/// Load and validate configuration from `path`.
///
/// A missing file yields the defaults; an unreadable or malformed file is
/// an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    config
        .chunking
        .window()
        .context("invalid [chunking] section")?;

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }

    // Validate index
    match config.index.backend.as_str() {
        "weaviate" | "sqlite" => {}
        other => bail!(
            "Unknown index backend: '{}'. Must be weaviate or sqlite.",
            other
        ),
    }
    if config.index.batch_size == 0 {
        bail!("index.batch_size must be > 0");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "local" | "hash" => {}
        "ollama" => {
            if config.embedding.model.is_none() {
                bail!("embedding.model must be specified when provider is 'ollama'");
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local, ollama, or hash.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    // Validate llm
    match config.llm.provider.as_str() {
        "stub" => {}
        "ollama" => {
            if config.llm.model.is_none() {
                bail!("llm.model must be specified when provider is 'ollama'");
            }
        }
        other => bail!("Unknown llm provider: '{}'. Must be stub or ollama.", other),
    }

    Ok(())
}

/// Environment variable holding the Confluence site root.
pub const ENV_BASE_URL: &str = "CONFLUENCE_BASE_URL";
pub const ENV_EMAIL: &str = "CONFLUENCE_EMAIL";
pub const ENV_API_TOKEN: &str = "CONFLUENCE_API_TOKEN";
/// Optional default space for `ingest`, `ask`, `search` and `live`.
pub const ENV_SPACE_KEY: &str = "CONFLUENCE_SPACE_KEY";

/// Confluence connection settings.
#[derive(Clone)]
pub struct ConfluenceSettings {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
    pub space_key: Option<String>,
}

impl std::fmt::Debug for ConfluenceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfluenceSettings")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("api_token", &"<redacted>")
            .field("space_key", &self.space_key)
            .finish()
    }
}

impl ConfluenceSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> std::result::Result<Self, RagError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`. Values are trimmed and empty values
    /// count as missing; every missing required name is reported at once.
    pub fn from_lookup<F>(lookup: F) -> std::result::Result<Self, RagError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_url = get(ENV_BASE_URL);
        let email = get(ENV_EMAIL);
        let api_token = get(ENV_API_TOKEN);

        let missing: Vec<&str> = [
            (ENV_BASE_URL, base_url.is_none()),
            (ENV_EMAIL, email.is_none()),
            (ENV_API_TOKEN, api_token.is_none()),
        ]
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| *name)
        .collect();

        match (base_url, email, api_token) {
            (Some(base_url), Some(email), Some(api_token)) => Ok(Self {
                base_url,
                email,
                api_token,
                space_key: get(ENV_SPACE_KEY),
            }),
            _ => Err(RagError::Configuration(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            ))),
        }
    }

    /// `explicit` if given and non-blank, otherwise the configured default space.
    pub fn space_or_default<'a>(&'a self, explicit: Option<&'a str>) -> Option<&'a str> {
        explicit
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or(self.space_key.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_file() {
        let cfg = load_config(Path::new("/nonexistent/carag.toml")).unwrap();
        assert_eq!(cfg.chunking.max_chars, 1200);
        assert_eq!(cfg.chunking.overlap_chars, 200);
        assert_eq!(cfg.retrieval.top_k, 8);
        assert_eq!(cfg.retrieval.max_sources_shown, 5);
        assert_eq!(cfg.ingest.page_limit, 50);
        assert_eq!(cfg.index.backend, "weaviate");
        assert_eq!(cfg.index.url, "http://localhost:6060");
        assert_eq!(cfg.embedding.provider, "local");
        assert_eq!(cfg.llm.provider, "stub");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str("[index]\nbackend = \"sqlite\"\n").unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.index.backend, "sqlite");
        assert_eq!(cfg.index.batch_size, 100);
        assert_eq!(cfg.chunking.max_chars, 1200);
    }

    #[test]
    fn test_overlap_not_below_max_rejected() {
        let cfg: Config =
            toml::from_str("[chunking]\nmax_chars = 100\noverlap_chars = 100\n").unwrap();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_unknown_providers_rejected() {
        let cfg: Config = toml::from_str("[embedding]\nprovider = \"openai\"\n").unwrap();
        assert!(validate(&cfg).is_err());
        let cfg: Config = toml::from_str("[llm]\nprovider = \"gpt\"\n").unwrap();
        assert!(validate(&cfg).is_err());
        let cfg: Config = toml::from_str("[index]\nbackend = \"pinecone\"\n").unwrap();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_ollama_requires_model() {
        let cfg: Config = toml::from_str("[llm]\nprovider = \"ollama\"\n").unwrap();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_env_all_present() {
        let s = ConfluenceSettings::from_lookup(lookup(&[
            (ENV_BASE_URL, " https://acme.atlassian.net "),
            (ENV_EMAIL, "a@acme.com"),
            (ENV_API_TOKEN, "tok"),
            (ENV_SPACE_KEY, ""),
        ]))
        .unwrap();
        assert_eq!(s.base_url, "https://acme.atlassian.net");
        assert_eq!(s.space_key, None);
        assert!(!format!("{:?}", s).contains("tok"));
    }

    #[test]
    fn test_env_missing_names_reported_together() {
        let err = ConfluenceSettings::from_lookup(lookup(&[(ENV_EMAIL, "a@acme.com"), (ENV_API_TOKEN, "  ")]))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(ENV_BASE_URL));
        assert!(msg.contains(ENV_API_TOKEN));
        assert!(!msg.contains(ENV_EMAIL));
    }

    #[test]
    fn test_space_or_default() {
        let s = ConfluenceSettings::from_lookup(lookup(&[
            (ENV_BASE_URL, "https://acme.atlassian.net"),
            (ENV_EMAIL, "a@acme.com"),
            (ENV_API_TOKEN, "tok"),
            (ENV_SPACE_KEY, "ARCH"),
        ]))
        .unwrap();
        assert_eq!(s.space_or_default(None), Some("ARCH"));
        assert_eq!(s.space_or_default(Some("OPS")), Some("OPS"));
        assert_eq!(s.space_or_default(Some(" ")), Some("ARCH"));
    }
}
