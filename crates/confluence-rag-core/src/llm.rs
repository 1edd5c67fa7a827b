//! Language-model collaborator contract.

use async_trait::async_trait;

use crate::error::Result;

/// Opaque text generation: prompt in, completion out. No streaming.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short identifier for logs (e.g. `"stub"`, `"ollama:llama3.1"`).
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Placeholder model that echoes the grounded context it was given.
///
/// Useful to inspect prompts end to end before a real model is wired in.
#[derive(Debug, Clone, Default)]
pub struct StubLlm;

/// Number of prompt characters echoed by [`StubLlm`].
const STUB_ECHO_CHARS: usize = 2000;

#[async_trait]
impl LanguageModel for StubLlm {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let echoed: String = prompt.chars().take(STUB_ECHO_CHARS).collect();
        Ok(format!(
            "LLM stub: replace with a real model call.\n\n\
             Here is the grounded context I would answer from:\n\n{}",
            echoed
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_generates_text() {
        let out = StubLlm.generate("hello").await.unwrap();
        assert!(out.starts_with("LLM stub"));
        assert!(out.ends_with("hello"));
    }

    #[tokio::test]
    async fn test_stub_truncates_long_prompts() {
        let prompt = "x".repeat(5000);
        let out = StubLlm.generate(&prompt).await.unwrap();
        assert!(out.ends_with(&"x".repeat(STUB_ECHO_CHARS)));
        assert!(!out.contains(&"x".repeat(STUB_ECHO_CHARS + 1)));
    }
}
