//! Hit cleanup and grounded-prompt construction.
//!
//! Historical ingests stored some URLs with the site base doubled
//! (`https://acme.atlassian.net/https://acme.atlassian.net/wiki/...`).
//! [`UrlNormalizer`] repairs those on the read path, before dedup and before
//! anything reaches the prompt or the returned sources.

use std::collections::HashSet;

use crate::models::RetrievalHit;

/// Sentinel answer returned when no excerpt supports an answer.
pub const INSUFFICIENT_INFO: &str = "I don't have enough information in Confluence.";

/// Maximum excerpt length, in characters, per hit in the prompt.
pub const MAX_EXCERPT_CHARS: usize = 1200;

/// Rewrites `BASE + BASE + suffix` to `BASE + suffix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlNormalizer {
    /// Site base with exactly one trailing slash; `None` disables repair.
    base: Option<String>,
}

impl UrlNormalizer {
    /// `base_url` is the Confluence site root, with or without a trailing slash.
    pub fn new(base_url: &str) -> Self {
        let trimmed = base_url.trim().trim_end_matches('/');
        Self {
            base: (!trimmed.is_empty()).then(|| format!("{}/", trimmed)),
        }
    }

    /// A normalizer that only trims whitespace.
    pub fn disabled() -> Self {
        Self { base: None }
    }

    /// Trim `url` and strip repeated base prefixes until at most one remains.
    ///
    /// Idempotent: the output never starts with the doubled base.
    pub fn normalize(&self, url: &str) -> String {
        let mut url = url.trim();
        if let Some(base) = &self.base {
            let doubled = format!("{}{}", base, base);
            while url.starts_with(&doubled) {
                url = &url[base.len()..];
            }
        }
        url.to_string()
    }
}

/// Normalize every hit's URL, then keep the first hit per
/// `(url, trimmed text)` pair, preserving order.
pub fn dedup_hits(hits: Vec<RetrievalHit>, normalizer: &UrlNormalizer) -> Vec<RetrievalHit> {
    let mut seen: HashSet<(String, String)> = HashSet::with_capacity(hits.len());
    let mut out = Vec::with_capacity(hits.len());

    for mut hit in hits {
        hit.url = normalizer.normalize(&hit.url);
        let key = (hit.url.clone(), hit.text.trim().to_string());
        if seen.insert(key) {
            out.push(hit);
        }
    }

    out
}

/// Flatten newlines, trim and cap an excerpt at [`MAX_EXCERPT_CHARS`].
pub fn excerpt(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .take(MAX_EXCERPT_CHARS)
        .collect()
}

/// Build the grounded prompt for `question` over already-cleaned `hits`.
pub fn build_prompt(question: &str, hits: &[RetrievalHit]) -> String {
    let mut prompt = format!(
        "You are an enterprise architecture assistant.\n\
         Answer using ONLY the provided Confluence excerpts.\n\
         If insufficient, say: \"{}\"\n\
         Add citations as (URL) at the end of sentences.\n\n\
         Question:\n{}\n\n\
         Confluence Excerpts:\n",
        INSUFFICIENT_INFO, question
    );

    let blocks: Vec<String> = hits
        .iter()
        .map(|h| {
            format!(
                "Source: {}\n({})\nExcerpt: {}\n",
                h.display_title(),
                h.url,
                excerpt(&h.text)
            )
        })
        .collect();
    prompt.push_str(&blocks.join("\n"));
    prompt
}
