//! Wiki collaborator contract and Confluence page types.
//!
//! The pipeline only needs three things from the wiki: a CQL search that
//! returns page ids, a page fetch that returns storage-format markup plus
//! metadata, and a way to turn a page into its browser URL.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;

/// Terms that bias page search toward architecture decisions.
pub const DECISION_TERMS: &[&str] = &["ADR", "Decision", "Minutes", "Architecture Decision"];

/// Domain terms appended to [`DECISION_TERMS`] when none are configured.
pub const DEFAULT_DOMAIN_TERMS: &[&str] = &["Agentic AI", "Agentic AI Platform"];

/// A search result; only the id is needed to fetch the full page.
#[derive(Debug, Clone, Deserialize)]
pub struct PageRef {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// A page as returned by `GET /wiki/rest/api/content/{id}?expand=body.storage,version,space,_links`.
///
/// Every nested object may be missing or null in the payload; accessors
/// supply the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WikiPage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub version: Option<PageVersion>,
    #[serde(default)]
    pub space: Option<PageSpace>,
    #[serde(default)]
    pub body: Option<PageBody>,
    #[serde(default, rename = "_links")]
    pub links: Option<PageLinks>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageVersion {
    #[serde(default)]
    pub number: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageSpace {
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageBody {
    #[serde(default)]
    pub storage: Option<StorageBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageBody {
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageLinks {
    #[serde(default)]
    pub webui: Option<String>,
    #[serde(default)]
    pub base: Option<String>,
}

impl WikiPage {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    /// `version.number`, or 0 when absent.
    pub fn version_number(&self) -> u32 {
        self.version.as_ref().and_then(|v| v.number).unwrap_or(0)
    }

    /// `space.key`, if present and non-empty.
    pub fn space_key(&self) -> Option<&str> {
        self.space
            .as_ref()
            .and_then(|s| s.key.as_deref())
            .filter(|k| !k.is_empty())
    }

    /// `body.storage.value`, or an empty string.
    pub fn storage_markup(&self) -> &str {
        self.body
            .as_ref()
            .and_then(|b| b.storage.as_ref())
            .and_then(|s| s.value.as_deref())
            .unwrap_or("")
    }

    pub fn webui(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|l| l.webui.as_deref())
            .filter(|w| !w.is_empty())
    }

    pub fn links_base(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|l| l.base.as_deref())
            .filter(|b| !b.is_empty())
    }
}

/// Source of raw wiki pages.
#[async_trait]
pub trait WikiSource: Send + Sync {
    /// Run a CQL search and return up to `limit` page references.
    async fn search_pages(&self, cql: &str, limit: usize) -> Result<Vec<PageRef>>;

    /// Fetch one page with body, version, space and links expanded.
    async fn get_page(&self, id: &str) -> Result<WikiPage>;

    /// Absolute browser URL for `page`.
    fn page_url(&self, page: &WikiPage) -> String;
}

/// Resolve the browser URL of `page` against the site `base_url`.
///
/// - no `_links.webui` → `base_url`
/// - absolute `webui` → returned as is (never re-prefixed)
/// - otherwise `base_url + (_links.base or "/wiki") + webui`, with exactly
///   one slash at each join
pub fn resolve_page_url(base_url: &str, page: &WikiPage) -> String {
    let base_url = base_url.trim_end_matches('/');
    let webui = match page.webui() {
        Some(w) => w,
        None => return base_url.to_string(),
    };

    if webui.starts_with("http://") || webui.starts_with("https://") {
        return webui.to_string();
    }

    let mut base_path = page.links_base().unwrap_or("/wiki").to_string();
    // Some payloads carry an absolute `_links.base`; it already includes the host.
    if base_path.starts_with("http://") || base_path.starts_with("https://") {
        let webui = if webui.starts_with('/') {
            webui.to_string()
        } else {
            format!("/{}", webui)
        };
        return format!("{}{}", base_path.trim_end_matches('/'), webui);
    }
    if !base_path.starts_with('/') {
        base_path.insert(0, '/');
    }
    let base_path = base_path.trim_end_matches('/');
    let webui = if webui.starts_with('/') {
        webui.to_string()
    } else {
        format!("/{}", webui)
    };

    format!("{}{}{}", base_url, base_path, webui)
}

/// [`DECISION_TERMS`] followed by `domain_terms`, skipping blanks and repeats.
pub fn search_terms<S: AsRef<str>>(domain_terms: &[S]) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    let extra = domain_terms.iter().map(|t| t.as_ref());
    for term in DECISION_TERMS.iter().copied().chain(extra) {
        let term = term.trim();
        if !term.is_empty() && !terms.iter().any(|t| t == term) {
            terms.push(term.to_string());
        }
    }
    terms
}

/// Build the decision-biased page query.
///
/// ```text
/// type=page AND (text ~ "ADR" OR text ~ "Decision" ...) AND space="ARCH"
/// ```
pub fn decision_cql<S: AsRef<str>>(terms: &[S], space_key: Option<&str>) -> String {
    let term_cql = terms
        .iter()
        .map(|t| t.as_ref().trim())
        .filter(|t| !t.is_empty())
        .map(|t| format!("text ~ \"{}\"", escape_cql(t)))
        .collect::<Vec<_>>()
        .join(" OR ");

    let mut cql = format!("type=page AND ({})", term_cql);
    if let Some(key) = space_key.map(str::trim).filter(|k| !k.is_empty()) {
        cql.push_str(&format!(" AND space=\"{}\"", escape_cql(key)));
    }
    cql
}

fn escape_cql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
