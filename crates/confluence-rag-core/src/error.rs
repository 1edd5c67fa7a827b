//! Error taxonomy shared by every pipeline stage.
//!
//! Nothing in the pipeline retries: each variant surfaces to the immediate
//! caller. "No retrieval hits" is deliberately not an error; it produces the
//! sentinel answer instead.

use thiserror::Error;

/// Errors raised by the retrieval pipeline and its collaborators.
#[derive(Error, Debug)]
pub enum RagError {
    /// A wiki or language-model call failed (transport, auth, HTTP status).
    #[error("{service} request failed: {message}")]
    Collaborator {
        service: &'static str,
        message: String,
    },

    /// The embedding model is unavailable or produced unusable output.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The vector store is unavailable, the schema mismatches, or a filter is malformed.
    #[error("vector index error: {0}")]
    Index(String),

    /// Fewer records were written than requested.
    #[error("vector index wrote {written} of {requested} records: {detail}")]
    IncompleteUpsert {
        requested: usize,
        written: usize,
        detail: String,
    },

    /// Required settings are absent or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Coarse category of a [`RagError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Collaborator,
    Embedding,
    Index,
    Configuration,
}

impl RagError {
    /// Shorthand for a failed wiki call.
    pub fn wiki(message: impl Into<String>) -> Self {
        RagError::Collaborator {
            service: "wiki",
            message: message.into(),
        }
    }

    /// Shorthand for a failed language-model call.
    pub fn llm(message: impl Into<String>) -> Self {
        RagError::Collaborator {
            service: "language model",
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::Collaborator { .. } => ErrorKind::Collaborator,
            RagError::Embedding(_) => ErrorKind::Embedding,
            RagError::Index(_) | RagError::IncompleteUpsert { .. } => ErrorKind::Index,
            RagError::Configuration(_) => ErrorKind::Configuration,
        }
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
