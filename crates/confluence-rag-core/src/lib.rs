//! # confluence-rag core
//!
//! Transport-free logic for answering architecture-decision questions from
//! Confluence content: data models, markup extraction, chunking, the
//! embedder and vector-index traits, the ingestion pipeline, grounding
//! (URL normalization, hit dedup, prompt building) and reranking.
//!
//! This crate contains no HTTP client, SQL driver or model runtime. The
//! `confluence-rag` app crate supplies those behind the traits defined
//! here ([`embedding::Embedder`], [`store::VectorIndex`],
//! [`wiki::WikiSource`], [`llm::LanguageModel`]).
//!
//! ```text
//! write path: WikiSource ─▶ markup ─▶ chunk ─▶ Embedder ─▶ VectorIndex
//! read path:  question ─▶ Embedder ─▶ VectorIndex ─▶ normalize/dedup
//!             ─▶ (rerank) ─▶ prompt ─▶ LanguageModel ─▶ GroundedAnswer
//! ```

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod grounding;
pub mod ingest;
pub mod live;
pub mod llm;
pub mod markup;
pub mod models;
pub mod rerank;
pub mod retrieval;
pub mod router;
pub mod store;
pub mod wiki;

pub use error::{ErrorKind, RagError, Result};
