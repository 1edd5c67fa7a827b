//! # Confluence RAG
//!
//! Answers "what did we decide, and why?" questions from architecture
//! decision records, meeting minutes and design pages kept in Confluence.
//!
//! The pipeline itself (chunking, embedding, indexing, grounding, reranking)
//! lives in the `confluence-rag-core` crate. This crate supplies the
//! concrete collaborators and the `carag` command-line interface.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Confluence  │──▶│  Ingestor   │──▶│ Vector index │
//! │  REST API   │   │ Chunk+Embed │   │ Weaviate/SQL │
//! └──────┬──────┘   └─────────────┘   └──────┬───────┘
//!        │                                   │
//!        ▼                                   ▼
//!  ┌────────────┐                     ┌─────────────┐
//!  │ carag live │                     │  carag ask  │──▶ LLM
//!  └────────────┘                     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export CONFLUENCE_BASE_URL=https://acme.atlassian.net
//! export CONFLUENCE_EMAIL=me@acme.com
//! export CONFLUENCE_API_TOKEN=...
//! carag init
//! carag ingest --space ARCH --limit 50
//! carag ask "What did we decide about the message bus?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and Confluence credentials |
//! | [`confluence`] | Confluence REST client |
//! | [`embedding`] | Local (fastembed), Ollama and hash embedders |
//! | [`llm`] | Language-model backends |
//! | [`weaviate`] | Weaviate vector index |
//! | [`sqlite_store`] | SQLite vector index |
//! | [`index`] | Backend selection and `init` |
//! | [`ingest`] | `ingest` command |
//! | [`ask`] | `ask` command |
//! | [`search`] | `search` command |
//! | [`live`] | `live` command |
//! | [`progress`] | Ingest progress on stderr |
//! | [`logging`] | `tracing` subscriber setup |

pub mod ask;
pub mod config;
pub mod confluence;
pub mod db;
pub mod embedding;
pub mod index;
pub mod ingest;
pub mod live;
pub mod llm;
pub mod logging;
pub mod progress;
pub mod search;
pub mod sqlite_store;
pub mod weaviate;
