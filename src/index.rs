//! Vector index selection and the `carag init` command.

use std::sync::Arc;

use anyhow::Result;

use confluence_rag_core::store::{VectorIndex, COLLECTION};

use crate::config::Config;
use crate::sqlite_store::SqliteIndex;
use crate::weaviate::WeaviateIndex;

/// Open the index backend named by `index.backend`.
pub async fn open_index(config: &Config) -> Result<Arc<dyn VectorIndex>> {
    let index: Arc<dyn VectorIndex> = match config.index.backend.as_str() {
        "sqlite" => Arc::new(SqliteIndex::open(&config.index.path).await?),
        "weaviate" => Arc::new(WeaviateIndex::from_config(&config.index)?),
        other => anyhow::bail!("Unknown index backend: {}", other),
    };
    tracing::debug!(backend = %config.index.backend, "opened vector index");
    Ok(index)
}

/// Close `index` after `work` finishes, whether it succeeded or not.
///
/// An error from `work` takes precedence over an error from closing.
pub async fn close_after<T>(index: &dyn VectorIndex, work: Result<T>) -> Result<T> {
    let closed = index.close().await;
    let value = work?;
    closed?;
    Ok(value)
}

/// Create the `ConfluenceChunk` collection if it is missing.
pub async fn run_init(config: &Config) -> Result<()> {
    let index = open_index(config).await?;
    let result = index.ensure_schema().await.map_err(anyhow::Error::from);
    close_after(index.as_ref(), result).await?;
    println!(
        "Index ready: collection {} ({} backend).",
        COLLECTION, config.index.backend
    );
    Ok(())
}
