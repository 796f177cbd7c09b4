//! Document indexer.
//!
//! Loads a persisted document index when one exists, otherwise scans the
//! source directory, extracts and chunks every document, embeds the chunks
//! and persists the result. A persisted index built with a different
//! embedding model is treated as stale and rebuilt.

use tracing::{info, warn};

use crate::chunk::chunk_text;
use crate::config::DocumentsConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{DeskError, Result};
use crate::extract::extract_text;
use crate::index::SearchIndex;
use crate::models::{DocumentChunk, IndexUnit};
use crate::sources;

/// Load the persisted document index, building it first if it is missing,
/// empty, or stale.
pub async fn build_or_load(
    config: &DocumentsConfig,
    provider: &dyn EmbeddingProvider,
) -> Result<SearchIndex> {
    let mut index = SearchIndex::open(&config.persist_path).await?;

    if !index.is_empty() {
        if index.matches(provider.model_name(), provider.dims()) {
            info!(
                path = %config.persist_path.display(),
                units = index.len(),
                "loaded persisted document index"
            );
            return Ok(index);
        }
        warn!(
            path = %config.persist_path.display(),
            persisted = ?index.meta(),
            model = provider.model_name(),
            "document index was built with a different embedding model, rebuilding"
        );
    }

    let chunks = load_chunks(config).await?;
    if chunks.is_empty() {
        return Err(DeskError::Ingestion("no sources found".to_string()));
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = provider.embed(&texts).await?;
    let units: Vec<IndexUnit> = chunks.into_iter().map(IndexUnit::from).collect();
    let count = units.len();

    index
        .replace_all(provider.model_name(), provider.dims(), units, embeddings)
        .await?;
    info!(
        path = %config.persist_path.display(),
        chunks = count,
        "built document index"
    );
    Ok(index)
}

/// Scan, extract and chunk every document under `config.source_dir`.
///
/// Unreadable or unextractable files are logged and skipped.
pub async fn load_chunks(config: &DocumentsConfig) -> Result<Vec<DocumentChunk>> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || collect_chunks(&config))
        .await
        .map_err(|e| DeskError::Ingestion(format!("document scan task failed: {}", e)))?
}

fn collect_chunks(config: &DocumentsConfig) -> Result<Vec<DocumentChunk>> {
    let files = sources::scan(
        &config.source_dir,
        &config.include_globs,
        &config.exclude_globs,
    )
    .map_err(|e| DeskError::Ingestion(e.to_string()))?;

    let mut chunks = Vec::new();
    for file in files {
        let bytes = match std::fs::read(&file.path) {
            Ok(b) => b,
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "skipping unreadable document");
                continue;
            }
        };
        let text = match extract_text(&bytes, &file.content_type) {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "skipping document");
                continue;
            }
        };
        let produced = chunk_text(
            &file.source_id,
            &text,
            config.chunk_size,
            config.chunk_overlap,
        );
        if produced.is_empty() {
            warn!(path = %file.path.display(), "document has no text");
        }
        chunks.extend(produced);
    }
    Ok(chunks)
}
