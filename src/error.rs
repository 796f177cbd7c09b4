//! Error taxonomy for the context engine and session layer.
//!
//! "No results" is deliberately absent: an empty retrieval is a normal
//! outcome expressed as [`Lookup::NotFound`](crate::models::Lookup::NotFound).
//! Per-file ingestion failures are logged and skipped, so they never reach
//! the caller either.

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeskError {
    /// Retrieval was attempted before the named index was built or loaded.
    #[error("{index} index not initialized; build it before retrieving")]
    IndexNotInitialized { index: String },

    /// Index construction found nothing to ingest.
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// A session record could not be written or read.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A session file was read but its contents could not be parsed.
    #[error("Corrupt session record {path}: {reason}")]
    CorruptRecord { path: String, reason: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Rerank error: {0}")]
    Rerank(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<serde_json::Error> for DeskError {
    fn from(err: serde_json::Error) -> Self {
        DeskError::Serialization(err.to_string())
    }
}

impl DeskError {
    pub(crate) fn not_initialized(index: &str) -> Self {
        DeskError::IndexNotInitialized {
            index: index.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeskError>;
