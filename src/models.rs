//! Core data models for ingestion and retrieval.
//!
//! Session types live in [`crate::session`]; everything here flows through
//! the indexers and the retrieval engine.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A bounded, overlapping slice of a document's text.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub text: String,
    /// Relative path of the originating document.
    pub source: String,
    /// Character offset of the chunk's first character within the document.
    pub offset: usize,
}

/// One natural-language sentence produced by flattening a structured record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUnit {
    pub text: String,
    /// File name of the originating record file.
    pub source: String,
    /// Running position of this unit within its source file.
    pub sequence: usize,
}

/// A text unit ready to be embedded and written to a [`SearchIndex`](crate::index::SearchIndex).
#[derive(Debug, Clone, PartialEq)]
pub struct IndexUnit {
    pub text: String,
    pub source: String,
    /// Chunk offset for documents, sequence index for records.
    pub position: usize,
}

impl From<DocumentChunk> for IndexUnit {
    fn from(chunk: DocumentChunk) -> Self {
        Self {
            text: chunk.text,
            source: chunk.source,
            position: chunk.offset,
        }
    }
}

impl From<RecordUnit> for IndexUnit {
    fn from(unit: RecordUnit) -> Self {
        Self {
            text: unit.text,
            source: unit.source,
            position: unit.sequence,
        }
    }
}

/// A single retrieved unit, ranked within its [`ContextBundle`].
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub text: String,
    pub source: String,
    /// Similarity score, or the relevance scorer's score when reranked.
    pub score: f32,
    /// 1-based position in the bundle.
    pub rank: usize,
    /// Raw embedding, attached only when requested on the record path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// The merged context produced for one query.
#[derive(Debug, Clone, Serialize)]
pub struct ContextBundle {
    pub query: String,
    pub results: Vec<QueryResult>,
    /// Result texts joined by a blank line.
    pub combined_text: String,
    /// Distinct source identifiers in first-seen order.
    pub sources: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ContextBundle {
    pub fn new(query: &str, results: Vec<QueryResult>) -> Self {
        let combined_text = results
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut sources: Vec<String> = Vec::new();
        for r in &results {
            if !sources.contains(&r.source) {
                sources.push(r.source.clone());
            }
        }

        Self {
            query: query.to_string(),
            results,
            combined_text,
            sources,
            timestamp: Utc::now(),
        }
    }

    pub fn empty(query: &str) -> Self {
        Self::new(query, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.combined_text.trim().is_empty()
    }

    /// Convert into the caller-facing outcome. An empty bundle is `NotFound`.
    pub fn into_lookup(self) -> Lookup {
        if self.is_empty() {
            Lookup::NotFound
        } else {
            Lookup::Found {
                query: self.query,
                context: self.combined_text,
                sources: self.sources,
            }
        }
    }
}

/// Outcome of a lookup call; "nothing relevant" is a value, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Lookup {
    Found {
        query: String,
        context: String,
        sources: Vec<String>,
    },
    NotFound,
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found { .. })
    }
}
