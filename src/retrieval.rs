//! Retrieval engine.
//!
//! Both modes start with the same similarity search for the `k` nearest units.
//! The document path then optionally reranks those candidates with a
//! [`RelevanceScorer`] before keeping `top_n`; the record path keeps the first
//! `top_n` directly and can attach raw embeddings for diagnostics.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{DeskError, Result};
use crate::index::{SearchHit, SearchIndex};
use crate::models::{ContextBundle, QueryResult};
use crate::rerank::RelevanceScorer;

pub const DOCUMENTS: &str = "documents";
pub const RECORDS: &str = "records";

#[derive(Clone)]
pub struct RetrievalEngine {
    provider: Arc<dyn EmbeddingProvider>,
    scorer: Option<Arc<dyn RelevanceScorer>>,
}

impl RetrievalEngine {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        scorer: Option<Arc<dyn RelevanceScorer>>,
    ) -> Self {
        Self { provider, scorer }
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn has_scorer(&self) -> bool {
        self.scorer.is_some()
    }

    /// Document retrieval: similarity search, optional rerank, keep `top_n`.
    ///
    /// If the scorer fails, the similarity order is used instead.
    pub async fn retrieve_documents(
        &self,
        index: Option<&SearchIndex>,
        query: &str,
        k: usize,
        top_n: usize,
    ) -> Result<ContextBundle> {
        let index = index.ok_or_else(|| DeskError::not_initialized(DOCUMENTS))?;
        let hits = self.candidates(index, query, k).await?;
        if hits.is_empty() {
            return Ok(ContextBundle::empty(query));
        }

        let mut scored: Vec<(SearchHit<'_>, f32)> =
            hits.into_iter().map(|h| (h, h.score)).collect();

        if let Some(scorer) = &self.scorer {
            let passages: Vec<String> = scored.iter().map(|(h, _)| h.unit.text.clone()).collect();
            match scorer.score(query, &passages).await {
                Ok(scores) if scores.len() == scored.len() => {
                    for ((_, s), new) in scored.iter_mut().zip(scores) {
                        *s = new;
                    }
                    // Stable: equal scores keep their similarity rank.
                    scored.sort_by(|a, b| {
                        b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
                    });
                }
                Ok(scores) => warn!(
                    expected = scored.len(),
                    got = scores.len(),
                    "relevance scorer returned wrong number of scores, using similarity order"
                ),
                Err(e) => warn!(error = %e, "relevance scoring failed, using similarity order"),
            }
        }

        let results = scored
            .into_iter()
            .take(top_n)
            .enumerate()
            .map(|(i, (hit, score))| QueryResult {
                text: hit.unit.text.clone(),
                source: hit.unit.source.clone(),
                score,
                rank: i + 1,
                embedding: None,
            })
            .collect();
        Ok(ContextBundle::new(query, results))
    }

    /// Record retrieval: similarity search, keep the first `top_n`.
    pub async fn retrieve_records(
        &self,
        index: Option<&SearchIndex>,
        query: &str,
        k: usize,
        top_n: usize,
        include_embeddings: bool,
    ) -> Result<ContextBundle> {
        let index = index.ok_or_else(|| DeskError::not_initialized(RECORDS))?;
        let hits = self.candidates(index, query, k).await?;

        let results = hits
            .into_iter()
            .take(top_n)
            .enumerate()
            .map(|(i, hit)| QueryResult {
                text: hit.unit.text.clone(),
                source: hit.unit.source.clone(),
                score: hit.score,
                rank: i + 1,
                embedding: include_embeddings.then(|| hit.unit.embedding.clone()),
            })
            .collect();
        Ok(ContextBundle::new(query, results))
    }

    async fn candidates<'a>(
        &self,
        index: &'a SearchIndex,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit<'a>>> {
        if query.trim().is_empty() || index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.provider.embed_query(query).await?;
        let hits = index.search(&query_vec, k);
        debug!(candidates = hits.len(), k, "similarity search");
        Ok(hits)
    }
}
