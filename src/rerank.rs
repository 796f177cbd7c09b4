//! Pairwise relevance scoring for the document rerank stage.
//!
//! A [`RelevanceScorer`] rates each (query, passage) pair independently, which
//! is slower than embedding similarity but noticeably more precise. The local
//! implementation runs a fastembed cross-encoder on the blocking pool.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::RerankConfig;
use crate::error::{DeskError, Result};

pub const DEFAULT_RERANK_MODEL: &str = "bge-reranker-base";

#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// One score per passage, in input order. Higher is more relevant.
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>>;
}

/// Cross-encoder scorer backed by fastembed's `TextRerank`.
///
/// The model is loaded on first use and kept for the lifetime of the scorer.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalReranker {
    model_name: String,
    batch_size: Option<usize>,
    model: Arc<std::sync::Mutex<Option<fastembed::TextRerank>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalReranker {
    pub fn new(config: &RerankConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_RERANK_MODEL.to_string());
        config_to_reranker_model(&model_name)?;
        Ok(Self {
            model_name,
            batch_size: config.batch_size,
            model: Arc::new(std::sync::Mutex::new(None)),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl RelevanceScorer for LocalReranker {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }
        let model_id = config_to_reranker_model(&self.model_name)?;
        let slot = self.model.clone();
        let batch_size = self.batch_size;
        let query = query.to_string();
        let passages = passages.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = slot
                .lock()
                .map_err(|_| DeskError::Rerank("reranker lock poisoned".to_string()))?;
            if guard.is_none() {
                tracing::info!(model = ?model_id, "loading cross-encoder reranker");
                let loaded = fastembed::TextRerank::try_new(fastembed::RerankInitOptions::new(
                    model_id,
                ))
                .map_err(|e| DeskError::Rerank(format!("failed to initialize reranker: {}", e)))?;
                *guard = Some(loaded);
            }
            let model = guard
                .as_mut()
                .ok_or_else(|| DeskError::Rerank("reranker unavailable".to_string()))?;

            let documents: Vec<&str> = passages.iter().map(|p| p.as_str()).collect();
            let results = model
                .rerank(query.as_str(), &documents, false, batch_size)
                .map_err(|e| DeskError::Rerank(format!("rerank failed: {}", e)))?;

            // fastembed returns results sorted by score; map back to input order.
            let mut scores = vec![f32::NEG_INFINITY; documents.len()];
            for r in results {
                if let Some(slot) = scores.get_mut(r.index) {
                    *slot = r.score;
                }
            }
            Ok(scores)
        })
        .await
        .map_err(|e| DeskError::Rerank(format!("rerank task failed: {}", e)))?
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_reranker_model(name: &str) -> Result<fastembed::RerankerModel> {
    match name {
        "bge-reranker-base" => Ok(fastembed::RerankerModel::BGERerankerBase),
        "bge-reranker-v2-m3" => Ok(fastembed::RerankerModel::BGERerankerV2M3),
        "jina-reranker-v1-turbo-en" => Ok(fastembed::RerankerModel::JINARerankerV1TurboEn),
        other => Err(DeskError::Config(format!(
            "Unknown rerank model: '{}'. Supported models: \
             bge-reranker-base, bge-reranker-v2-m3, jina-reranker-v1-turbo-en",
            other
        ))),
    }
}

/// Create the scorer named by `config.provider`; `None` when disabled.
pub fn create_scorer(config: &RerankConfig) -> Result<Option<Arc<dyn RelevanceScorer>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Some(Arc::new(LocalReranker::new(config)?))),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => Err(DeskError::Config(
            "Local reranker requires --features local-embeddings-fastembed".to_string(),
        )),
        other => Err(DeskError::Config(format!(
            "Unknown rerank provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_yields_none() {
        let scorer = create_scorer(&RerankConfig {
            provider: "disabled".to_string(),
            ..RerankConfig::default()
        })
        .unwrap();
        assert!(scorer.is_none());
    }

    #[test]
    fn test_unknown_provider() {
        let result = create_scorer(&RerankConfig {
            provider: "cohere".to_string(),
            ..RerankConfig::default()
        });
        assert!(matches!(result, Err(DeskError::Config(_))));
    }

    #[cfg(feature = "local-embeddings-fastembed")]
    #[test]
    fn test_unknown_local_model() {
        let result = LocalReranker::new(&RerankConfig {
            provider: "local".to_string(),
            model: Some("not-a-reranker".to_string()),
            batch_size: None,
        });
        assert!(result.is_err());
    }

    #[cfg(feature = "local-embeddings-fastembed")]
    #[test]
    fn test_local_defaults() {
        let scorer = LocalReranker::new(&RerankConfig::default()).unwrap();
        assert_eq!(scorer.model_name(), DEFAULT_RERANK_MODEL);
    }
}
