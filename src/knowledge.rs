//! The knowledge base: both indexes plus the retrieval engine, owned by one
//! explicitly constructed value that callers share by reference.
//!
//! Each index is built at most once per [`KnowledgeBase`]. Concurrent first
//! lookups wait on the same initialization instead of racing to build twice,
//! and a failed build leaves the slot empty so the next call retries.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::{Config, DocumentsConfig, RecordsConfig, RetrievalConfig};
use crate::document_index;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::Result;
use crate::index::SearchIndex;
use crate::models::{ContextBundle, Lookup};
use crate::notify::{self, with_progress, StatusNotifier};
use crate::record_index;
use crate::rerank::{self, RelevanceScorer};
use crate::retrieval::RetrievalEngine;

pub struct KnowledgeBase {
    documents_config: DocumentsConfig,
    records_config: RecordsConfig,
    retrieval: RetrievalConfig,
    engine: RetrievalEngine,
    documents: OnceCell<SearchIndex>,
    records: OnceCell<SearchIndex>,
}

impl KnowledgeBase {
    pub fn new(
        config: &Config,
        provider: Arc<dyn EmbeddingProvider>,
        scorer: Option<Arc<dyn RelevanceScorer>>,
    ) -> Self {
        Self {
            documents_config: config.documents.clone(),
            records_config: config.records.clone(),
            retrieval: config.retrieval.clone(),
            engine: RetrievalEngine::new(provider, scorer),
            documents: OnceCell::new(),
            records: OnceCell::new(),
        }
    }

    /// Build the embedding provider and relevance scorer named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = embedding::create_provider(&config.embedding)?;
        let scorer = rerank::create_scorer(&config.rerank)?;
        Ok(Self::new(config, provider, scorer))
    }

    pub fn engine(&self) -> &RetrievalEngine {
        &self.engine
    }

    /// Load or build the document index. Safe to call repeatedly.
    pub async fn init_documents(&self) -> Result<&SearchIndex> {
        self.documents
            .get_or_try_init(|| async {
                document_index::build_or_load(
                    &self.documents_config,
                    self.engine.provider().as_ref(),
                )
                .await
            })
            .await
    }

    /// Build the record index. Safe to call repeatedly; only the first
    /// successful call builds.
    pub async fn init_records(&self) -> Result<&SearchIndex> {
        self.records
            .get_or_try_init(|| async {
                record_index::build(&self.records_config, self.engine.provider().as_ref()).await
            })
            .await
    }

    /// Initialize both indexes.
    pub async fn initialize(&self) -> Result<()> {
        let docs = self.init_documents().await?;
        let records = self.init_records().await?;
        info!(
            documents = docs.len(),
            records = records.len(),
            "knowledge base ready"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.documents.initialized() && self.records.initialized()
    }

    /// Document retrieval with the configured `document_k` / `document_top_n`.
    ///
    /// Fails with `IndexNotInitialized` if the document index was never built.
    pub async fn retrieve_documents(&self, query: &str) -> Result<ContextBundle> {
        self.engine
            .retrieve_documents(
                self.documents.get(),
                query,
                self.retrieval.document_k,
                self.retrieval.document_top_n,
            )
            .await
    }

    /// Record retrieval with the configured `record_k` / `record_top_n`.
    pub async fn retrieve_records(
        &self,
        query: &str,
        include_embeddings: bool,
    ) -> Result<ContextBundle> {
        self.engine
            .retrieve_records(
                self.records.get(),
                query,
                self.retrieval.record_k,
                self.retrieval.record_top_n,
                include_embeddings,
            )
            .await
    }

    /// Answer a document question: initialize if needed, retrieve, and report
    /// progress to `notifier` when the lookup is slow.
    pub async fn lookup_documents(
        &self,
        query: &str,
        notifier: Option<&dyn StatusNotifier>,
    ) -> Result<Lookup> {
        let work = async {
            self.init_documents().await?;
            self.retrieve_documents(query).await
        };
        let bundle = with_progress(
            notifier,
            self.status_delay(),
            notify::DOCUMENTS_PROGRESS,
            notify::DOCUMENTS_DONE,
            work,
        )
        .await?;
        Ok(bundle.into_lookup())
    }

    /// Answer a calendar or faculty question from the record index.
    pub async fn lookup_records(
        &self,
        query: &str,
        notifier: Option<&dyn StatusNotifier>,
    ) -> Result<Lookup> {
        let work = async {
            self.init_records().await?;
            self.retrieve_records(query, false).await
        };
        let bundle = with_progress(
            notifier,
            self.status_delay(),
            notify::RECORDS_PROGRESS,
            notify::RECORDS_DONE,
            work,
        )
        .await?;
        Ok(bundle.into_lookup())
    }

    fn status_delay(&self) -> Duration {
        Duration::from_millis(self.retrieval.status_delay_ms)
    }
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("documents_ready", &self.documents.initialized())
            .field("records_ready", &self.records.initialized())
            .field("reranking", &self.engine.has_scorer())
            .finish()
    }
}

