//! TOML configuration.
//!
//! Every section has defaults matching a single-host deployment rooted at
//! `./data`, so a config file only needs to name what differs:
//!
//! ```toml
//! [documents]
//! source_dir = "./policies"
//!
//! [session]
//! timeout_secs = 120
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub records: RecordsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_dir")]
    pub source_dir: PathBuf,
    #[serde(default = "default_documents_index")]
    pub persist_path: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_document_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            source_dir: default_documents_dir(),
            persist_path: default_documents_index(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            include_globs: default_document_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./data/documents")
}
fn default_documents_index() -> PathBuf {
    PathBuf::from("./data/index/documents.sqlite")
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_document_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecordsConfig {
    #[serde(default = "default_records_dir")]
    pub source_dir: PathBuf,
    #[serde(default = "default_records_index")]
    pub persist_path: PathBuf,
    #[serde(default = "default_record_globs")]
    pub include_globs: Vec<String>,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            source_dir: default_records_dir(),
            persist_path: default_records_index(),
            include_globs: default_record_globs(),
        }
    }
}

fn default_records_dir() -> PathBuf {
    PathBuf::from("./data/records")
}
fn default_records_index() -> PathBuf {
    PathBuf::from("./data/index/records.sqlite")
}
fn default_record_globs() -> Vec<String> {
    vec!["**/*.json".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RerankConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            batch_size: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_document_k")]
    pub document_k: usize,
    #[serde(default = "default_document_top_n")]
    pub document_top_n: usize,
    #[serde(default = "default_record_k")]
    pub record_k: usize,
    #[serde(default = "default_record_top_n")]
    pub record_top_n: usize,
    /// Delay before a "still working" notification is sent.
    #[serde(default = "default_status_delay_ms")]
    pub status_delay_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            document_k: default_document_k(),
            document_top_n: default_document_top_n(),
            record_k: default_record_k(),
            record_top_n: default_record_top_n(),
            status_delay_ms: default_status_delay_ms(),
        }
    }
}

fn default_document_k() -> usize {
    5
}
fn default_document_top_n() -> usize {
    2
}
fn default_record_k() -> usize {
    10
}
fn default_record_top_n() -> usize {
    5
}
fn default_status_delay_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_session_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_session_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir: default_session_dir(),
            timeout_secs: default_session_timeout(),
            cleanup_interval_secs: default_cleanup_interval(),
            max_context_messages: default_max_context_messages(),
        }
    }
}

fn default_session_dir() -> PathBuf {
    PathBuf::from("./data/sessions")
}
fn default_session_timeout() -> u64 {
    30
}
fn default_cleanup_interval() -> u64 {
    10
}
fn default_max_context_messages() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Chunking
    if config.documents.chunk_size == 0 {
        bail!("documents.chunk_size must be > 0");
    }
    if config.documents.chunk_overlap >= config.documents.chunk_size {
        bail!("documents.chunk_overlap must be smaller than documents.chunk_size");
    }

    // Retrieval
    let r = &config.retrieval;
    if r.document_top_n == 0 || r.record_top_n == 0 {
        bail!("retrieval top_n values must be >= 1");
    }
    if r.document_k < r.document_top_n {
        bail!("retrieval.document_k must be >= retrieval.document_top_n");
    }
    if r.record_k < r.record_top_n {
        bail!("retrieval.record_k must be >= retrieval.record_top_n");
    }

    // Session
    if config.session.timeout_secs == 0 || config.session.cleanup_interval_secs == 0 {
        bail!("session.timeout_secs and session.cleanup_interval_secs must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or local.",
            other
        ),
    }
    if config.embedding.provider == "openai" {
        if config.embedding.model.is_none() {
            bail!("embedding.model must be specified when provider is 'openai'");
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0 when provider is 'openai'");
        }
    }

    match config.rerank.provider.as_str() {
        "disabled" | "local" => {}
        other => bail!(
            "Unknown rerank provider: '{}'. Must be disabled or local.",
            other
        ),
    }

    Ok(())
}
