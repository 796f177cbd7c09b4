//! Shared fixtures for the integration tests: a keyword embedder, scripted
//! relevance scorers, and a temp-dir backed configuration.

#![allow(dead_code)]

use async_trait::async_trait;
use context_desk::config::Config;
use context_desk::embedding::EmbeddingProvider;
use context_desk::error::{DeskError, Result};
use context_desk::rerank::RelevanceScorer;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Words the keyword embedder knows about. One dimension per word plus a
/// constant bias dimension so no vector is ever all zeros.
pub const VOCABULARY: &[&str] = &[
    "fee", "fees", "hostel", "library", "exam", "holiday", "holi", "diwali", "professor",
    "lab", "semester", "refund", "attendance", "scholarship",
];

/// Deterministic embedder: counts vocabulary words in the text.
pub struct KeywordEmbedder {
    model: String,
    embed_calls: AtomicUsize,
    embedded: Mutex<Vec<String>>,
    query_delay: Option<Duration>,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self::named("keyword-v1")
    }

    pub fn named(model: &str) -> Self {
        Self {
            model: model.to_string(),
            embed_calls: AtomicUsize::new(0),
            embedded: Mutex::new(Vec::new()),
            query_delay: None,
        }
    }

    /// Make every query embedding take `delay` of real time.
    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = Some(delay);
        self
    }

    /// Number of batch `embed` calls made so far, excluding queries.
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Every text passed to `embed`, in call order.
    pub fn embedded_texts(&self) -> Vec<String> {
        self.embedded.lock().unwrap().clone()
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let mut v: Vec<f32> = VOCABULARY
            .iter()
            .map(|term| words.iter().filter(|w| *w == term).count() as f32)
            .collect();
        v.push(0.01);
        v
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        VOCABULARY.len() + 1
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.embedded.lock().unwrap().extend(texts.iter().cloned());
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(delay) = self.query_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Self::vector(text))
    }
}

/// Scores 1.0 for passages containing `marker`, 0.0 otherwise.
pub struct MarkerScorer {
    pub marker: String,
}

impl MarkerScorer {
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.to_string(),
        }
    }
}

#[async_trait]
impl RelevanceScorer for MarkerScorer {
    async fn score(&self, _query: &str, passages: &[String]) -> Result<Vec<f32>> {
        Ok(passages
            .iter()
            .map(|p| if p.contains(&self.marker) { 1.0 } else { 0.0 })
            .collect())
    }
}

pub struct FailingScorer;

#[async_trait]
impl RelevanceScorer for FailingScorer {
    async fn score(&self, _query: &str, _passages: &[String]) -> Result<Vec<f32>> {
        Err(DeskError::Rerank("model unavailable".to_string()))
    }
}

/// Returns one score too few.
pub struct ShortScorer;

#[async_trait]
impl RelevanceScorer for ShortScorer {
    async fn score(&self, _query: &str, passages: &[String]) -> Result<Vec<f32>> {
        Ok(vec![1.0; passages.len().saturating_sub(1)])
    }
}

/// A config whose every path lives under `tmp`.
pub fn config_in(tmp: &TempDir) -> Config {
    let root = tmp.path();
    let mut config = Config::default();
    config.documents.source_dir = root.join("documents");
    config.documents.persist_path = root.join("index").join("documents.sqlite");
    config.records.source_dir = root.join("records");
    config.records.persist_path = root.join("index").join("records.sqlite");
    config.session.dir = root.join("sessions");
    config.embedding.provider = "disabled".to_string();
    config.rerank.provider = "disabled".to_string();
    config
}

pub fn write_file(dir: &Path, name: &str, content: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), content).unwrap();
}

/// Three short policy documents, each about one topic.
pub fn seed_documents(config: &Config) {
    let dir = &config.documents.source_dir;
    write_file(
        dir,
        "fees.txt",
        "Tuition fees are due before the semester starts. Late fees apply after the deadline.",
    );
    write_file(
        dir,
        "hostel.md",
        "# Hostel\n\nHostel rooms are allotted by the warden. Hostel curfew is 10 pm.",
    );
    write_file(
        dir,
        "library.txt",
        "The library opens at 8 am. Library cards are issued at the front desk.",
    );
}

pub fn seed_records(config: &Config) {
    let dir = &config.records.source_dir;
    write_file(
        dir,
        "calendar.json",
        r#"{
            "holidays": [
                {"event": "Holi", "date": "2025-03-14"},
                {"name": "Diwali break", "from_date": "2025-10-20", "to_date": "2025-10-24"}
            ]
        }"#,
    );
    write_file(
        dir,
        "faculty.json",
        r#"[
            {"name": "Dr. Rao", "title": "Professor", "department": "Physics", "phd": "PhD, IIT Delhi", "email": "rao@example.edu"},
            {"name": "Dr. Mehta", "title": "Lab Coordinator", "department": "Chemistry", "phd": "PhD, IISc"}
        ]"#,
    );
}
