//! Lookup tools end to end: lazy initialization, not-found handling and
//! status notifications.

mod common;

use common::{config_in, seed_documents, seed_records, KeywordEmbedder};
use context_desk::config::Config;
use context_desk::models::Lookup;
use context_desk::notify::{self, ChannelNotifier};
use context_desk::tools::{ToolContext, ToolRegistry, DOCUMENTS_NOT_FOUND, RECORDS_NOT_FOUND};
use context_desk::KnowledgeBase;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}

fn context(config: &Config, embedder: KeywordEmbedder) -> (ToolContext, UnboundedReceiver<String>) {
    let kb = Arc::new(KnowledgeBase::new(config, Arc::new(embedder), None));
    let (notifier, rx) = ChannelNotifier::channel();
    (ToolContext::new(kb).with_notifier(Arc::new(notifier)), rx)
}

#[tokio::test]
async fn test_lookup_documents_tool_initializes_on_first_call() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    seed_documents(&config);
    let (ctx, _rx) = context(&config, KeywordEmbedder::new());
    let tools = ToolRegistry::with_builtins();
    let tool = tools.find("lookup_documents").unwrap();

    let out = tool
        .execute(json!({"query": "hostel curfew"}), &ctx)
        .await
        .unwrap();

    assert_eq!(out["query"], "hostel curfew");
    let text = out["context"].as_str().unwrap();
    assert!(text.starts_with("# Hostel"));
}

#[tokio::test]
async fn test_lookup_records_tool_returns_calendar_context() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    seed_records(&config);
    let (ctx, _rx) = context(&config, KeywordEmbedder::new());
    let tools = ToolRegistry::with_builtins();

    let out = tools
        .find("lookup_records")
        .unwrap()
        .execute(json!({"query": "diwali holiday"}), &ctx)
        .await
        .unwrap();

    let text = out["context"].as_str().unwrap();
    assert!(text.starts_with("Diwali break is on 2025-10-20 to 2025-10-24."));
}

#[tokio::test]
async fn test_tools_report_not_found() {
    let tmp = TempDir::new().unwrap();
    let mut config = config_in(&tmp);
    config.retrieval.document_top_n = 0;
    config.retrieval.record_top_n = 0;
    seed_documents(&config);
    seed_records(&config);
    let (ctx, _rx) = context(&config, KeywordEmbedder::new());
    let tools = ToolRegistry::with_builtins();

    let err = tools
        .find("lookup_documents")
        .unwrap()
        .execute(json!({"query": "library hours"}), &ctx)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), DOCUMENTS_NOT_FOUND);

    let err = tools
        .find("lookup_records")
        .unwrap()
        .execute(json!({"query": "holi"}), &ctx)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), RECORDS_NOT_FOUND);
}

#[tokio::test]
async fn test_tool_surfaces_ingestion_failure() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    let (ctx, _rx) = context(&config, KeywordEmbedder::new());

    let err = ToolRegistry::with_builtins()
        .find("lookup_documents")
        .unwrap()
        .execute(json!({"query": "fees"}), &ctx)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Error retrieving document information");
    assert!(format!("{:#}", err).contains("no sources found"));
}

#[tokio::test]
async fn test_tool_rejects_blank_query() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    let (ctx, mut rx) = context(&config, KeywordEmbedder::new());

    let err = ToolRegistry::with_builtins()
        .find("lookup_records")
        .unwrap()
        .execute(json!({"query": "  "}), &ctx)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("query"));
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_fast_lookup_sends_only_completion() {
    let tmp = TempDir::new().unwrap();
    let mut config = config_in(&tmp);
    config.retrieval.status_delay_ms = 60_000;
    seed_documents(&config);
    let (ctx, mut rx) = context(&config, KeywordEmbedder::new());

    let lookup = ctx
        .knowledge
        .lookup_documents("library", None)
        .await
        .unwrap();
    assert!(lookup.is_found());

    ToolRegistry::with_builtins()
        .find("lookup_documents")
        .unwrap()
        .execute(json!({"query": "library"}), &ctx)
        .await
        .unwrap();
    assert_eq!(drain(&mut rx), vec![notify::DOCUMENTS_DONE.to_string()]);
}

#[tokio::test]
async fn test_slow_lookup_sends_progress_before_result() {
    let tmp = TempDir::new().unwrap();
    let mut config = config_in(&tmp);
    config.retrieval.status_delay_ms = 10;
    seed_records(&config);
    let embedder = KeywordEmbedder::new().with_query_delay(Duration::from_millis(200));
    let (ctx, mut rx) = context(&config, embedder);

    let out = ToolRegistry::with_builtins()
        .find("lookup_records")
        .unwrap()
        .execute(json!({"query": "professor"}), &ctx)
        .await
        .unwrap();
    assert!(out["context"].as_str().unwrap().starts_with("Dr. Rao"));

    // Both messages were sent before execute returned, progress first.
    assert_eq!(
        drain(&mut rx),
        vec![
            notify::RECORDS_PROGRESS.to_string(),
            notify::RECORDS_DONE.to_string()
        ]
    );
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_concurrent_first_lookups_build_once() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    seed_documents(&config);
    let embedder = Arc::new(KeywordEmbedder::new());
    let kb = Arc::new(KnowledgeBase::new(&config, embedder.clone(), None));

    let mut handles = Vec::new();
    for query in ["fees", "hostel", "library", "semester"] {
        let kb = kb.clone();
        handles.push(tokio::spawn(async move {
            kb.lookup_documents(query, None).await
        }));
    }
    for handle in handles {
        let lookup = handle.await.unwrap().unwrap();
        assert!(matches!(lookup, Lookup::Found { .. }));
    }
    assert_eq!(embedder.embed_calls(), 1);
}

#[tokio::test]
async fn test_unanswered_lookups_map_to_fallback_text() {
    let tmp = TempDir::new().unwrap();
    let mut config = config_in(&tmp);
    config.retrieval.document_top_n = 0;
    seed_documents(&config);
    let kb = KnowledgeBase::new(&config, Arc::new(KeywordEmbedder::new()), None);

    let empty = kb.lookup_documents("library hours", None).await;
    assert_eq!(notify::fallback_response(&empty), Some(notify::NO_INFO_RESPONSE));

    // No record sources at all.
    let failed = kb.lookup_records("holi", None).await;
    assert_eq!(notify::fallback_response(&failed), Some(notify::ERROR_RESPONSE));
}
