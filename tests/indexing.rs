//! Document and record indexers against real files and a real SQLite index.

mod common;

use common::{config_in, seed_documents, seed_records, write_file, KeywordEmbedder};
use context_desk::document_index;
use context_desk::embedding::EmbeddingProvider;
use context_desk::error::DeskError;
use context_desk::record_index;
use tempfile::TempDir;

#[tokio::test]
async fn test_document_index_builds_one_chunk_per_short_document() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    seed_documents(&config);
    let embedder = KeywordEmbedder::new();

    let index = document_index::build_or_load(&config.documents, &embedder)
        .await
        .unwrap();

    assert_eq!(index.len(), 3);
    let sources: Vec<&str> = index.units().iter().map(|u| u.source.as_str()).collect();
    assert_eq!(sources, vec!["fees.txt", "hostel.md", "library.txt"]);
    assert!(index.units().iter().all(|u| u.position == 0));
    assert!(index.matches("keyword-v1", embedder.dims()));
    assert!(config.documents.persist_path.exists());
}

#[tokio::test]
async fn test_document_index_reloads_without_embedding() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    seed_documents(&config);

    let first = KeywordEmbedder::new();
    let built = document_index::build_or_load(&config.documents, &first)
        .await
        .unwrap();
    let built_texts: Vec<String> = built.units().iter().map(|u| u.text.clone()).collect();
    built.close().await;

    // Sources may change; a matching persisted index is still loaded as-is.
    std::fs::remove_dir_all(&config.documents.source_dir).unwrap();

    let second = KeywordEmbedder::new();
    let loaded = document_index::build_or_load(&config.documents, &second)
        .await
        .unwrap();
    assert_eq!(second.embed_calls(), 0);
    let loaded_texts: Vec<String> = loaded.units().iter().map(|u| u.text.clone()).collect();
    assert_eq!(loaded_texts, built_texts);
    assert_eq!(
        loaded.units()[0].embedding,
        KeywordEmbedder::vector(&built_texts[0])
    );
}

#[tokio::test]
async fn test_document_index_rebuilds_when_model_changes() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    seed_documents(&config);

    let old = KeywordEmbedder::named("keyword-v1");
    document_index::build_or_load(&config.documents, &old)
        .await
        .unwrap()
        .close()
        .await;

    write_file(
        &config.documents.source_dir,
        "exam.txt",
        "Exam schedules are posted two weeks ahead.",
    );

    let new = KeywordEmbedder::named("keyword-v2");
    let rebuilt = document_index::build_or_load(&config.documents, &new)
        .await
        .unwrap();
    assert_eq!(new.embed_calls(), 1);
    assert_eq!(rebuilt.len(), 4);
    assert_eq!(rebuilt.meta().map(|m| m.model.as_str()), Some("keyword-v2"));
}

#[tokio::test]
async fn test_document_index_without_sources_is_ingestion_error() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    std::fs::create_dir_all(&config.documents.source_dir).unwrap();

    let err = document_index::build_or_load(&config.documents, &KeywordEmbedder::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::Ingestion(ref m) if m == "no sources found"));
}

#[tokio::test]
async fn test_document_index_skips_unsupported_and_empty_files() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    let dir = &config.documents.source_dir;
    write_file(dir, "notes.docx", "not picked up by the include globs");
    write_file(dir, "blank.txt", "   \n\n  ");
    write_file(dir, "refund.txt", "Refund requests go to the accounts office.");

    let index = document_index::build_or_load(&config.documents, &KeywordEmbedder::new())
        .await
        .unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(index.units()[0].source, "refund.txt");
}

#[tokio::test]
async fn test_long_document_chunks_overlap() {
    let tmp = TempDir::new().unwrap();
    let mut config = config_in(&tmp);
    config.documents.chunk_size = 200;
    config.documents.chunk_overlap = 20;
    let body = "Attendance below seventy five percent bars a student from the exam. "
        .repeat(10);
    write_file(&config.documents.source_dir, "attendance.txt", &body);

    let chunks = document_index::load_chunks(&config.documents).await.unwrap();
    assert!(chunks.len() > 1);
    assert_eq!(chunks[0].offset, 0);
    for pair in chunks.windows(2) {
        assert!(pair[1].offset > pair[0].offset);
        assert!(pair[1].offset < pair[0].offset + pair[0].text.chars().count());
    }
}

#[tokio::test]
async fn test_record_index_flattens_every_file() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    seed_records(&config);

    let index = record_index::build(&config.records, &KeywordEmbedder::new())
        .await
        .unwrap();

    let texts: Vec<&str> = index.units().iter().map(|u| u.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "Holi is on 2025-03-14.",
            "Diwali break is on 2025-10-20 to 2025-10-24.",
            "Dr. Rao is a Professor in the Physics department. Dr. Rao holds PhD, IIT Delhi. Email: rao@example.edu.",
            "Dr. Mehta is a Lab Coordinator in the Chemistry department. Dr. Mehta holds PhD, IISc. Email: .",
        ]
    );
    let positions: Vec<(&str, usize)> = index
        .units()
        .iter()
        .map(|u| (u.source.as_str(), u.position))
        .collect();
    assert_eq!(
        positions,
        vec![
            ("calendar.json", 0),
            ("calendar.json", 1),
            ("faculty.json", 0),
            ("faculty.json", 1),
        ]
    );
}

#[tokio::test]
async fn test_record_index_skips_malformed_files() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    seed_records(&config);
    write_file(&config.records.source_dir, "broken.json", "{ \"event\": ");

    let index = record_index::build(&config.records, &KeywordEmbedder::new())
        .await
        .unwrap();
    assert_eq!(index.len(), 4);
    assert!(index.units().iter().all(|u| u.source != "broken.json"));
}

#[tokio::test]
async fn test_record_index_rebuild_drops_removed_files() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    seed_records(&config);
    let embedder = KeywordEmbedder::new();

    record_index::build(&config.records, &embedder)
        .await
        .unwrap()
        .close()
        .await;
    std::fs::remove_file(config.records.source_dir.join("faculty.json")).unwrap();

    let index = record_index::build(&config.records, &embedder).await.unwrap();
    // Every remaining sentence was already embedded.
    assert_eq!(embedder.embed_calls(), 1);
    assert_eq!(index.len(), 2);
    assert!(index.units().iter().all(|u| u.source == "calendar.json"));
}

#[tokio::test]
async fn test_record_index_embeds_only_changed_sentences() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    seed_records(&config);
    let embedder = KeywordEmbedder::new();

    record_index::build(&config.records, &embedder)
        .await
        .unwrap()
        .close()
        .await;
    write_file(
        &config.records.source_dir,
        "calendar.json",
        r#"{"holidays": [
            {"event": "Holi", "date": "2025-03-14"},
            {"event": "Onam", "date": "2025-09-05"}
        ]}"#,
    );

    let index = record_index::build(&config.records, &embedder).await.unwrap();
    assert_eq!(embedder.embed_calls(), 2);
    let embedded = embedder.embedded_texts();
    assert_eq!(embedded.len(), 5);
    assert_eq!(embedded[4], "Onam is on 2025-09-05.");
    assert_eq!(index.len(), 4);
    assert_eq!(index.units()[1].text, "Onam is on 2025-09-05.");
    assert_eq!(
        index.units()[0].embedding,
        KeywordEmbedder::vector("Holi is on 2025-03-14.")
    );
}

#[tokio::test]
async fn test_record_index_reembeds_everything_for_new_model() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);
    seed_records(&config);

    record_index::build(&config.records, &KeywordEmbedder::named("keyword-v1"))
        .await
        .unwrap()
        .close()
        .await;

    let next = KeywordEmbedder::named("keyword-v2");
    let index = record_index::build(&config.records, &next).await.unwrap();
    assert_eq!(next.embedded_texts().len(), 4);
    assert_eq!(index.meta().map(|m| m.model.as_str()), Some("keyword-v2"));
}

#[tokio::test]
async fn test_record_index_without_sources_is_ingestion_error() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(&tmp);

    let err = record_index::build(&config.records, &KeywordEmbedder::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::Ingestion(_)));
}
