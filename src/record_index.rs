//! Record indexer: structured JSON records to natural-language sentences.
//!
//! Every top-level value in a record file is walked depth-first. Objects are
//! first classified by [`classify`]:
//!
//! | Shape | Rule | Emitted sentence |
//! |-------|------|------------------|
//! | [`RecordShape::Profile`] | has `name` and any of `title`, `department`, `phd` | `<name> is a <title> in the <department> department. <name> holds <phd>. Email: <email>.` |
//! | [`RecordShape::Event`] | has `event` or `name`, and `date` or both `from_date` and `to_date` | `<event or name> is on <date or "from to">.` |
//! | [`RecordShape::Generic`] | any other object | recurse into each field |
//!
//! Arrays recurse element by element and scalars emit their string form, so
//! every leaf of a generic structure surfaces exactly once, in document order.
//! The record index is rebuilt from the source files on every call to
//! [`build`]; sentences whose text is unchanged keep their stored embedding.

use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::config::RecordsConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{DeskError, Result};
use crate::index::{content_hash, SearchIndex};
use crate::models::{IndexUnit, RecordUnit};
use crate::sources;

/// Classification of a JSON object by the fields it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    Profile,
    Event,
    Generic,
}

/// Classify an object by field presence. Profile rules win over Event rules.
pub fn classify(obj: &Map<String, Value>) -> RecordShape {
    let has = |k: &str| obj.contains_key(k);
    if has("name") && (has("title") || has("department") || has("phd")) {
        RecordShape::Profile
    } else if (has("event") || has("name"))
        && (has("date") || (has("from_date") && has("to_date")))
    {
        RecordShape::Event
    } else {
        RecordShape::Generic
    }
}

/// A flattened sentence plus the key path it was reached through.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatSentence {
    pub text: String,
    /// Dotted key path, e.g. `departments.cs`; empty at the top level.
    pub path: String,
}

/// Flatten a JSON tree into sentences.
pub fn flatten(value: &Value) -> Vec<String> {
    flatten_with_paths(value)
        .into_iter()
        .map(|s| s.text)
        .collect()
}

/// Like [`flatten`], keeping the key path of each sentence for diagnostics.
pub fn flatten_with_paths(value: &Value) -> Vec<FlatSentence> {
    let mut out = Vec::new();
    walk(value, "", &mut out);
    out
}

fn walk(value: &Value, path: &str, out: &mut Vec<FlatSentence>) {
    match value {
        Value::Object(obj) => match classify(obj) {
            RecordShape::Profile => out.push(FlatSentence {
                text: profile_sentence(obj),
                path: path.to_string(),
            }),
            RecordShape::Event => out.push(FlatSentence {
                text: event_sentence(obj),
                path: path.to_string(),
            }),
            RecordShape::Generic => {
                for (key, child) in obj {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };
                    walk(child, &child_path, out);
                }
            }
        },
        Value::Array(items) => {
            for item in items {
                walk(item, path, out);
            }
        }
        scalar => out.push(FlatSentence {
            text: scalar_text(scalar),
            path: path.to_string(),
        }),
    }
}

fn profile_sentence(obj: &Map<String, Value>) -> String {
    let name = field(obj, "name");
    format!(
        "{} is a {} in the {} department. {} holds {}. Email: {}.",
        name,
        field(obj, "title"),
        field(obj, "department"),
        name,
        field(obj, "phd"),
        field(obj, "email"),
    )
}

fn event_sentence(obj: &Map<String, Value>) -> String {
    let mut name = field(obj, "event");
    if name.is_empty() {
        name = field(obj, "name");
    }
    let mut date = field(obj, "date");
    if date.is_empty() {
        date = format!("{} to {}", field(obj, "from_date"), field(obj, "to_date"));
    }
    format!("{} is on {}.", name, date)
}

/// A field rendered for a sentence template; missing or null is empty.
fn field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(v) => scalar_text(v),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse and flatten every record file under `config.source_dir`.
///
/// Files that cannot be read or parsed are logged and skipped. Each sentence
/// becomes a [`RecordUnit`] numbered from zero within its file.
pub async fn load_units(config: &RecordsConfig) -> Result<Vec<RecordUnit>> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || collect_units(&config))
        .await
        .map_err(|e| DeskError::Ingestion(format!("record scan task failed: {}", e)))?
}

fn collect_units(config: &RecordsConfig) -> Result<Vec<RecordUnit>> {
    let files = sources::scan(&config.source_dir, &config.include_globs, &[])
        .map_err(|e| DeskError::Ingestion(e.to_string()))?;

    let mut units = Vec::new();
    for file in files {
        let content = match std::fs::read_to_string(&file.path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "skipping unreadable record file");
                continue;
            }
        };
        let data: Value = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "skipping malformed record file");
                continue;
            }
        };

        for (sequence, sentence) in flatten_with_paths(&data).into_iter().enumerate() {
            debug!(source = %file.source_id, path = %sentence.path, sequence, "record unit");
            units.push(RecordUnit {
                text: sentence.text,
                source: file.source_id.clone(),
                sequence,
            });
        }
    }
    Ok(units)
}

/// Rebuild the record index from the source directory.
pub async fn build(
    config: &RecordsConfig,
    provider: &dyn EmbeddingProvider,
) -> Result<SearchIndex> {
    let units = load_units(config).await?;
    if units.is_empty() {
        return Err(DeskError::Ingestion("no sources found".to_string()));
    }

    let mut index = SearchIndex::open(&config.persist_path).await?;
    let mut cached = index.embeddings_by_hash(provider.model_name(), provider.dims());

    let hashes: Vec<String> = units.iter().map(|u| content_hash(&u.text)).collect();
    let mut queued = HashSet::new();
    let mut missing: Vec<String> = Vec::new();
    for (unit, hash) in units.iter().zip(&hashes) {
        if !cached.contains_key(hash) && queued.insert(hash.as_str()) {
            missing.push(unit.text.clone());
        }
    }

    if !missing.is_empty() {
        let fresh = provider.embed(&missing).await?;
        if fresh.len() != missing.len() {
            return Err(DeskError::Embedding(format!(
                "got {} embeddings for {} texts",
                fresh.len(),
                missing.len()
            )));
        }
        for (text, vector) in missing.iter().zip(fresh) {
            cached.insert(content_hash(text), vector);
        }
    }

    let mut embeddings = Vec::with_capacity(units.len());
    for hash in &hashes {
        let vector = cached
            .get(hash)
            .cloned()
            .ok_or_else(|| DeskError::Embedding("missing embedding for record unit".to_string()))?;
        embeddings.push(vector);
    }

    let units: Vec<IndexUnit> = units.into_iter().map(IndexUnit::from).collect();
    let count = units.len();
    index
        .replace_all(provider.model_name(), provider.dims(), units, embeddings)
        .await?;
    info!(
        path = %config.persist_path.display(),
        units = count,
        embedded = missing.len(),
        reused = count.saturating_sub(missing.len()),
        "built record index"
    );
    Ok(index)
}
