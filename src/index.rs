//! Persisted vector index.
//!
//! A [`SearchIndex`] is one SQLite file holding embedded text units plus the
//! model name and dimensionality they were embedded with. Rows are loaded into
//! memory on open; similarity search is brute-force cosine over the loaded
//! vectors, which is plenty for a few thousand policy chunks or record
//! sentences.

use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{DeskError, Result};
use crate::models::IndexUnit;

/// A unit as stored in the index, with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredUnit {
    pub text: String,
    pub source: String,
    pub position: usize,
    /// [`content_hash`] of `text`.
    pub hash: String,
    pub embedding: Vec<f32>,
}

/// Hex SHA-256 of a unit's text, the key embeddings are reused under.
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Embedding model and dimensionality an index was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub model: String,
    pub dims: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    pub unit: &'a StoredUnit,
    pub score: f32,
}

#[derive(Debug)]
pub struct SearchIndex {
    path: PathBuf,
    pool: SqlitePool,
    meta: Option<IndexMeta>,
    units: Vec<StoredUnit>,
}

impl SearchIndex {
    /// Open the index at `path`, creating an empty one if the file is missing.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;

        let meta_rows = sqlx::query("SELECT key, value FROM index_meta")
            .fetch_all(&pool)
            .await?;
        let mut model = None;
        let mut dims = None;
        for row in &meta_rows {
            let key: String = row.get("key");
            let value: String = row.get("value");
            match key.as_str() {
                "model" => model = Some(value),
                "dims" => dims = value.parse::<usize>().ok(),
                _ => {}
            }
        }
        let meta = match (model, dims) {
            (Some(model), Some(dims)) => Some(IndexMeta { model, dims }),
            _ => None,
        };

        let rows = sqlx::query(
            "SELECT source, position, text, hash, embedding FROM units ORDER BY seq ASC",
        )
        .fetch_all(&pool)
        .await?;

        let units = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let position: i64 = row.get("position");
                StoredUnit {
                    text: row.get("text"),
                    source: row.get("source"),
                    position: position.max(0) as usize,
                    hash: row.get("hash"),
                    embedding: blob_to_vec(&blob),
                }
            })
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            pool,
            meta,
            units,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn meta(&self) -> Option<&IndexMeta> {
        self.meta.as_ref()
    }

    pub fn units(&self) -> &[StoredUnit] {
        &self.units
    }

    /// True when the index was built with exactly this model and dimensionality.
    pub fn matches(&self, model: &str, dims: usize) -> bool {
        self.meta
            .as_ref()
            .map(|m| m.model == model && m.dims == dims)
            .unwrap_or(false)
    }

    /// Stored embeddings keyed by content hash, for reuse when rebuilding
    /// with the same model. Empty when the index was built with another one.
    pub fn embeddings_by_hash(&self, model: &str, dims: usize) -> HashMap<String, Vec<f32>> {
        if !self.matches(model, dims) {
            return HashMap::new();
        }
        self.units
            .iter()
            .map(|u| (u.hash.clone(), u.embedding.clone()))
            .collect()
    }

    /// Replace every unit and the metadata in one transaction.
    ///
    /// `embeddings[i]` is the vector for `units[i]`; each must have `dims`
    /// components.
    pub async fn replace_all(
        &mut self,
        model: &str,
        dims: usize,
        units: Vec<IndexUnit>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<()> {
        if units.len() != embeddings.len() {
            return Err(DeskError::Embedding(format!(
                "got {} embeddings for {} units",
                embeddings.len(),
                units.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dims) {
            return Err(DeskError::Embedding(format!(
                "embedding has {} dimensions, expected {}",
                bad.len(),
                dims
            )));
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM units").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM index_meta")
            .execute(&mut *tx)
            .await?;

        let hashes: Vec<String> = units.iter().map(|u| content_hash(&u.text)).collect();
        for (seq, ((unit, vector), hash)) in units
            .iter()
            .zip(embeddings.iter())
            .zip(hashes.iter())
            .enumerate()
        {
            sqlx::query(
                "INSERT INTO units (id, seq, source, position, text, hash, embedding) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(seq as i64)
            .bind(&unit.source)
            .bind(unit.position as i64)
            .bind(&unit.text)
            .bind(hash.as_str())
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("INSERT INTO index_meta (key, value) VALUES ('model', ?), ('dims', ?)")
            .bind(model)
            .bind(dims.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.units = units
            .into_iter()
            .zip(embeddings)
            .zip(hashes)
            .map(|((unit, embedding), hash)| StoredUnit {
                text: unit.text,
                source: unit.source,
                position: unit.position,
                hash,
                embedding,
            })
            .collect();
        self.meta = Some(IndexMeta {
            model: model.to_string(),
            dims,
        });
        Ok(())
    }

    /// The `k` units most similar to `query`, best first.
    ///
    /// Equal scores keep insertion order, so results are deterministic.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit<'_>> {
        let mut hits: Vec<SearchHit<'_>> = self
            .units
            .iter()
            .map(|unit| SearchHit {
                unit,
                score: cosine_similarity(query, &unit.embedding),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        hits
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
