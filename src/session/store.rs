//! Durable per-user session files.
//!
//! Each user has one `<user_id>_history.json` file in the session directory.
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash mid-write leaves the previous version intact.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::model::SessionRecord;
use crate::error::{DeskError, Result};

const HISTORY_SUFFIX: &str = "_history.json";

#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `user_id`'s record. Path separators and other characters
    /// outside `[A-Za-z0-9._@-]` are replaced with `_`.
    pub fn path_for(&self, user_id: &str) -> PathBuf {
        let safe: String = user_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}{}", safe, HISTORY_SUFFIX))
    }

    pub async fn save(&self, record: &SessionRecord) -> Result<()> {
        let path = self.path_for(&record.user_id);
        let body = serde_json::to_vec_pretty(record)?;
        let tmp = path.with_extension("json.tmp");

        let write = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&tmp, &body).await?;
            tokio::fs::rename(&tmp, &path).await
        };
        write.await.map_err(|e| {
            DeskError::Persistence(format!(
                "failed to save session for {}: {}",
                record.user_id, e
            ))
        })
    }

    /// Load `user_id`'s record; `Ok(None)` when no file exists.
    ///
    /// A file that was read but does not parse is [`DeskError::CorruptRecord`];
    /// any other failure to read it is [`DeskError::Persistence`].
    pub async fn load(&self, user_id: &str) -> Result<Option<SessionRecord>> {
        let path = self.path_for(user_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let record =
                    serde_json::from_slice(&bytes).map_err(|e| DeskError::CorruptRecord {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DeskError::Persistence(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Move `user_id`'s unparseable file aside to
    /// `<user_id>_history.json.corrupt-<timestamp>` and return the new path.
    pub async fn quarantine(&self, user_id: &str, now: DateTime<Utc>) -> Result<PathBuf> {
        let path = self.path_for(user_id);
        let stamp = now.format("%Y%m%dT%H%M%S%.3fZ");
        let aside = path.with_extension(format!("json.corrupt-{}", stamp));
        tokio::fs::rename(&path, &aside).await.map_err(|e| {
            DeskError::Persistence(format!(
                "failed to move {} aside: {}",
                path.display(),
                e
            ))
        })?;
        Ok(aside)
    }

    /// Load every record in the directory, skipping unreadable files.
    pub async fn load_all(&self) -> Result<Vec<SessionRecord>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_history = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(HISTORY_SUFFIX))
                .unwrap_or(false);
            if !is_history {
                continue;
            }
            let parsed = tokio::fs::read(&path)
                .await
                .map_err(DeskError::from)
                .and_then(|bytes| {
                    serde_json::from_slice::<SessionRecord>(&bytes).map_err(DeskError::from)
                });
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "skipping unreadable session file"
                ),
            }
        }
        records.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::model::EndReason;
    use chrono::Utc;

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions"));

        let now = Utc::now();
        let mut record = SessionRecord::new("alice", now);
        record.add_interaction("library hours?", "8am to 10pm.", now);
        record.rollover(now, EndReason::Goodbye);
        record.add_interaction("still there?", "Yes.", now);
        store.save(&record).await.unwrap();

        let loaded = store.load("alice").await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(store.path_for("alice").ends_with("alice_history.json"));
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        std::fs::write(store.path_for("bad"), "{ not json").unwrap();
        let err = store.load("bad").await.unwrap_err();
        assert!(matches!(err, DeskError::CorruptRecord { .. }));
    }

    #[tokio::test]
    async fn test_unreadable_file_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        std::fs::create_dir(store.path_for("odd")).unwrap();
        let err = store.load("odd").await.unwrap_err();
        assert!(matches!(err, DeskError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_quarantine_moves_file_aside() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        std::fs::write(store.path_for("bad"), "{ \"keep me\"").unwrap();

        let aside = store.quarantine("bad", Utc::now()).await.unwrap();
        assert!(!store.path_for("bad").exists());
        let name = aside.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("bad_history.json.corrupt-"));
        assert_eq!(std::fs::read_to_string(&aside).unwrap(), "{ \"keep me\"");
        assert!(store.load("bad").await.unwrap().is_none());
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_loads_file_with_naive_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        std::fs::write(
            store.path_for("priya"),
            r#"{
  "user_id": "priya",
  "created_at": "2025-01-10T09:00:00.123456",
  "all_sessions": [
    {
      "session_id": 1,
      "start_time": "2025-01-10T09:00:00.123456",
      "end_time": "2025-01-10T09:05:00.000001",
      "conversation": [
        {"timestamp": "2025-01-10T09:01:00.500000", "question": "hostel fees?", "answer": "Rs 40,000 per semester."}
      ],
      "message_count": 1
    }
  ],
  "current_session": {
    "start_time": "2025-01-10T10:00:00.000001",
    "conversation": [
      {"timestamp": "2025-01-10T10:00:10.250000", "question": "library hours?", "answer": "8am to 10pm."}
    ],
    "last_activity": "2025-01-10T10:00:10.250000"
  }
}"#,
        )
        .unwrap();

        let record = store.load("priya").await.unwrap().unwrap();
        assert_eq!(record.all_sessions.len(), 1);
        assert_eq!(record.conversation().len(), 1);

        // Saving rewrites the same history with RFC 3339 timestamps.
        store.save(&record).await.unwrap();
        let reloaded = store.load("priya").await.unwrap().unwrap();
        assert_eq!(reloaded, record);
    }

    #[tokio::test]
    async fn test_load_all_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let now = Utc::now();
        store.save(&SessionRecord::new("bob", now)).await.unwrap();
        store.save(&SessionRecord::new("amy", now)).await.unwrap();
        std::fs::write(dir.path().join("zed_history.json"), "[]").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let users: Vec<String> = store
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.user_id)
            .collect();
        assert_eq!(users, vec!["amy", "bob"]);
    }

    #[test]
    fn test_user_id_is_sanitized() {
        let store = SessionStore::new("/tmp/s");
        let path = store.path_for("../etc/passwd");
        assert_eq!(path, PathBuf::from("/tmp/s/.._etc_passwd_history.json"));
    }
}
