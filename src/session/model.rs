//! Persisted session record and its in-memory transitions.
//!
//! The JSON layout is one object per user:
//!
//! ```json
//! {
//!   "user_id": "alice",
//!   "created_at": "2025-01-10T09:00:00Z",
//!   "all_sessions": [
//!     { "session_id": 1, "start_time": "...", "end_time": "...",
//!       "conversation": [ { "timestamp": "...", "question": "...", "answer": "..." } ],
//!       "message_count": 1, "end_reason": "goodbye" }
//!   ],
//!   "current_session": { "start_time": "...", "conversation": [], "last_activity": "..." }
//! }
//! ```
//!
//! Timestamps are written as RFC 3339 UTC. Files written by earlier
//! deployments carry naive ISO-8601 strings (`2025-01-10T09:00:00.123456`);
//! those load as UTC rather than being rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod timestamp {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer};

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}

/// One question/answer turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub answer: String,
}

/// Why a conversation was archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The user said goodbye.
    Goodbye,
    /// No activity for longer than the idle timeout.
    Timeout,
    /// Ended by the host application.
    Manual,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EndReason::Goodbye => "goodbye",
            EndReason::Timeout => "timeout",
            EndReason::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// A completed conversation. Numbered from 1 and never modified once archived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedSession {
    pub session_id: u32,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub start_time: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub end_time: DateTime<Utc>,
    pub conversation: Vec<Interaction>,
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentSession {
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub conversation: Vec<Interaction>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub last_activity: DateTime<Utc>,
}

impl CurrentSession {
    fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            start_time: now,
            conversation: Vec::new(),
            last_activity: now,
        }
    }
}

/// Everything persisted for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub all_sessions: Vec<ArchivedSession>,
    pub current_session: CurrentSession,
}

impl SessionRecord {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            created_at: now,
            all_sessions: Vec::new(),
            current_session: CurrentSession::starting_at(now),
        }
    }

    pub fn conversation(&self) -> &[Interaction] {
        &self.current_session.conversation
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.current_session.last_activity
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.current_session.last_activity = now;
    }

    /// Append a turn and mark the user active.
    pub fn add_interaction(&mut self, question: &str, answer: &str, now: DateTime<Utc>) {
        self.touch(now);
        self.current_session.conversation.push(Interaction {
            timestamp: now,
            question: question.to_string(),
            answer: answer.to_string(),
        });
    }

    /// Archive the live conversation (if any) and start a fresh one.
    ///
    /// Returns the archived session's number, or `None` when the conversation
    /// was empty and nothing was archived. Timestamps reset either way.
    pub fn rollover(&mut self, now: DateTime<Utc>, reason: EndReason) -> Option<u32> {
        let previous =
            std::mem::replace(&mut self.current_session, CurrentSession::starting_at(now));
        if previous.conversation.is_empty() {
            return None;
        }
        let session_id = self.all_sessions.len() as u32 + 1;
        self.all_sessions.push(ArchivedSession {
            session_id,
            start_time: previous.start_time,
            end_time: now,
            message_count: previous.conversation.len(),
            conversation: previous.conversation,
            end_reason: Some(reason),
        });
        Some(session_id)
    }

    /// Fold `pending`, state recorded in memory while this persisted record
    /// could not be read, into `self`. Pending archives are renumbered to
    /// follow the persisted ones and pending turns are appended.
    pub fn absorb(&mut self, pending: SessionRecord) {
        for mut archived in pending.all_sessions {
            archived.session_id = self.all_sessions.len() as u32 + 1;
            self.all_sessions.push(archived);
        }
        let current = &mut self.current_session;
        if current.conversation.is_empty() {
            current.start_time = pending.current_session.start_time;
        }
        current
            .conversation
            .extend(pending.current_session.conversation);
        current.last_activity = current
            .last_activity
            .max(pending.current_session.last_activity);
    }

    /// Seconds since the last activity, clamped at zero.
    pub fn idle_secs(&self, now: DateTime<Utc>) -> f64 {
        let idle = now - self.current_session.last_activity;
        (idle.num_milliseconds().max(0) as f64) / 1000.0
    }

    /// The last `count` turns rendered as `User:` / `Assistant:` lines.
    pub fn recent_context(&self, count: usize) -> String {
        let conversation = self.conversation();
        let start = conversation.len().saturating_sub(count);
        conversation[start..]
            .iter()
            .flat_map(|i| {
                [
                    format!("User: {}", i.question),
                    format!("Assistant: {}", i.answer),
                ]
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
