//! Session lifecycle controller.
//!
//! Tracks one live [`SessionRecord`] per user. Every mutation of a user's
//! session (recording a turn, a goodbye or timeout rollover, a manual end)
//! runs under that user's own async mutex and persists before the lock is
//! released, so appends and rollovers for one user never interleave while
//! different users proceed in parallel.
//!
//! A failed write is logged and the session is marked dirty; the in-memory
//! record stays authoritative and the next mutation (or [`SessionManager::flush`])
//! writes the full record again. A persisted file is never overwritten
//! unless it was read successfully first.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::model::{EndReason, SessionRecord};
use super::store::SessionStore;
use super::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::{DeskError, Result};

/// Phrases that end a conversation when they appear anywhere in a question.
pub const GOODBYE_PHRASES: &[&str] = &[
    "goodbye",
    "bye",
    "see you",
    "exit",
    "quit",
    "thank you bye",
    "good bye",
    "farewell",
    "see you later",
    "talk to you later",
    "ttyl",
];

/// Case-insensitive substring match against [`GOODBYE_PHRASES`].
pub fn is_goodbye(message: &str) -> bool {
    let lowered = message.trim().to_lowercase();
    GOODBYE_PHRASES.iter().any(|p| lowered.contains(p))
}

struct SessionSlot {
    record: SessionRecord,
    /// False until the persisted record (if any) has been read.
    loaded: bool,
    /// True while the latest state has not reached disk.
    dirty: bool,
}

type SharedSlot = Arc<Mutex<SessionSlot>>;

pub struct SessionManager {
    store: SessionStore,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    sessions: DashMap<String, SharedSlot>,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        info!(
            timeout_secs = config.timeout_secs,
            dir = %config.dir.display(),
            "session manager initialized"
        );
        Self {
            store: SessionStore::new(config.dir.clone()),
            clock,
            config,
            sessions: DashMap::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Number of users with a live session.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn slot(&self, user_id: &str) -> SharedSlot {
        if let Some(existing) = self.sessions.get(user_id) {
            return existing.clone();
        }
        let now = self.clock.now();
        self.sessions
            .entry(user_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(SessionSlot {
                    record: SessionRecord::new(user_id, now),
                    loaded: false,
                    dirty: false,
                }))
            })
            .clone()
    }

    /// Lock a slot, reading the user's persisted record on first access.
    ///
    /// A file that does not parse is moved aside and the user starts fresh.
    /// A file that cannot be read at all is left in place; the slot stays
    /// unloaded, writes are deferred, and the read is retried on the next
    /// access. Turns recorded in the meantime are merged into the record once
    /// it loads.
    async fn lock<'a>(&self, slot: &'a SharedSlot) -> MutexGuard<'a, SessionSlot> {
        let mut guard = slot.lock().await;
        if guard.loaded {
            return guard;
        }

        let user_id = guard.record.user_id.clone();
        match self.store.load(&user_id).await {
            Ok(Some(mut record)) => {
                info!(
                    user_id = %user_id,
                    current = record.conversation().len(),
                    archived = record.all_sessions.len(),
                    "restored session from disk"
                );
                if guard.dirty {
                    let fresh = SessionRecord::new(&user_id, self.clock.now());
                    record.absorb(std::mem::replace(&mut guard.record, fresh));
                }
                guard.record = record;
                guard.loaded = true;
            }
            Ok(None) => {
                info!(user_id = %user_id, "new session created");
                guard.loaded = true;
            }
            Err(DeskError::CorruptRecord { path, reason }) => {
                match self.store.quarantine(&user_id, self.clock.now()).await {
                    Ok(aside) => {
                        warn!(
                            user_id = %user_id,
                            path = %path,
                            moved_to = %aside.display(),
                            error = %reason,
                            "corrupt session file moved aside, starting fresh"
                        );
                        guard.loaded = true;
                    }
                    Err(e) => warn!(
                        user_id = %user_id,
                        error = %e,
                        "corrupt session file could not be moved aside, deferring writes"
                    ),
                }
            }
            Err(e) => warn!(
                user_id = %user_id,
                error = %e,
                "session file unreadable, deferring writes"
            ),
        }
        guard
    }

    async fn persist(&self, slot: &mut SessionSlot) {
        if !slot.loaded {
            slot.dirty = true;
            debug!(
                user_id = %slot.record.user_id,
                "session write deferred until its file can be read"
            );
            return;
        }
        match self.store.save(&slot.record).await {
            Ok(()) => slot.dirty = false,
            Err(e) => {
                slot.dirty = true;
                warn!(
                    user_id = %slot.record.user_id,
                    error = %e,
                    "session write failed, will retry"
                );
            }
        }
    }

    async fn rollover_locked(&self, slot: &mut SessionSlot, reason: EndReason) {
        let now = self.clock.now();
        let count = slot.record.conversation().len();
        match slot.record.rollover(now, reason) {
            Some(session_id) => info!(
                user_id = %slot.record.user_id,
                %reason,
                session_id,
                messages = count,
                "session archived"
            ),
            None => info!(user_id = %slot.record.user_id, %reason, "empty session reset"),
        }
        self.persist(slot).await;
    }

    /// Record a completed turn for `user_id`, creating the session on first
    /// contact. A goodbye question archives the conversation immediately.
    ///
    /// Returns `true` when the session was ended by this message.
    pub async fn handle_message(&self, user_id: &str, question: &str, answer: &str) -> bool {
        let slot = self.slot(user_id);
        let mut guard = self.lock(&slot).await;

        let now = self.clock.now();
        guard.record.add_interaction(question, answer, now);
        self.persist(&mut guard).await;

        if is_goodbye(question) {
            info!(user_id, "goodbye detected");
            self.rollover_locked(&mut guard, EndReason::Goodbye).await;
            return true;
        }
        false
    }

    /// Mark `user_id` active without recording a turn.
    pub async fn touch(&self, user_id: &str) {
        let slot = self.slot(user_id);
        let mut guard = self.lock(&slot).await;
        let now = self.clock.now();
        guard.record.touch(now);
    }

    /// Archive and reset `user_id`'s conversation. Returns `false` for a user
    /// with no session.
    pub async fn end_session(&self, user_id: &str, reason: EndReason) -> bool {
        let slot = match self.sessions.get(user_id) {
            Some(s) => s.clone(),
            None => return false,
        };
        let mut guard = self.lock(&slot).await;
        self.rollover_locked(&mut guard, reason).await;
        true
    }

    /// Roll over every session idle for longer than the timeout.
    ///
    /// Returns the affected user ids.
    pub async fn sweep_idle(&self) -> Vec<String> {
        let timeout = self.config.timeout_secs as f64;
        let slots: Vec<(String, SharedSlot)> = self
            .sessions
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let mut expired = Vec::new();
        for (user_id, slot) in slots {
            let mut guard = self.lock(&slot).await;
            let idle = guard.record.idle_secs(self.clock.now());
            if idle > timeout {
                warn!(user_id = %user_id, idle_secs = idle, "session timeout");
                self.rollover_locked(&mut guard, EndReason::Timeout).await;
                expired.push(user_id);
            }
        }
        expired
    }

    /// The last `count` turns of the live conversation as `User:` /
    /// `Assistant:` lines; `max_context_messages` when `count` is `None`.
    pub async fn current_context(&self, user_id: &str, count: Option<usize>) -> String {
        let slot = match self.sessions.get(user_id) {
            Some(s) => s.clone(),
            None => return String::new(),
        };
        let guard = self.lock(&slot).await;
        guard
            .record
            .recent_context(count.unwrap_or(self.config.max_context_messages))
    }

    /// A copy of `user_id`'s record, if the user has a session.
    pub async fn snapshot(&self, user_id: &str) -> Option<SessionRecord> {
        let slot = self.sessions.get(user_id).map(|s| s.clone())?;
        let guard = self.lock(&slot).await;
        Some(guard.record.clone())
    }

    /// Load every persisted record so that idle detection also covers users
    /// whose conversation was interrupted by a restart. Users already live in
    /// this process are left untouched. Returns the number restored.
    pub async fn restore_all(&self) -> Result<usize> {
        let records = self.store.load_all().await?;
        let mut restored = 0;
        for record in records {
            let user_id = record.user_id.clone();
            let slot = Arc::new(Mutex::new(SessionSlot {
                record,
                loaded: true,
                dirty: false,
            }));
            if let dashmap::mapref::entry::Entry::Vacant(v) = self.sessions.entry(user_id) {
                v.insert(slot);
                restored += 1;
            }
        }
        info!(restored, "restored persisted sessions");
        Ok(restored)
    }

    /// Retry every write that previously failed or was deferred.
    pub async fn flush(&self) {
        let slots: Vec<SharedSlot> = self.sessions.iter().map(|e| e.value().clone()).collect();
        for slot in slots {
            let mut guard = self.lock(&slot).await;
            if guard.dirty {
                self.persist(&mut guard).await;
            }
        }
    }
}
