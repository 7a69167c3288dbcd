//! Session lifecycle with sliding expiration
//!
//! Each live session has exactly one pending expiry timer. Refreshing a
//! session aborts the old timer before scheduling the next one, and every
//! entry carries a generation counter so a timer that already fired for a
//! superseded generation can never destroy a just-refreshed session.

use crate::traits::AuthSession;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;
use warden_security::Clock;

struct Entry {
    session: AuthSession,
    created_at: chrono::DateTime<chrono::Utc>,
    generation: u64,
    timer: Option<AbortHandle>,
}

type EntryMap = Arc<Mutex<HashMap<String, Entry>>>;

/// In-process session registry with per-session expiry timers
pub struct SessionManager {
    entries: EntryMap,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("timeout", &self.timeout)
            .field("active", &self.active_count())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager whose sessions idle out after `timeout_seconds`
    pub fn new(timeout_seconds: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            timeout: Duration::from_secs(timeout_seconds),
            clock,
        }
    }

    /// Insert or overwrite a session and start its expiry timer
    pub fn create_session(&self, mut session: AuthSession) {
        session.last_activity = self.clock.now();
        let id = session.session_id.clone();

        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let generation = entries
            .get(&id)
            .map(|e| e.generation + 1)
            .unwrap_or(0);
        if let Some(old) = entries.remove(&id) {
            if let Some(timer) = old.timer {
                timer.abort();
            }
        }

        let timer = Self::schedule_expiry(&self.entries, id.clone(), generation, self.timeout);
        entries.insert(
            id,
            Entry {
                session,
                created_at: self.clock.now(),
                generation,
                timer: Some(timer),
            },
        );
    }

    /// Look up a session; a hit refreshes last_activity and the timer
    pub fn get_session(&self, id: &str) -> Option<AuthSession> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let timeout = self.timeout;
        let now = self.clock.now();

        let entry = entries.get_mut(id)?;
        entry.session.last_activity = now;
        Self::refresh_timer(&self.entries, entry, id, timeout);
        Some(entry.session.clone())
    }

    /// Apply a mutation to a session if present; refreshes the timer.
    /// Returns false (and does nothing) for unknown IDs.
    pub fn update_session(&self, id: &str, mutate: impl FnOnce(&mut AuthSession)) -> bool {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let timeout = self.timeout;
        let now = self.clock.now();

        let Some(entry) = entries.get_mut(id) else {
            return false;
        };
        mutate(&mut entry.session);
        entry.session.last_activity = now;
        Self::refresh_timer(&self.entries, entry, id, timeout);
        true
    }

    /// Remove a session and cancel its timer. Idempotent.
    pub fn destroy_session(&self, id: &str) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.remove(id) {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }
    }

    /// Presence check only; expiry is enforced by the timers
    pub fn is_session_valid(&self, id: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Creation time of a session, if present
    pub fn created_at(&self, id: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|e| e.created_at)
    }

    pub fn active_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn refresh_timer(entries: &EntryMap, entry: &mut Entry, id: &str, timeout: Duration) {
        entry.generation += 1;
        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }
        entry.timer = Some(Self::schedule_expiry(
            entries,
            id.to_string(),
            entry.generation,
            timeout,
        ));
    }

    fn schedule_expiry(
        entries: &EntryMap,
        id: String,
        generation: u64,
        timeout: Duration,
    ) -> AbortHandle {
        let entries = Arc::clone(entries);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let mut map = entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            // Only the timer belonging to the current generation may evict;
            // anything else raced with a refresh and is stale.
            let current = map.get(&id).map(|e| e.generation);
            if current == Some(generation) {
                map.remove(&id);
                tracing::debug!(session_id = %id, "session idled out");
            }
        })
        .abort_handle()
    }
}
