//! Security event log
//!
//! Append-only, bounded in-memory event buffer with a smaller durable
//! mirror. Recording never fails: a mirror write error is traced and
//! dropped, because losing an audit line must never break the operation
//! that produced it.

use crate::clock::Clock;
use crate::store::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Closed set of security event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    LoginAttempt,
    LoginSuccess,
    LoginFailure,
    AccountLocked,
    PasswordChange,
    PermissionDenied,
    SuspiciousActivity,
    FileUpload,
    DataAccess,
    Logout,
}

/// Event severity, ordered low to critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One recorded security event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub severity: Severity,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// Event fields supplied by the caller; id and timestamp are stamped on
/// record.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub kind: EventKind,
    pub severity: Severity,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: String,
}

impl EventDraft {
    pub fn new(kind: EventKind, severity: Severity, details: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            user_id: None,
            email: None,
            ip_address: None,
            user_agent: None,
            details: details.into(),
        }
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Exact-match conjunction filter over event fields
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub kind: Option<EventKind>,
    pub severity: Option<Severity>,
    pub user_id: Option<String>,
    pub email: Option<String>,
}

impl EventFilter {
    fn matches(&self, event: &SecurityEvent) -> bool {
        self.kind.map_or(true, |k| event.kind == k)
            && self.severity.map_or(true, |s| event.severity == s)
            && self
                .user_id
                .as_ref()
                .map_or(true, |u| event.user_id.as_ref() == Some(u))
            && self
                .email
                .as_ref()
                .map_or(true, |e| event.email.as_ref() == Some(e))
    }
}

/// Bounded audit log with an optional durable mirror
pub struct AuditLog {
    events: Mutex<VecDeque<SecurityEvent>>,
    capacity: usize,
    mirror_capacity: usize,
    mirror_key: String,
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("capacity", &self.capacity)
            .field("mirror_capacity", &self.mirror_capacity)
            .field("mirror_key", &self.mirror_key)
            .finish_non_exhaustive()
    }
}

impl AuditLog {
    pub fn new(config: &crate::config::AuditConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: config.capacity,
            mirror_capacity: config.mirror_capacity,
            mirror_key: config.mirror_key.clone(),
            store: None,
            clock,
        }
    }

    /// Attach a durable mirror. The newest `mirror_capacity` events are
    /// kept under `mirror_key` as a JSON array.
    pub fn with_mirror(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Record an event. Never fails; mirror write errors are traced only.
    pub fn record(&self, draft: EventDraft) -> SecurityEvent {
        let event = SecurityEvent {
            id: Uuid::new_v4(),
            kind: draft.kind,
            severity: draft.severity,
            user_id: draft.user_id,
            email: draft.email,
            ip_address: draft.ip_address,
            user_agent: draft.user_agent,
            details: draft.details,
            timestamp: self.clock.now(),
        };

        {
            let mut events = self
                .events
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            events.push_back(event.clone());
            while events.len() > self.capacity {
                events.pop_front();
            }
        }

        self.mirror(&event);
        event
    }

    fn mirror(&self, event: &SecurityEvent) {
        let Some(store) = &self.store else {
            return;
        };

        let mut mirrored: Vec<SecurityEvent> = match store.get(&self.mirror_key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "audit mirror unreadable, rewriting");
                Vec::new()
            }
        };

        mirrored.push(event.clone());
        if mirrored.len() > self.mirror_capacity {
            let excess = mirrored.len() - self.mirror_capacity;
            mirrored.drain(..excess);
        }

        match serde_json::to_string(&mirrored) {
            Ok(json) => {
                if let Err(e) = store.set(&self.mirror_key, &json) {
                    tracing::warn!(error = %e, "audit mirror write failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "audit mirror serialization failed"),
        }
    }

    /// Snapshot of events matching the filter, oldest first.
    pub fn events(&self, filter: &EventFilter) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// Events with `start <= timestamp <= end`, oldest first.
    pub fn events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use crate::config::AuditConfig;
    use crate::store::{FailingStore, MemoryStore};
    use chrono::Duration;

    fn small_log(capacity: usize, mirror_capacity: usize) -> (AuditLog, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = AuditConfig {
            capacity,
            mirror_capacity,
            mirror_key: "test.audit".to_string(),
        };
        let log = AuditLog::new(&config, Arc::new(SystemClock)).with_mirror(store.clone());
        (log, store)
    }

    #[test]
    fn buffer_stays_at_capacity_and_drops_oldest() {
        let (log, _store) = small_log(3, 10);
        for i in 0..4 {
            log.record(EventDraft::new(
                EventKind::DataAccess,
                Severity::Low,
                format!("event {}", i),
            ));
        }
        let events = log.events(&EventFilter::default());
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].details, "event 1");
        assert_eq!(events[2].details, "event 3");
    }

    #[test]
    fn mirror_is_truncated_to_its_own_capacity() {
        let (log, store) = small_log(100, 2);
        for i in 0..5 {
            log.record(EventDraft::new(
                EventKind::DataAccess,
                Severity::Low,
                format!("event {}", i),
            ));
        }
        let raw = store.get("test.audit").unwrap().unwrap();
        let mirrored: Vec<SecurityEvent> = serde_json::from_str(&raw).unwrap();
        assert_eq!(mirrored.len(), 2);
        assert_eq!(mirrored[0].details, "event 3");
        assert_eq!(mirrored[1].details, "event 4");
    }

    #[test]
    fn mirror_failure_never_propagates() {
        let config = AuditConfig::default();
        let log =
            AuditLog::new(&config, Arc::new(SystemClock)).with_mirror(Arc::new(FailingStore));
        log.record(EventDraft::new(
            EventKind::LoginFailure,
            Severity::Medium,
            "still recorded in memory",
        ));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn filter_is_a_conjunction_of_exact_matches() {
        let (log, _store) = small_log(100, 100);
        log.record(
            EventDraft::new(EventKind::LoginFailure, Severity::Medium, "bad password")
                .email("a@example.com"),
        );
        log.record(
            EventDraft::new(EventKind::LoginFailure, Severity::Medium, "bad password")
                .email("b@example.com"),
        );
        log.record(
            EventDraft::new(EventKind::LoginSuccess, Severity::Low, "welcome")
                .email("a@example.com"),
        );

        let filter = EventFilter {
            kind: Some(EventKind::LoginFailure),
            email: Some("a@example.com".to_string()),
            ..EventFilter::default()
        };
        let matched = log.events(&filter);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn time_range_is_inclusive() {
        let clock = Arc::new(ManualClock::starting_now());
        let config = AuditConfig::default();
        let log = AuditLog::new(&config, clock.clone());

        let first = log
            .record(EventDraft::new(EventKind::DataAccess, Severity::Low, "a"))
            .timestamp;
        clock.advance(Duration::seconds(10));
        let second = log
            .record(EventDraft::new(EventKind::DataAccess, Severity::Low, "b"))
            .timestamp;
        clock.advance(Duration::seconds(10));
        log.record(EventDraft::new(EventKind::DataAccess, Severity::Low, "c"));

        let ranged = log.events_in_range(first, second);
        assert_eq!(ranged.len(), 2);
        assert_eq!(ranged[0].details, "a");
        assert_eq!(ranged[1].details, "b");
    }

    #[test]
    fn severity_ordering_is_low_to_critical() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }
}
