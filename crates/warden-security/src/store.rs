//! Durable key-value storage seam
//!
//! Models the browser's local storage contract: synchronous string get/set/
//! remove with best-effort durability. Callers tolerate and log failures;
//! a broken store must never take the application down.

use crate::{SecurityError, SecurityResult};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Synchronous string key-value store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> SecurityResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> SecurityResult<()>;
    fn remove(&self, key: &str) -> SecurityResult<()>;
}

/// In-memory store, the default backend and the test double
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> SecurityResult<Option<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> SecurityResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> SecurityResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Store that fails every operation. Used in tests to verify that storage
/// loss is tolerated and surfaced as a tamper/diagnostic signal only.
#[derive(Debug, Default)]
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> SecurityResult<Option<String>> {
        Err(SecurityError::storage(format!("read of '{}' failed", key)))
    }

    fn set(&self, key: &str, _value: &str) -> SecurityResult<()> {
        Err(SecurityError::storage(format!("write of '{}' failed", key)))
    }

    fn remove(&self, key: &str) -> SecurityResult<()> {
        Err(SecurityError::storage(format!("remove of '{}' failed", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v2".to_string()));
    }

    #[test]
    fn remove_is_idempotent() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn failing_store_fails_everything() {
        let store = FailingStore;
        assert!(store.get("k").is_err());
        assert!(store.set("k", "v").is_err());
        assert!(store.remove("k").is_err());
    }
}
