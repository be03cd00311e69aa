//! In-memory credential store for testing and bootstrap.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{CredentialSource, SourceError};

/// In-memory credential store.
///
/// Uses a BTreeMap for deterministic iteration order. Counts fetches so
/// tests can observe resolver caching.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credentials: RwLock<BTreeMap<String, Value>>,
    fetches: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryCredentialStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `credential` under `said`.
    pub fn insert(&self, said: impl Into<String>, credential: Value) {
        self.credentials.write().insert(said.into(), credential);
    }

    /// Store `credential` under its own `d` field. Returns the SAID used.
    pub fn insert_credential(&self, credential: Value) -> Option<String> {
        let said = credential.get("d")?.as_str()?.to_string();
        self.insert(said.clone(), credential);
        Some(said)
    }

    /// Remove a credential.
    pub fn remove(&self, said: &str) -> Option<Value> {
        self.credentials.write().remove(said)
    }

    /// Simulate an unreachable backend.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `fetch` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Stored SAIDs in sorted order.
    pub fn saids(&self) -> Vec<String> {
        self.credentials.read().keys().cloned().collect()
    }

    /// Number of stored credentials.
    pub fn len(&self) -> usize {
        self.credentials.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.credentials.read().is_empty()
    }
}

impl CredentialSource for InMemoryCredentialStore {
    fn fetch(&self, said: &str) -> Result<Option<Value>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("store marked unavailable".to_string()));
        }
        Ok(self.credentials.read().get(said).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fetch_counts_calls() {
        let store = InMemoryCredentialStore::new();
        store.insert("Ea", json!({"d": "Ea"}));
        assert_eq!(store.fetch("Ea").unwrap(), Some(json!({"d": "Ea"})));
        assert_eq!(store.fetch("Eb").unwrap(), None);
        assert_eq!(store.fetch_count(), 2);
    }

    #[test]
    fn test_insert_credential_uses_said() {
        let store = InMemoryCredentialStore::new();
        assert_eq!(store.insert_credential(json!({"d": "Ex"})), Some("Ex".to_string()));
        assert_eq!(store.insert_credential(json!({"a": {}})), None);
        assert_eq!(store.saids(), vec!["Ex".to_string()]);
    }

    #[test]
    fn test_unavailable() {
        let store = InMemoryCredentialStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.fetch("Ea"), Err(SourceError::Unavailable(_))));
    }

    #[test]
    fn test_closure_source() {
        let source = |said: &str| (said == "Ea").then(|| json!({"d": "Ea"}));
        assert!(source.fetch("Ea").unwrap().is_some());
        assert!(source.fetch("Eb").unwrap().is_none());
    }
}
