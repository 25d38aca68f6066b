//! In-memory session storage.

use std::{collections::HashMap, sync::RwLock};

use async_trait::async_trait;
use kv_sessions_core::{SessionData, SessionId, SessionStore, StoreError};

/// In-memory storage implementation.
///
/// Useful for development and single-process deployments.
/// Data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionId, SessionData>>,
}

impl MemoryStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn set(&self, id: &SessionId, data: &SessionData) -> Result<(), StoreError> {
        self.sessions
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .insert(id.clone(), data.clone());
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> Result<Option<SessionData>, StoreError> {
        Ok(self
            .sessions
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .get(id)
            .cloned())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        self.sessions
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio_test::{assert_ok, block_on};

    use super::*;

    #[test]
    fn test_round_trip_and_delete() {
        let store = MemoryStore::new();
        let id = SessionId::generate();
        let mut data = SessionData::new();
        data.insert("cart".into(), json!([1, 2, 3]));

        assert_ok!(block_on(store.set(&id, &data)));
        assert_eq!(block_on(store.get(&id)).unwrap(), Some(data));
        assert_eq!(store.len(), 1);

        assert_ok!(block_on(store.delete(&id)));
        assert_ok!(block_on(store.delete(&id)));
        assert_eq!(block_on(store.get(&id)).unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_replaces_whole_record() {
        let store = MemoryStore::new();
        let id = SessionId::generate();

        let mut first = SessionData::new();
        first.insert("a".into(), json!(1));
        first.insert("b".into(), json!(2));
        block_on(store.set(&id, &first)).unwrap();

        let mut second = SessionData::new();
        second.insert("a".into(), json!(3));
        block_on(store.set(&id, &second)).unwrap();

        assert_eq!(block_on(store.get(&id)).unwrap(), Some(second));
    }
}
