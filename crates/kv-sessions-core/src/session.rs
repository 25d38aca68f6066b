//! Change-tracking session mapping.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::traits::{SessionData, SessionId};

/// Reserved key marking a session as permanent.
pub const PERMANENT_KEY: &str = "_permanent";

/// One request's view of a session.
///
/// Owns the mapping, its identifier and a dirty flag. Every write goes through
/// a method that sets the flag, so the lifecycle can tell an untouched session
/// from one that was populated and then cleared.
#[derive(Debug, Clone)]
pub struct ServerSideSession {
    id: SessionId,
    data: SessionData,
    modified: bool,
}

impl ServerSideSession {
    /// Create an empty session for a freshly minted id.
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            data: SessionData::new(),
            modified: false,
        }
    }

    /// Create a session pre-populated with data recovered from the store.
    #[must_use]
    pub fn with_data(id: SessionId, data: SessionData) -> Self {
        Self {
            id,
            data,
            modified: false,
        }
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// Whether any write happened since construction.
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    /// Flag the session dirty after mutating a nested value in place.
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// Borrow the whole mapping.
    #[must_use]
    pub const fn data(&self) -> &SessionData {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Get a raw value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a value by key, deserialized into `T`.
    ///
    /// Returns `None` if the key is missing or holds an incompatible value.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Insert a raw value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.modified = true;
        self.data.insert(key.into(), value)
    }

    /// Serialize `value` and insert it.
    ///
    /// # Errors
    /// Returns error if `value` cannot be represented as JSON; the session is
    /// left untouched in that case.
    pub fn insert_as<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Option<Value>, serde_json::Error> {
        let value = serde_json::to_value(value)?;
        Ok(self.insert(key, value))
    }

    /// Replace the value under `key` with `f(current)`.
    pub fn update<F>(&mut self, key: impl Into<String>, f: F)
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let key = key.into();
        let next = f(self.data.get(&key));
        self.insert(key, next);
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.modified = true;
        self.data.shift_remove(key)
    }

    /// Remove every key.
    pub fn clear(&mut self) {
        self.modified = true;
        self.data.clear();
    }

    /// Whether the session outlives the browser session.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.data
            .get(PERMANENT_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Mark the session permanent (or not). Stored in the mapping so the flag
    /// survives across requests.
    pub fn set_permanent(&mut self, permanent: bool) {
        if permanent {
            self.insert(PERMANENT_KEY, Value::Bool(true));
        } else {
            self.remove(PERMANENT_KEY);
        }
    }

    /// Consume the session, yielding its mapping.
    #[must_use]
    pub fn into_data(self) -> SessionData {
        self.data
    }
}
