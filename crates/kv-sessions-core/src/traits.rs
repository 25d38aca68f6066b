//! Core traits and types for session storage.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Session payload: an ordered mapping of string keys to JSON values.
pub type SessionData = Map<String, Value>;

/// Opaque session identifier carried in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a new random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an identifier recovered from a client.
    ///
    /// Returns `None` for blank input and for the path dot segments `.` and
    /// `..`, so callers fall back to [`Self::generate`].
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if matches!(trimmed, "" | "." | "..") {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Storage error.
///
/// Every variant is recoverable: the lifecycle degrades to an empty session
/// instead of failing the request.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable at {url}: {exception}")]
    Unavailable { url: String, exception: String },
    #[error("Malformed record for session {0}: {1}")]
    Malformed(SessionId, String),
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Trait for session storage backends.
///
/// Each call is an independent round trip. Writes replace the whole record,
/// so the last writer for a given id wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store the full session mapping under `id`.
    async fn set(&self, id: &SessionId, data: &SessionData) -> Result<(), StoreError>;

    /// Fetch the session mapping for `id`, or `None` if the record is absent.
    async fn get(&self, id: &SessionId) -> Result<Option<SessionData>, StoreError>;

    /// Remove the record for `id`. Removing a missing record is not an error.
    async fn delete(&self, id: &SessionId) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> SessionStore for std::sync::Arc<S>
where
    S: SessionStore + ?Sized,
{
    async fn set(&self, id: &SessionId, data: &SessionData) -> Result<(), StoreError> {
        (**self).set(id, data).await
    }

    async fn get(&self, id: &SessionId) -> Result<Option<SessionData>, StoreError> {
        (**self).get(id).await
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }
}
