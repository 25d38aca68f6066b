//! Session store backed by the remote key-value service.

use async_trait::async_trait;
use bytes::Bytes;
use kv_sessions_core::{SessionData, SessionId, SessionStore, StoreError};
use serde_json::Value;
use tracing::{Instrument, Span};

use crate::client::{ClientConfig, KeyValueClient, KvError, RawResponse};

/// Session store speaking to a remote key-value endpoint.
///
/// Stores each session mapping under its id. There is no local cache: every
/// call is a fresh round trip.
#[derive(Debug, Clone)]
pub struct KeyValueSessionStore {
    client: KeyValueClient,
    span: Span,
}

/// Ensure the base URL ends with a path separator.
fn normalize_base_url(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

impl KeyValueSessionStore {
    /// Create a store for `url` with default timeouts and logging span.
    ///
    /// # Errors
    /// Returns error if `url` is not a valid http(s) URL.
    pub fn new(url: &str) -> Result<Self, KvError> {
        Self::with_options(url, ClientConfig::default(), None)
    }

    /// Create a store that logs under `span`.
    ///
    /// # Errors
    /// Returns error if `url` is not a valid http(s) URL.
    pub fn with_span(url: &str, span: Span) -> Result<Self, KvError> {
        Self::with_options(url, ClientConfig::default(), Some(span))
    }

    /// Create a store with explicit timeouts and an optional logging span.
    ///
    /// Without a span, calls are recorded under a `kv_session_store` span
    /// carrying the base URL.
    ///
    /// # Errors
    /// Returns error if `url` is invalid or the HTTP client cannot be built.
    pub fn with_options(
        url: &str,
        config: ClientConfig,
        span: Option<Span>,
    ) -> Result<Self, KvError> {
        let client = KeyValueClient::with_config(&normalize_base_url(url), config)?;
        let span = span.unwrap_or_else(
            || tracing::debug_span!("kv_session_store", base_url = %client.base_url()),
        );
        Ok(Self { client, span })
    }

    /// Underlying key-value client.
    #[must_use]
    pub const fn client(&self) -> &KeyValueClient {
        &self.client
    }

    /// Write `data` under `id`, returning the store's raw reply.
    ///
    /// # Errors
    /// Returns the structured 503 error if the store cannot be reached.
    pub async fn set_key(&self, id: &SessionId, data: &SessionData) -> Result<Bytes, KvError> {
        async {
            tracing::debug!(sid = %id, keys = data.len(), "set_key");
            self.client.write(id.as_str(), data).await
        }
        .instrument(self.span.clone())
        .await
    }

    /// Read the mapping stored under `id`.
    ///
    /// # Errors
    /// Returns the structured 503 error if the store cannot be reached or the
    /// record is not a JSON object.
    pub async fn get_key(&self, id: &SessionId) -> Result<Option<SessionData>, KvError> {
        async {
            tracing::debug!(sid = %id, "get_key");
            match self.client.read(id.as_str()).await? {
                None => Ok(None),
                Some(Value::Object(map)) => Ok(Some(map)),
                Some(_) => Err(KvError::Malformed {
                    url: format!("{}{}", self.client.base_url(), id),
                    reason: "session record is not a JSON object".to_string(),
                }),
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// Remove the record for `id`.
    ///
    /// # Errors
    /// Returns the structured 503 error if the store cannot be reached.
    pub async fn delete_key(&self, id: &SessionId) -> Result<RawResponse, KvError> {
        async {
            tracing::debug!(sid = %id, "delete_key");
            self.client.delete(id.as_str()).await
        }
        .instrument(self.span.clone())
        .await
    }
}

fn into_store_error(err: KvError, id: &SessionId) -> StoreError {
    match err {
        KvError::Malformed { reason, .. } => StoreError::Malformed(id.clone(), reason),
        KvError::Encode(e) => StoreError::Internal(e.to_string()),
        other => StoreError::Unavailable {
            url: other.url().unwrap_or_default().to_string(),
            exception: other.exception(),
        },
    }
}

#[async_trait]
impl SessionStore for KeyValueSessionStore {
    async fn set(&self, id: &SessionId, data: &SessionData) -> Result<(), StoreError> {
        self.set_key(id, data)
            .await
            .map(|_| ())
            .map_err(|e| into_store_error(e, id))
    }

    async fn get(&self, id: &SessionId) -> Result<Option<SessionData>, StoreError> {
        self.get_key(id).await.map_err(|e| into_store_error(e, id))
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        self.delete_key(id)
            .await
            .map(|_| ())
            .map_err(|e| into_store_error(e, id))
    }
}
