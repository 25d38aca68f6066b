//! HTTP client for the remote key-value service.
//!
//! The service is a flat resource: `POST {base}` writes `{key: value}`,
//! `GET {base}{key}` returns a JSON object holding the value under `key`, and
//! `DELETE {base}{key}` removes it. No batching and no retries; each call is a
//! single round trip.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{StatusCode, Url, header};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Default total timeout for one store request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Key-value client error.
///
/// Every failure reaching the store maps to 503 so a handler can return it
/// as-is; see [`KvError::payload`].
#[derive(Debug, Error)]
pub enum KvError {
    #[error("Request to {url} failed: {exception}")]
    Transport { url: String, exception: String },
    #[error("Store at {url} answered {status}")]
    Status { url: String, status: StatusCode },
    #[error("Malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },
    #[error("Invalid store URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl KvError {
    fn transport(url: &Url, err: &reqwest::Error) -> Self {
        Self::Transport {
            url: url.to_string(),
            exception: exception_kind(err).to_string(),
        }
    }

    /// HTTP status a caller should answer with.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Transport { .. } | Self::Status { .. } | Self::Malformed { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::InvalidUrl { .. } | Self::Encode(_) | Self::Client(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// URL the failing request was addressed to, if any.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Transport { url, .. }
            | Self::Status { url, .. }
            | Self::Malformed { url, .. }
            | Self::InvalidUrl { url, .. } => Some(url),
            Self::Encode(_) | Self::Client(_) => None,
        }
    }

    /// Short name of the failure class.
    #[must_use]
    pub fn exception(&self) -> String {
        match self {
            Self::Transport { exception, .. } => exception.clone(),
            Self::Status { status, .. } => format!("HTTPError {}", status.as_u16()),
            Self::Malformed { .. } => "MalformedResponse".to_string(),
            Self::InvalidUrl { .. } => "InvalidURL".to_string(),
            Self::Encode(_) => "EncodeError".to_string(),
            Self::Client(_) => "ClientError".to_string(),
        }
    }

    /// Structured body describing the failure: `{"url": .., "exception": ..}`.
    #[must_use]
    pub fn payload(&self) -> Value {
        json!({
            "url": self.url(),
            "exception": self.exception(),
        })
    }
}

/// Classify a transport error by what went wrong on the wire.
fn exception_kind(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "Timeout"
    } else if err.is_connect() {
        "ConnectionError"
    } else if err.is_redirect() {
        "TooManyRedirects"
    } else if err.is_decode() || err.is_body() {
        "ContentDecodingError"
    } else if err.is_builder() {
        "InvalidRequest"
    } else {
        "RequestException"
    }
}

/// Timeouts applied to every store request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Raw reply to a write or delete.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Client for one key-value endpoint.
#[derive(Debug, Clone)]
pub struct KeyValueClient {
    http: reqwest::Client,
    base: Url,
}

impl KeyValueClient {
    /// Create a client with default timeouts.
    ///
    /// # Errors
    /// Returns error if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, KvError> {
        Self::with_config(base_url, ClientConfig::default())
    }

    /// Create a client with explicit timeouts.
    ///
    /// # Errors
    /// Returns error if `base_url` is invalid or the HTTP client cannot be built.
    pub fn with_config(base_url: &str, config: ClientConfig) -> Result<Self, KvError> {
        let base = Url::parse(base_url).map_err(|e| KvError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(KvError::InvalidUrl {
                url: base_url.to_string(),
                reason: "expected an http(s) base URL".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(KvError::Client)?;

        Ok(Self { http, base })
    }

    /// Base URL every key is appended to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// URL addressing `key`, with the key percent-encoded as one path segment.
    ///
    /// Empty keys and the dot segments `.`/`..` are refused: URL normalization
    /// would drop them and address the base collection instead.
    fn key_url(&self, key: &str) -> Result<Url, KvError> {
        if matches!(key, "" | "." | "..") {
            return Err(KvError::InvalidUrl {
                url: format!("{}{key}", self.base),
                reason: format!("{key:?} is not a valid key"),
            });
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| KvError::InvalidUrl {
                url: self.base.to_string(),
                reason: "base URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .push(key);
        Ok(url)
    }

    /// Store `value` under `key`.
    ///
    /// # Errors
    /// Returns error if the store is unreachable or rejects the write.
    pub async fn write<T>(&self, key: &str, value: &T) -> Result<Bytes, KvError>
    where
        T: Serialize + ?Sized,
    {
        let mut body = serde_json::Map::new();
        body.insert(key.to_string(), serde_json::to_value(value)?);

        tracing::debug!(key, url = %self.base, "kv write");

        let response = self
            .http
            .post(self.base.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/plain")
            .json(&body)
            .send()
            .await
            .map_err(|e| KvError::transport(&self.base, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KvError::Status {
                url: self.base.to_string(),
                status,
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| KvError::transport(&self.base, &e))
    }

    /// Fetch the value stored under `key`.
    ///
    /// A 404, or a JSON object without `key`, means the record is absent.
    ///
    /// # Errors
    /// Returns error if the store is unreachable, answers with another error
    /// status, or returns something other than a JSON object.
    pub async fn read(&self, key: &str) -> Result<Option<Value>, KvError> {
        let url = self.key_url(key)?;
        tracing::debug!(key, %url, "kv read");

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| KvError::transport(&url, &e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(KvError::Status {
                url: url.to_string(),
                status,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| KvError::transport(&url, &e))?;

        let body: Value = serde_json::from_slice(&bytes).map_err(|e| KvError::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        match body {
            Value::Object(mut map) => Ok(map.remove(key).filter(|v| !v.is_null())),
            other => Err(KvError::Malformed {
                url: url.to_string(),
                reason: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
        }
    }

    /// Remove the value stored under `key`.
    ///
    /// Deleting a missing key succeeds, so repeating a delete is harmless.
    ///
    /// # Errors
    /// Returns error if the store is unreachable or answers with an error status.
    pub async fn delete(&self, key: &str) -> Result<RawResponse, KvError> {
        let url = self.key_url(key)?;
        tracing::debug!(key, %url, "kv delete");

        let response = self
            .http
            .delete(url.clone())
            .send()
            .await
            .map_err(|e| KvError::transport(&url, &e))?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(KvError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| KvError::transport(&url, &e))?;

        Ok(RawResponse { status, body })
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
