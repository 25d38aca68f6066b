//! Response mapping for direct store calls.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use kv_sessions_store::KvError;

/// A key-value store failure returned from a handler.
///
/// Renders as the store error's status (503 for anything that went wrong on
/// the wire) with a `{"url": .., "exception": ..}` body.
#[derive(Debug)]
pub struct StoreFailure(pub KvError);

impl From<KvError> for StoreFailure {
    fn from(err: KvError) -> Self {
        Self(err)
    }
}

impl IntoResponse for StoreFailure {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, "key-value store call failed");
        (self.0.status_code(), Json(self.0.payload())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use super::*;

    #[tokio::test]
    async fn test_transport_failure_renders_503_json() {
        let failure = StoreFailure::from(KvError::Transport {
            url: "http://kv.internal/abc".to_string(),
            exception: "Timeout".to_string(),
        });
        let response = failure.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            json!({"url": "http://kv.internal/abc", "exception": "Timeout"})
        );
    }
}
