//! Per-request session middleware.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use kv_sessions_core::{ServerSideSession, SessionStore};
use tokio::sync::{Mutex, MutexGuard};

use crate::interface::ServerSideSessionInterface;

/// Shared handle to the current request's session.
///
/// Inserted into request extensions by [`session_middleware`]; handlers take
/// it as an extractor and mutate the session through [`SessionHandle::lock`].
#[derive(Debug, Clone)]
pub struct SessionHandle(Arc<Mutex<ServerSideSession>>);

impl SessionHandle {
    #[must_use]
    pub fn new(session: ServerSideSession) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    /// Lock the session for reading or writing.
    pub async fn lock(&self) -> MutexGuard<'_, ServerSideSession> {
        self.0.lock().await
    }

    /// Copy of the session as it stands now.
    pub async fn snapshot(&self) -> ServerSideSession {
        self.0.lock().await.clone()
    }
}

impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "session middleware is not installed",
        ))
    }
}

/// Open the session before the handler runs and save it afterwards.
///
/// Install with `axum::middleware::from_fn_with_state(interface, session_middleware)`.
pub async fn session_middleware<S>(
    State(interface): State<Arc<ServerSideSessionInterface<S>>>,
    mut request: Request,
    next: Next,
) -> Response
where
    S: SessionStore + 'static,
{
    let jar = CookieJar::from_headers(request.headers());
    let handle = SessionHandle::new(interface.open(&jar).await);
    request.extensions_mut().insert(handle.clone());

    let response = next.run(request).await;

    let session = handle.snapshot().await;
    let jar = interface.save(&session, CookieJar::new()).await;
    (jar, response).into_response()
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, header},
        routing::{get, post},
    };
    use kv_sessions_core::SessionConfig;
    use kv_sessions_store::{KeyValueSessionStore, testing::KvServer};
    use serde_json::json;
    use tower::ServiceExt as _;

    use super::*;

    async fn count_handler(session: SessionHandle) -> String {
        let mut session = session.lock().await;
        let count = session.get_as::<u64>("count").unwrap_or(0) + 1;
        session.insert("count", json!(count));
        count.to_string()
    }

    async fn reset_handler(session: SessionHandle) -> StatusCode {
        session.lock().await.clear();
        StatusCode::NO_CONTENT
    }

    async fn noop_handler() -> &'static str {
        "ok"
    }

    fn app(base_url: &str) -> Router {
        let store = KeyValueSessionStore::new(base_url).unwrap();
        let interface = Arc::new(ServerSideSessionInterface::new(
            store,
            SessionConfig::default(),
        ));
        Router::new()
            .route("/count", get(count_handler))
            .route("/reset", post(reset_handler))
            .route("/noop", get(noop_handler))
            .layer(axum::middleware::from_fn_with_state(
                interface,
                session_middleware::<KeyValueSessionStore>,
            ))
    }

    fn set_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn cookie_pair(set_cookie: &str) -> String {
        set_cookie.split(';').next().unwrap_or_default().to_string()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_untouched_session_sets_no_cookie() {
        let server = KvServer::spawn().await.unwrap();
        let response = app(&server.base_url())
            .oneshot(Request::get("/noop").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie(&response).is_none());
        assert_eq!(server.writes(), 0);
        assert_eq!(server.reads(), 0);
    }

    #[tokio::test]
    async fn test_session_survives_across_requests() {
        let server = KvServer::spawn().await.unwrap();
        let app = app(&server.base_url());

        let first = app
            .clone()
            .oneshot(Request::get("/count").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = cookie_pair(&set_cookie(&first).unwrap());
        assert!(cookie.starts_with("session="));
        assert_eq!(body_text(first).await, "1");

        let second = app
            .clone()
            .oneshot(
                Request::get("/count")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(cookie_pair(&set_cookie(&second).unwrap()), cookie);
        assert_eq!(body_text(second).await, "2");
        assert_eq!(server.writes(), 2);
    }

    #[tokio::test]
    async fn test_reset_deletes_record_and_clears_cookie() {
        let server = KvServer::spawn().await.unwrap();
        server.insert("known", json!({"count": 5}));

        let response = app(&server.base_url())
            .oneshot(
                Request::post("/reset")
                    .header(header::COOKIE, "session=known")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let cleared = set_cookie(&response).unwrap();
        assert!(cleared.starts_with("session=;"));
        assert!(cleared.contains("Max-Age=0"));
        assert_eq!(server.record("known"), None);
        assert_eq!(server.deletes(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_store_does_not_fail_request() {
        let response = app(&KvServer::unreachable_url())
            .oneshot(
                Request::get("/count")
                    .header(header::COOKIE, "session=stale")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(cookie_pair(&set_cookie(&response).unwrap()), "session=stale");
        assert_eq!(body_text(response).await, "1");
    }

    #[tokio::test]
    async fn test_handle_without_middleware_is_rejected() {
        let app = Router::new().route("/count", get(count_handler));
        let response = app
            .oneshot(Request::get("/count").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
