//! In-process key-value service for tests (feature: test-util).
//!
//! Speaks the same contract as the remote store and counts the calls it
//! receives, so tests can assert that a code path did or did not reach it.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc, RwLock,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Map, Value};
use tokio::{net::TcpListener, task::JoinHandle};

#[derive(Default)]
struct Inner {
    records: RwLock<HashMap<String, Value>>,
    raw_replies: RwLock<HashMap<String, String>>,
    read_delay_ms: AtomicU64,
    writes: AtomicUsize,
    reads: AtomicUsize,
    deletes: AtomicUsize,
}

/// Running fake store. The server task stops when the handle is dropped.
pub struct KvServer {
    addr: SocketAddr,
    inner: Arc<Inner>,
    task: JoinHandle<()>,
}

impl KvServer {
    /// Bind on an ephemeral localhost port and start serving.
    ///
    /// # Errors
    /// Returns error if the listener cannot be bound.
    pub async fn spawn() -> std::io::Result<Self> {
        let inner = Arc::new(Inner::default());

        let app = Router::new()
            .route("/", post(write_handler))
            .route("/{key}", get(read_handler).delete(delete_handler))
            .with_state(Arc::clone(&inner));

        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("fake kv store stopped: {e}");
            }
        });

        Ok(Self { addr, inner, task })
    }

    /// Base URL of this server, with a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// A localhost URL nothing listens on.
    ///
    /// # Panics
    /// Panics if no ephemeral port can be reserved.
    #[must_use]
    pub fn unreachable_url() -> String {
        let listener =
            std::net::TcpListener::bind(("127.0.0.1", 0)).expect("reserve an ephemeral port");
        let addr = listener.local_addr().expect("listener has an address");
        drop(listener);
        format!("http://{addr}/")
    }

    /// Seed a record directly.
    pub fn insert(&self, key: &str, value: Value) {
        if let Ok(mut records) = self.inner.records.write() {
            records.insert(key.to_string(), value);
        }
    }

    /// Current record for `key`.
    #[must_use]
    pub fn record(&self, key: &str) -> Option<Value> {
        self.inner
            .records
            .read()
            .ok()
            .and_then(|records| records.get(key).cloned())
    }

    /// Answer reads of `key` with `body` verbatim.
    pub fn set_raw_reply(&self, key: &str, body: &str) {
        if let Ok(mut replies) = self.inner.raw_replies.write() {
            replies.insert(key.to_string(), body.to_string());
        }
    }

    /// Hold every read for `delay` before answering.
    pub fn set_read_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.inner.read_delay_ms.store(millis, Ordering::SeqCst);
    }

    #[must_use]
    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn reads(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn deletes(&self) -> usize {
        self.inner.deletes.load(Ordering::SeqCst)
    }
}

impl Drop for KvServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn write_handler(
    State(inner): State<Arc<Inner>>,
    Json(body): Json<Map<String, Value>>,
) -> Response {
    inner.writes.fetch_add(1, Ordering::SeqCst);
    let Ok(mut records) = inner.records.write() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    records.extend(body);
    (StatusCode::OK, "OK").into_response()
}

async fn read_handler(State(inner): State<Arc<Inner>>, Path(key): Path<String>) -> Response {
    inner.reads.fetch_add(1, Ordering::SeqCst);

    let delay = inner.read_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if let Some(raw) = inner
        .raw_replies
        .read()
        .ok()
        .and_then(|replies| replies.get(&key).cloned())
    {
        return (StatusCode::OK, raw).into_response();
    }

    let Ok(records) = inner.records.read() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    match records.get(&key) {
        Some(value) => {
            let mut body = Map::new();
            body.insert(key, value.clone());
            Json(body).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(Map::new())).into_response(),
    }
}

async fn delete_handler(State(inner): State<Arc<Inner>>, Path(key): Path<String>) -> Response {
    inner.deletes.fetch_add(1, Ordering::SeqCst);
    let Ok(mut records) = inner.records.write() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    if records.remove(&key).is_some() {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::NOT_FOUND, "Not Found").into_response()
    }
}
