//! Visit counter backed by server-side sessions.
//!
//! Run with: cargo run -p counter-demo -- --store-url http://localhost:8080
//!
//! Then open http://localhost:3000 in your browser.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use clap::Parser;
use kv_sessions_axum::{ServerSideSessionInterface, SessionHandle, StoreFailure, session_middleware};
use kv_sessions_core::{SessionConfig, SessionId};
use kv_sessions_store::{ClientConfig, KeyValueSessionStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Interface = ServerSideSessionInterface<KeyValueSessionStore>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the key-value store
    #[arg(long, env = "KV_STORE_URL", default_value = "http://127.0.0.1:8080")]
    store_url: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Name of the session cookie
    #[arg(long, env = "SESSION_COOKIE_NAME", default_value = "session")]
    cookie_name: String,

    /// Domain attribute of the session cookie
    #[arg(long, env = "SESSION_COOKIE_DOMAIN")]
    cookie_domain: Option<String>,

    /// Only send the session cookie over HTTPS
    #[arg(long, env = "SESSION_COOKIE_SECURE")]
    cookie_secure: bool,

    /// Timeout for one store request, in milliseconds
    #[arg(long, env = "KV_STORE_TIMEOUT_MS", default_value_t = 5000)]
    store_timeout_ms: u64,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        let config = SessionConfig::default()
            .with_cookie_name(self.cookie_name.clone())
            .with_secure(self.cookie_secure);
        match &self.cookie_domain {
            Some(domain) => config.with_cookie_domain(domain.clone()),
            None => config,
        }
    }

    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: std::time::Duration::from_millis(self.store_timeout_ms),
            ..ClientConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let span = tracing::info_span!("sessions", store = %cli.store_url);
    let store = KeyValueSessionStore::with_options(&cli.store_url, cli.client_config(), Some(span))?;
    let interface: Arc<Interface> = Arc::new(ServerSideSessionInterface::new(
        store,
        cli.session_config(),
    ));

    let app = router(interface);

    let addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    tracing::info!("Server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(interface: Arc<Interface>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/reset", post(reset_handler))
        .route("/store/{sid}", get(raw_record_handler))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&interface),
            session_middleware::<KeyValueSessionStore>,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(interface)
}

#[derive(Debug, Deserialize)]
struct IndexQuery {
    #[serde(default)]
    remember: bool,
}

async fn index_handler(session: SessionHandle, Query(query): Query<IndexQuery>) -> Html<String> {
    let mut session = session.lock().await;
    let count = session.get_as::<u64>("count").unwrap_or(0) + 1;
    session.insert("count", serde_json::json!(count));
    if query.remember {
        session.set_permanent(true);
    }

    let permanent = if session.is_permanent() { "yes" } else { "no" };
    Html(format!(
        "<!DOCTYPE html>\n<html><body>\
         <h1>Visits: {count}</h1>\
         <p>Session: <code>{sid}</code> (remembered: {permanent})</p>\
         <p><a href=\"/?remember=true\">Remember me</a></p>\
         <form method=\"post\" action=\"/reset\"><button>Reset</button></form>\
         </body></html>",
        sid = session.id(),
    ))
}

async fn reset_handler(session: SessionHandle) -> impl IntoResponse {
    session.lock().await.clear();
    (StatusCode::SEE_OTHER, [("location", "/")])
}

/// Read a record through the store directly. Store failures surface as the
/// 503 JSON document rather than an empty session.
async fn raw_record_handler(
    State(interface): State<Arc<Interface>>,
    Path(sid): Path<String>,
) -> Result<impl IntoResponse, StoreFailure> {
    let Some(sid) = SessionId::parse(&sid) else {
        return Ok((StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": "empty id"}))));
    };

    match interface.store().get_key(&sid).await? {
        Some(data) => Ok((StatusCode::OK, Json(serde_json::Value::Object(data)))),
        None => Ok((StatusCode::NOT_FOUND, Json(serde_json::json!({})))),
    }
}
