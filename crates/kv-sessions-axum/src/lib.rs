//! Server-side session lifecycle for axum.
//!
//! Provides:
//! - `ServerSideSessionInterface` - open/save a session around each request
//! - `session_middleware` + `SessionHandle` - request extension for handlers
//! - `StoreFailure` - 503 response for direct store calls

pub mod error;
pub mod interface;
pub mod middleware;

pub use error::StoreFailure;
pub use interface::ServerSideSessionInterface;
pub use middleware::{SessionHandle, session_middleware};
