//! Core abstractions for server-side session management.
//!
//! This crate provides the fundamental building blocks:
//! - `ServerSideSession` - Change-tracking session mapping
//! - `SessionId` / `SessionData` - Identifier and payload types
//! - `SessionConfig` - Cookie and lifetime settings
//! - `SessionStore` trait for storage backends

pub mod config;
pub mod session;
pub mod traits;

pub use config::SessionConfig;
pub use session::ServerSideSession;
pub use traits::{SessionData, SessionId, SessionStore, StoreError};
