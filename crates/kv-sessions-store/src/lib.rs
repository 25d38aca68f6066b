//! Key-value client and session store backends.
//!
//! Provides:
//! - `KeyValueClient` - HTTP client for the remote key-value service
//! - `KeyValueSessionStore` - `SessionStore` backed by that service
//! - `MemoryStore` - in-process backend (feature: memory)

pub mod client;
pub mod storage;

#[cfg(feature = "test-util")]
pub mod testing;

pub use client::{ClientConfig, KeyValueClient, KvError, RawResponse};
pub use storage::KeyValueSessionStore;

#[cfg(feature = "memory")]
pub use storage::MemoryStore;
