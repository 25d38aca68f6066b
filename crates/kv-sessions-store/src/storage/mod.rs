//! Storage implementations.

pub mod http;

#[cfg(feature = "memory")]
pub mod memory;

pub use http::KeyValueSessionStore;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;
