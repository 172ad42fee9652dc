//! Cache Module
//!
//! Provides the in-memory key-value store with lazy TTL expiration and
//! insertion-order eviction.

mod eviction;
pub mod expiry;
mod order;
mod store;


// Re-export public types
pub use eviction::EvictionPolicy;
pub use order::InsertionOrder;
pub use store::{CacheStore, TTL_MISSING, TTL_PERSISTENT};
