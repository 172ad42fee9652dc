//! Sterling Cache - an in-memory key-value cache server
//!
//! String values, per-key lazy expiry, insertion-order eviction under a key
//! bound, and snapshot or append-log durability, served over a
//! newline-delimited text protocol.

pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod persistence;
pub mod protocol;
pub mod server;
pub mod tasks;

pub use config::Config;
pub use dispatcher::Dispatcher;
pub use error::{CacheError, Result};
pub use tasks::spawn_sweeper_task;
