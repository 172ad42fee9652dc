//! Error types for the cache server
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache server.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Empty line, unrecognised command name or wrong argument count
    #[error("unknown command")]
    UnknownCommand,

    /// A token could not be interpreted (e.g. a non-integer expiry)
    #[error("{0}")]
    InvalidArgument(String),

    /// Filesystem failure while reading or writing persistence files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot file could not be encoded or decoded
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// An append-log line could not be replayed
    #[error("append log line {line}: {reason}")]
    Replay { line: usize, reason: String },

    /// Invalid startup configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl CacheError {
    // == Wire Rendering ==
    /// Renders the error as a protocol reply line (without the newline).
    pub fn reply_text(&self) -> String {
        format!("ERR {}", self)
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache server.
pub type Result<T> = std::result::Result<T, CacheError>;
