//! Command parsing
//!
//! Turns one protocol line into a typed command.

use crate::error::{CacheError, Result};

/// A parsed client command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { key: String, value: String },
    Get { key: String },
    Del { key: String },
    Exists { key: String },
    Expire { key: String, seconds: i64 },
    Ttl { key: String },
    Keys,
}

impl Command {
    /// Parses a single line.
    ///
    /// The line is split on at most the first two whitespace runs, so the
    /// third token keeps any whitespace inside it (`SET k a b` stores `a b`).
    /// Command names are case-insensitive.
    pub fn parse(line: &str) -> Result<Self> {
        let tokens = split_tokens(line);

        let Some(name) = tokens.first() else {
            return Err(CacheError::UnknownCommand);
        };

        match (name.to_ascii_uppercase().as_str(), &tokens[1..]) {
            ("SET", [key, value]) => Ok(Command::Set {
                key: key.to_string(),
                value: value.to_string(),
            }),
            ("GET", [key]) => Ok(Command::Get { key: key.to_string() }),
            ("DEL", [key]) => Ok(Command::Del { key: key.to_string() }),
            ("EXISTS", [key]) => Ok(Command::Exists { key: key.to_string() }),
            ("EXPIRE", [key, seconds]) => Ok(Command::Expire {
                key: key.to_string(),
                seconds: parse_integer(seconds)?,
            }),
            ("TTL", [key]) => Ok(Command::Ttl { key: key.to_string() }),
            ("KEYS", []) => Ok(Command::Keys),
            _ => Err(CacheError::UnknownCommand),
        }
    }

    /// Whether the command changes state and must be persisted.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::Set { .. } | Command::Del { .. } | Command::Expire { .. }
        )
    }
}

/// Splits into at most three tokens: two whitespace-delimited words and
/// the untouched remainder.
fn split_tokens(line: &str) -> Vec<&str> {
    let mut tokens = Vec::with_capacity(3);
    let mut rest = line.trim();

    while !rest.is_empty() {
        if tokens.len() == 2 {
            tokens.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                tokens.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                tokens.push(rest);
                break;
            }
        }
    }

    tokens
}

fn parse_integer(token: &str) -> Result<i64> {
    token.parse().map_err(|_| {
        CacheError::InvalidArgument(format!("value is not an integer or out of range: '{}'", token))
    })
}
