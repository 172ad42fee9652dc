//! Protocol Module
//!
//! Newline-delimited UTF-8 text protocol.
//!
//! Each request line holds one command; each reply is exactly one line.
//!
//! | Command      | Reply                                  |
//! |--------------|----------------------------------------|
//! | `SET k v`    | `OK`                                   |
//! | `GET k`      | value or `(nil)`                       |
//! | `DEL k`      | `OK`                                   |
//! | `EXISTS k`   | `1` or `0`                             |
//! | `EXPIRE k s` | `OK`                                   |
//! | `TTL k`      | `-2`, `-1` or remaining seconds        |
//! | `KEYS`       | space-joined keys or `(empty)`         |
//!
//! Failures reply `ERR unknown command` or `ERR <message>`.

mod command;
mod reply;

pub use command::Command;
pub use reply::{Reply, EMPTY, NIL};
