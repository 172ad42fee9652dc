//! Server Module
//!
//! Network plumbing around the dispatcher: a TCP accept loop and the
//! per-connection line loop. Neither holds cache state of its own.

mod connection;
mod listener;

pub use connection::handle_connection;
pub use listener::{bind, serve};
