//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: purges expired keys at a configured interval (opt-in)

mod sweeper;

pub use sweeper::spawn_sweeper_task;
