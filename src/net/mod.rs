//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor binds once
//!     → listener.rs (SharedListener, one ListenerHandle per worker)
//!     → worker accept loop (global connection limit)
//!     → connection.rs (per-worker tracking for drain)
//!     → Hand off to the admission gate and HTTP layer
//! ```
//!
//! # Design Decisions
//! - One socket, many acceptors: the kernel spreads connections over workers
//! - Bounded in-flight connections prevent resource exhaustion
//! - Each connection tracked for graceful worker stop

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError, ListenerHandle, SharedListener};
