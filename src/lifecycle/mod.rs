//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Supervisor stops autoscaling → every worker stops accepting
//!     → workers drain their connections → supervisor returns
//! ```
//!
//! # Design Decisions
//! - One latched signal; the supervisor owns the ordering of the stop
//! - Draining is bounded by the pool's drain timeout

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::wait_for_signal;
