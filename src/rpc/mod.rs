//! Call handling subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request (query string, or body for POST/PUT/PATCH)
//!     → params.rs (flat urlencoded mapping, strict)
//!     → session.rs (state machine, deadline)
//!     → operations.rs (fixed method table)
//!     → outcome.rs (200 / 202 / 501, or empty 500)
//! ```
//!
//! # Design Decisions
//! - One session per request, no shared mutable state between sessions
//! - Protocol errors carry stable numeric codes
//! - Operation failures are not protocol errors: they answer 202 with a payload

pub mod operations;
pub mod outcome;
pub mod params;
pub mod session;

pub use operations::Operation;
pub use outcome::{ErrorObject, Outcome, SessionFault};
pub use params::{Call, DecodeError, Params};
pub use session::{RequestSession, SessionContext, SessionState};
