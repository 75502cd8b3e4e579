//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (accepted and admitted by a worker)
//!     → hyper HTTP/1.1 connection
//!     → server.rs (Axum router, request ID, trace layer)
//!     → rpc session
//!     → Outcome rendered as the response
//! ```

pub mod server;

pub use server::{build_router, AppState};
