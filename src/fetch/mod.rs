//! Outbound fetch subsystem.
//!
//! # Data Flow
//! ```text
//! getURLContents(url)
//!     → policy.rs (may refuse the target)
//!     → client.rs (GET with deadline, connect timeout, body cap)
//!     → body text or FetchError
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every fetch has a deadline
//! - Bodies are buffered, so the cap bounds memory per request
//! - Remote status codes are not interpreted

pub mod client;
pub mod policy;

pub use client::{FetchError, Fetcher};
pub use policy::{AllowAll, DenyPrivateNetworks, TargetPolicy};
