//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Worker admits a request
//!     → WorkerMessage::Request flows to the supervisor
//!     → bans.rs BanTracker counts it, bans on threshold breach
//!     → BanSnapshot pushed back down to every worker
//!     → next connection from a banned source is dropped silently
//! ```
//!
//! # Design Decisions
//! - Single writer: only the supervisor mutates the tracker
//! - Workers read snapshots, never the tracker
//! - Banned sources get no response at all

pub mod bans;

pub use bans::{unix_now, BanSnapshot, BanTracker};
