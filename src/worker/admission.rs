//! Worker-side admission gate.
//!
//! # Responsibilities
//! - Hold the latest ban snapshot pushed by the supervisor
//! - Refuse banned sources before any HTTP is read
//! - Report every admitted request's source upward
//!
//! # Design Decisions
//! - The snapshot is replaced wholesale; the newest one always wins
//! - Reads are lock-free so the accept loop never waits on an update

use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::security::{unix_now, BanSnapshot};
use crate::worker::messages::WorkerMessage;

/// The source is banned. The connection gets no response at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("source {0} is banned")]
pub struct Rejected(pub String);

#[derive(Debug)]
pub struct AdmissionGate {
    snapshot: ArcSwap<BanSnapshot>,
    ban_duration: u64,
    events: mpsc::UnboundedSender<WorkerMessage>,
}

impl AdmissionGate {
    pub fn new(ban_duration: u64, events: mpsc::UnboundedSender<WorkerMessage>) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(BanSnapshot::default()),
            ban_duration,
            events,
        }
    }

    /// Install a snapshot from the supervisor, discarding the previous one.
    pub fn replace_snapshot(&self, bans: BanSnapshot) {
        tracing::trace!(banned = bans.len(), "Ban snapshot replaced");
        self.snapshot.store(Arc::new(bans));
    }

    pub fn is_banned(&self, source: &str, now: u64) -> bool {
        self.snapshot.load().is_banned(source, now, self.ban_duration)
    }

    /// Admit a request from `source`, reporting it to the supervisor.
    ///
    /// Refused requests are not reported.
    pub fn admit(&self, source: &str) -> Result<(), Rejected> {
        if self.is_banned(source, unix_now()) {
            return Err(Rejected(source.to_string()));
        }

        let event = WorkerMessage::Request {
            source_address: source.to_string(),
        };
        if self.events.send(event).is_err() {
            // Supervisor gone; shutdown is already under way.
            tracing::trace!(source = %source, "Request event dropped");
        }
        Ok(())
    }
}
