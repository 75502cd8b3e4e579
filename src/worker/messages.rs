//! Messages exchanged between the supervisor and its workers.
//!
//! Both directions serialize to the same JSON shape a process-based
//! deployment would put on the wire, tagged by `cmd`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::security::BanSnapshot;

static WORKER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a worker. Later workers have larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Generate a new unique worker ID.
    pub fn next() -> Self {
        Self(WORKER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Worker → supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum WorkerMessage {
    /// A request from `source_address` passed the admission gate.
    Request {
        #[serde(rename = "sourceAddress")]
        source_address: String,
    },
}

/// Supervisor → worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum SupervisorMessage {
    /// Replace the worker's ban snapshot wholesale.
    UpdateBans { bans: BanSnapshot },
    /// Stop accepting, drain, and exit.
    Shutdown,
}

/// Why a worker task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Returned normally after a shutdown request.
    Stopped,
    /// Returned an error.
    Failed(String),
    /// Panicked or was aborted.
    Crashed,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Stopped => "stopped",
            ExitReason::Failed(_) => "failed",
            ExitReason::Crashed => "crashed",
        }
    }
}

/// Exit notice delivered to the supervisor when a worker task ends.
#[derive(Debug, Clone)]
pub struct WorkerExit {
    pub id: WorkerId,
    pub reason: ExitReason,
}
