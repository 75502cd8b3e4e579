//! The supervisor's record of its workers.

use std::collections::BTreeMap;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::worker::{SupervisorMessage, WorkerId};

/// One worker as the supervisor sees it.
#[derive(Debug)]
pub struct WorkerRecord {
    pub commands: mpsc::UnboundedSender<SupervisorMessage>,
    pub started_at: Instant,
    /// False once the supervisor has asked the worker to stop.
    pub alive: bool,
}

impl WorkerRecord {
    pub fn new(commands: mpsc::UnboundedSender<SupervisorMessage>) -> Self {
        Self {
            commands,
            started_at: Instant::now(),
            alive: true,
        }
    }
}

/// Workers keyed by id. Ids grow with spawn order, so the last live entry
/// is the most recently started worker.
#[derive(Debug, Default)]
pub struct Roster {
    workers: BTreeMap<WorkerId, WorkerRecord>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: WorkerId, record: WorkerRecord) {
        self.workers.insert(id, record);
    }

    /// Workers not yet asked to stop.
    pub fn live_count(&self) -> usize {
        self.workers.values().filter(|record| record.alive).count()
    }

    pub fn newest_live(&self) -> Option<WorkerId> {
        self.workers
            .iter()
            .rev()
            .find(|(_, record)| record.alive)
            .map(|(id, _)| *id)
    }

    /// Ask a worker to stop. It stays on the roster until its exit arrives.
    pub fn stop(&mut self, id: WorkerId) -> bool {
        match self.workers.get_mut(&id) {
            Some(record) if record.alive => {
                record.alive = false;
                let _ = record.commands.send(SupervisorMessage::Shutdown);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, id: WorkerId) -> Option<WorkerRecord> {
        self.workers.remove(&id)
    }

    /// Send `message` to every live worker. Returns how many accepted it.
    pub fn broadcast(&self, message: &SupervisorMessage) -> usize {
        self.workers
            .values()
            .filter(|record| record.alive)
            .filter(|record| record.commands.send(message.clone()).is_ok())
            .count()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn ids(&self) -> Vec<WorkerId> {
        self.workers.keys().copied().collect()
    }
}
