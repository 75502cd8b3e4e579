//! Per-source request accounting and the ban table.
//!
//! # Responsibilities
//! - Count requests per source inside a fixed one-second window
//! - Ban a source the first time it exceeds the per-window threshold
//! - Sweep expired bans in stamp order
//! - Produce immutable snapshots for workers
//!
//! # Design Decisions
//! - Owned by the supervisor task alone; no interior locking
//! - Time is passed in as epoch seconds so behavior is deterministic under test
//! - First offense wins: an active ban is never re-stamped

use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Current wall-clock time in whole epoch seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Authoritative rate counters and ban table.
#[derive(Debug)]
pub struct BanTracker {
    /// Requests allowed per source per window.
    threshold: u32,
    /// Ban length in seconds.
    ban_duration: u64,
    /// Request counts for the current window.
    counters: HashMap<String, u32>,
    /// source -> ban start (epoch seconds).
    bans: HashMap<String, u64>,
    /// Bans sorted by stamp, for cheap eviction. The clock is not trusted to
    /// be monotonic, so a late-arriving earlier stamp is placed by value.
    order: VecDeque<(String, u64)>,
}

impl BanTracker {
    pub fn new(threshold: u32, ban_duration: u64) -> Self {
        Self {
            threshold,
            ban_duration,
            counters: HashMap::new(),
            bans: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Count one request from `source`.
    ///
    /// Returns `true` if this request caused a new ban to be issued.
    pub fn record_request(&mut self, source: &str, now: u64) -> bool {
        let count = self.counters.entry(source.to_string()).or_insert(0);
        *count = count.saturating_add(1);

        if *count <= self.threshold {
            return false;
        }

        match self.bans.get(source) {
            Some(&start) if !self.has_expired(start, now) => false,
            _ => {
                self.bans.insert(source.to_string(), now);
                let at = self.order.partition_point(|(_, start)| *start <= now);
                self.order.insert(at, (source.to_string(), now));
                true
            }
        }
    }

    /// Clear every counter. Bans are untouched.
    pub fn reset_window(&mut self) {
        self.counters = HashMap::new();
    }

    /// Remove every ban whose duration has fully elapsed at `now`.
    ///
    /// Returns the number of bans removed.
    pub fn expire_bans(&mut self, now: u64) -> usize {
        let mut removed = 0;
        while let Some((source, start)) = self.order.front() {
            if !self.has_expired(*start, now) {
                break;
            }
            // A re-stamped source leaves a stale queue entry behind; only the
            // entry matching the live stamp may remove the ban.
            if self.bans.get(source) == Some(start) {
                self.bans.remove(source);
                removed += 1;
            }
            self.order.pop_front();
        }
        removed
    }

    /// Immutable copy of the current ban table.
    pub fn snapshot(&self) -> BanSnapshot {
        BanSnapshot {
            bans: self.bans.clone(),
        }
    }

    /// Number of sources currently in the ban table (expired or not).
    pub fn banned_count(&self) -> usize {
        self.bans.len()
    }

    /// Requests counted for `source` in the current window.
    pub fn request_count(&self, source: &str) -> u32 {
        self.counters.get(source).copied().unwrap_or(0)
    }

    /// Ban start for `source`, if one is recorded.
    pub fn ban_start(&self, source: &str) -> Option<u64> {
        self.bans.get(source).copied()
    }

    fn has_expired(&self, start: u64, now: u64) -> bool {
        start.saturating_add(self.ban_duration) <= now
    }
}

/// Point-in-time copy of the ban table held by workers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BanSnapshot {
    bans: HashMap<String, u64>,
}

impl BanSnapshot {
    /// Whether `source` is still serving a ban at `now`.
    pub fn is_banned(&self, source: &str, now: u64, ban_duration: u64) -> bool {
        match self.bans.get(source) {
            Some(&start) => now < start.saturating_add(ban_duration),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.bans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bans.is_empty()
    }
}

impl From<HashMap<String, u64>> for BanSnapshot {
    fn from(bans: HashMap<String, u64>) -> Self {
        Self { bans }
    }
}
