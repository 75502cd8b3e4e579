//! Pool sizing control loop.
//!
//! # Algorithm
//! Demand is counted per epoch second and sampled every tick:
//! - more requests this second than workers → grow by one
//! - otherwise, if demand plus a random slack still falls short of the
//!   pool, the tick counts toward an over-allocation streak
//! - a full streak shrinks the pool by one and starts over
//!
//! Growth is greedy but never more than one worker per tick. Shrinking is
//! slow on purpose: any tick with enough demand, or a new second, resets
//! the streak.

use rand::Rng;

use crate::config::PoolConfig;

/// What the supervisor should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    Grow,
    Shrink,
    Hold,
}

#[derive(Debug)]
pub struct Autoscaler {
    min_workers: usize,
    max_workers: usize,
    extra_allocation_percent: u32,
    streak_threshold: u32,
    current_second: Option<u64>,
    request_count: u64,
    over_allocation_streak: u32,
}

impl Autoscaler {
    pub fn new(
        min_workers: usize,
        max_workers: usize,
        extra_allocation_percent: u32,
        streak_threshold: u32,
    ) -> Self {
        Self {
            min_workers,
            max_workers,
            extra_allocation_percent,
            streak_threshold,
            current_second: None,
            request_count: 0,
            over_allocation_streak: 0,
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(
            config.resolved_min_workers(),
            config.max_workers,
            config.extra_allocation_percent,
            config.over_allocation_streak_threshold,
        )
    }

    /// Count one admitted request toward the current second.
    pub fn record_request(&mut self) {
        self.request_count += 1;
    }

    /// Evaluate one tick at `now_secs` with `worker_count` live workers.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        now_secs: u64,
        worker_count: usize,
        rng: &mut R,
    ) -> ScaleDecision {
        if self.current_second != Some(now_secs) {
            self.current_second = Some(now_secs);
            self.request_count = 0;
            self.over_allocation_streak = 0;
        }

        let workers = worker_count as u64;
        if self.request_count > workers && worker_count < self.max_workers {
            self.over_allocation_streak = 0;
            return ScaleDecision::Grow;
        }

        if self.demand_estimate(rng) < workers as f64 {
            self.over_allocation_streak += 1;
            if self.over_allocation_streak >= self.streak_threshold
                && worker_count > self.min_workers
            {
                self.over_allocation_streak = 0;
                return ScaleDecision::Shrink;
            }
        } else {
            self.over_allocation_streak = 0;
        }

        ScaleDecision::Hold
    }

    fn demand_estimate<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let requests = self.request_count as f64;
        let slack = requests * f64::from(self.extra_allocation_percent) / 100.0;
        if slack > 0.0 {
            requests + rng.gen_range(0.0..slack)
        } else {
            requests
        }
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn over_allocation_streak(&self) -> u32 {
        self.over_allocation_streak
    }

    pub fn min_workers(&self) -> usize {
        self.min_workers
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }
}
