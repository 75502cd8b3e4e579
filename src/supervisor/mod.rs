//! Supervisor subsystem.
//!
//! # Data Flow
//! ```text
//! Workers ──WorkerMessage::Request──▶ Supervisor ──▶ autoscaler.rs (demand)
//!                                          │      └─▶ BanTracker (rates, bans)
//!                                          │
//!         ◀──SupervisorMessage::UpdateBans─┤  every propagation tick
//!         ◀──SupervisorMessage::Shutdown───┘  scale down / shutdown
//!
//! Worker task ends ──WorkerExit──▶ roster.rs (remove, respawn below floor)
//! ```
//!
//! # Design Decisions
//! - The roster, autoscaler and ban table live in the supervisor task only;
//!   workers see bans through snapshots
//! - One select loop drives every timer, so no state is shared across tasks
//! - A new worker gets the current snapshot before it accepts anything

pub mod autoscaler;
pub mod roster;

pub use autoscaler::{Autoscaler, ScaleDecision};
pub use roster::{Roster, WorkerRecord};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::Instrument;

use crate::config::{validate_config, ConfigError, GatewayConfig};
use crate::fetch::{AllowAll, DenyPrivateNetworks, FetchError, Fetcher, TargetPolicy};
use crate::http::build_router;
use crate::lifecycle::ShutdownSignal;
use crate::net::{ListenerError, SharedListener};
use crate::observability::metrics;
use crate::rpc::SessionContext;
use crate::security::{unix_now, BanTracker};
use crate::worker::{
    AdmissionGate, ExitReason, SupervisorMessage, Worker, WorkerError, WorkerExit, WorkerId,
    WorkerMessage,
};

/// Errors that stop the gateway from starting.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("fetch client: {0}")]
    Fetch(#[from] FetchError),

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Snapshot of the pool, published after every roster change and tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatus {
    pub live_workers: usize,
    pub banned_sources: usize,
}

pub struct Supervisor {
    config: GatewayConfig,
    listener: SharedListener,
    router: Router,
    roster: Roster,
    autoscaler: Autoscaler,
    tracker: BanTracker,
    events_tx: mpsc::UnboundedSender<WorkerMessage>,
    events_rx: mpsc::UnboundedReceiver<WorkerMessage>,
    exits_tx: mpsc::UnboundedSender<WorkerExit>,
    exits_rx: mpsc::UnboundedReceiver<WorkerExit>,
    status_tx: watch::Sender<PoolStatus>,
}

impl Supervisor {
    /// Validate `config`, bind the listener and build the shared router.
    ///
    /// No worker runs until [`Supervisor::run`].
    pub fn bind(config: GatewayConfig) -> Result<Self, GatewayError> {
        let policy: Arc<dyn TargetPolicy> = if config.fetch.block_private_networks {
            Arc::new(DenyPrivateNetworks)
        } else {
            Arc::new(AllowAll)
        };
        Self::bind_with_policy(config, policy)
    }

    pub fn bind_with_policy(
        config: GatewayConfig,
        policy: Arc<dyn TargetPolicy>,
    ) -> Result<Self, GatewayError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let listener = SharedListener::bind(&config.listener)?;
        let fetcher = Fetcher::with_policy(&config.fetch, policy)?;
        let router = build_router(Arc::new(SessionContext::new(&config, fetcher)));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (exits_tx, exits_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(PoolStatus::default());

        Ok(Self {
            autoscaler: Autoscaler::from_config(&config.pool),
            tracker: BanTracker::new(
                config.bans.requests_per_source_per_second,
                config.bans.ban_duration_secs,
            ),
            config,
            listener,
            router,
            roster: Roster::new(),
            events_tx,
            events_rx,
            exits_tx,
            exits_rx,
            status_tx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Watch the pool size and ban count.
    pub fn status(&self) -> watch::Receiver<PoolStatus> {
        self.status_tx.subscribe()
    }

    /// Run the pool until `shutdown` fires, then stop and drain every worker.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> Result<(), GatewayError> {
        for _ in 0..self.autoscaler.min_workers() {
            self.spawn_worker()?;
        }
        self.publish_status();

        let address = self.listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(
            address = %address,
            min_workers = self.autoscaler.min_workers(),
            max_workers = self.autoscaler.max_workers(),
            "Gateway running"
        );

        let mut autoscale = interval(Duration::from_millis(self.config.pool.autoscale_interval_ms));
        let mut window = interval(Duration::from_secs(1));
        let mut propagate = interval(Duration::from_millis(self.config.bans.propagation_interval_ms));
        let mut expiry = interval(Duration::from_secs(self.config.bans.expiry_interval_secs));
        for timer in [&mut autoscale, &mut window, &mut propagate, &mut expiry] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,

                Some(event) = self.events_rx.recv() => self.handle_event(event),

                Some(exit) = self.exits_rx.recv() => self.handle_exit(exit),

                _ = autoscale.tick() => self.autoscale(),

                _ = window.tick() => self.tracker.reset_window(),

                _ = propagate.tick() => self.propagate(),

                _ = expiry.tick() => {
                    let expired = self.tracker.expire_bans(unix_now());
                    if expired > 0 {
                        tracing::info!(expired, remaining = self.tracker.banned_count(), "Bans expired");
                        self.publish_status();
                    }
                }
            }
        }

        tracing::info!("Shutting down worker pool");
        self.stop_all().await;
        tracing::info!("Shutdown complete");
        Ok(())
    }

    fn handle_event(&mut self, event: WorkerMessage) {
        match event {
            WorkerMessage::Request { source_address } => {
                self.autoscaler.record_request();
                if self.tracker.record_request(&source_address, unix_now()) {
                    tracing::warn!(
                        source = %source_address,
                        limit = self.config.bans.requests_per_source_per_second,
                        ban_duration_secs = self.config.bans.ban_duration_secs,
                        "Source banned"
                    );
                    metrics::record_ban_issued();
                }
            }
        }
    }

    fn handle_exit(&mut self, exit: WorkerExit) {
        metrics::record_worker_exit(exit.reason.as_str());

        match self.roster.remove(exit.id) {
            Some(record) if record.alive => {
                tracing::warn!(
                    worker_id = %exit.id,
                    reason = ?exit.reason,
                    uptime_secs = record.started_at.elapsed().as_secs(),
                    "Worker exited unexpectedly"
                );
                if self.roster.live_count() < self.autoscaler.min_workers() {
                    self.try_spawn("replace exited worker");
                }
            }
            Some(_) => tracing::debug!(worker_id = %exit.id, "Worker exited"),
            None => {}
        }

        self.publish_status();
    }

    fn autoscale(&mut self) {
        let live = self.roster.live_count();
        let decision = self
            .autoscaler
            .tick(unix_now(), live, &mut rand::thread_rng());

        match decision {
            ScaleDecision::Grow => self.try_spawn("scale up"),
            ScaleDecision::Shrink => {
                if let Some(id) = self.roster.newest_live() {
                    self.roster.stop(id);
                    tracing::info!(worker_id = %id, workers = live - 1, "Scaled down");
                }
            }
            ScaleDecision::Hold => {
                if live < self.autoscaler.min_workers() {
                    self.try_spawn("restore minimum");
                }
            }
        }

        self.publish_status();
    }

    fn propagate(&mut self) {
        let update = SupervisorMessage::UpdateBans {
            bans: self.tracker.snapshot(),
        };
        let delivered = self.roster.broadcast(&update);
        tracing::trace!(workers = delivered, banned = self.tracker.banned_count(), "Bans propagated");
    }

    fn try_spawn(&mut self, cause: &'static str) {
        if let Err(e) = self.spawn_worker() {
            tracing::error!(cause, error = %e, "Failed to spawn worker");
        }
    }

    fn spawn_worker(&mut self) -> Result<WorkerId, GatewayError> {
        let id = WorkerId::next();
        let handle = self.listener.handle()?;
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let _ = commands_tx.send(SupervisorMessage::UpdateBans {
            bans: self.tracker.snapshot(),
        });

        let worker = Worker::new(
            id,
            handle,
            self.router.clone(),
            Arc::new(AdmissionGate::new(
                self.config.bans.ban_duration_secs,
                self.events_tx.clone(),
            )),
            commands_rx,
            Duration::from_secs(self.config.pool.drain_timeout_secs),
        );

        let span = tracing::info_span!("worker", worker_id = %id);
        supervise(id, worker.run().instrument(span), self.exits_tx.clone());

        self.roster.insert(id, WorkerRecord::new(commands_tx));
        tracing::info!(worker_id = %id, workers = self.roster.live_count(), "Worker started");
        Ok(id)
    }

    async fn stop_all(&mut self) {
        for id in self.roster.ids() {
            self.roster.stop(id);
        }

        let roster = &mut self.roster;
        let exits = &mut self.exits_rx;
        let wait = async move {
            while !roster.is_empty() {
                match exits.recv().await {
                    Some(exit) => {
                        metrics::record_worker_exit(exit.reason.as_str());
                        roster.remove(exit.id);
                    }
                    None => break,
                }
            }
        };

        let limit = Duration::from_secs(self.config.pool.drain_timeout_secs + 1);
        if tokio::time::timeout(limit, wait).await.is_err() {
            tracing::warn!(remaining = self.roster.len(), "Workers still draining at shutdown");
        }
        self.publish_status();
    }

    fn publish_status(&self) {
        let status = PoolStatus {
            live_workers: self.roster.live_count(),
            banned_sources: self.tracker.banned_count(),
        };
        metrics::record_workers(status.live_workers);
        self.status_tx.send_replace(status);
    }
}

/// Run a worker task and report how it ended on `exits`. A panic stays
/// inside the inner task and arrives as [`ExitReason::Crashed`].
fn supervise<F>(id: WorkerId, task: F, exits: mpsc::UnboundedSender<WorkerExit>)
where
    F: Future<Output = Result<(), WorkerError>> + Send + 'static,
{
    tokio::spawn(async move {
        let reason = match tokio::spawn(task).await {
            Ok(Ok(())) => ExitReason::Stopped,
            Ok(Err(e)) => ExitReason::Failed(e.to_string()),
            Err(_) => ExitReason::Crashed,
        };
        let _ = exits.send(WorkerExit { id, reason });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config(min: usize, max: usize) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        config.pool.min_workers = Some(min);
        config.pool.max_workers = max;
        config.pool.drain_timeout_secs = 1;
        config.bans.requests_per_source_per_second = 1;
        config
    }

    #[tokio::test]
    async fn rejects_invalid_config() {
        let mut bad = config(1, 2);
        bad.pool.max_workers = 0;
        assert!(matches!(
            Supervisor::bind(bad),
            Err(GatewayError::Config(ConfigError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn unexpected_exit_is_replaced() {
        let mut supervisor = Supervisor::bind(config(1, 2)).unwrap();
        let first = supervisor.spawn_worker().unwrap();

        supervisor.handle_exit(WorkerExit {
            id: first,
            reason: ExitReason::Crashed,
        });

        assert_eq!(supervisor.roster.live_count(), 1);
        assert_ne!(supervisor.roster.newest_live(), Some(first));
        assert_eq!(supervisor.status().borrow().live_workers, 1);
    }

    #[tokio::test]
    async fn requested_exit_is_not_replaced() {
        let mut supervisor = Supervisor::bind(config(1, 2)).unwrap();
        supervisor.spawn_worker().unwrap();
        let second = supervisor.spawn_worker().unwrap();

        supervisor.roster.stop(second);
        supervisor.handle_exit(WorkerExit {
            id: second,
            reason: ExitReason::Stopped,
        });

        assert_eq!(supervisor.roster.live_count(), 1);
        assert_eq!(supervisor.roster.len(), 1);
    }

    #[tokio::test]
    async fn events_feed_bans_and_propagation() {
        let mut supervisor = Supervisor::bind(config(1, 2)).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = WorkerId::next();
        supervisor.roster.insert(id, WorkerRecord::new(tx));

        for _ in 0..2 {
            supervisor.handle_event(WorkerMessage::Request {
                source_address: "192.0.2.9".into(),
            });
        }
        assert_eq!(supervisor.tracker.banned_count(), 1);
        assert_eq!(supervisor.autoscaler.request_count(), 2);

        supervisor.propagate();
        match rx.try_recv().unwrap() {
            SupervisorMessage::UpdateBans { bans } => {
                assert!(bans.is_banned("192.0.2.9", unix_now(), 60));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[tokio::test]
    async fn runs_at_minimum_and_stops_on_shutdown() {
        let supervisor = Supervisor::bind(config(2, 4)).unwrap();
        let mut status = supervisor.status();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(supervisor.run(shutdown.subscribe()));

        tokio::time::timeout(
            Duration::from_secs(2),
            status.wait_for(|s| s.live_workers == 2),
        )
        .await
        .unwrap()
        .unwrap();

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(status.borrow().live_workers, 0);
    }

    async fn faulty_worker() -> Result<(), WorkerError> {
        panic!("worker fault")
    }

    /// Backend that answers "late" after `delay`.
    async fn slow_backend(delay: Duration) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let _ = socket.read(&mut buf).await;
                    tokio::time::sleep(delay).await;
                    let _ = socket
                        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\nConnection: close\r\n\r\nlate")
                        .await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn panicking_worker_is_replaced_while_siblings_serve() {
        let mut cfg = config(2, 4);
        cfg.bans.requests_per_source_per_second = 1_000;
        let mut supervisor = Supervisor::bind(cfg).unwrap();
        let sibling = supervisor.spawn_worker().unwrap();
        let gateway = supervisor.local_addr().unwrap();
        let backend = slow_backend(Duration::from_millis(400)).await;

        let call = tokio::spawn(async move {
            reqwest::Client::builder()
                .no_proxy()
                .build()
                .unwrap()
                .get(format!("http://{}/", gateway))
                .query(&[
                    ("method", "getURLContents".to_string()),
                    ("url", format!("http://{}/", backend)),
                ])
                .send()
                .await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let faulty = WorkerId::next();
        let (commands_tx, _commands_rx) = mpsc::unbounded_channel();
        supervisor.roster.insert(faulty, WorkerRecord::new(commands_tx));
        supervise(faulty, faulty_worker(), supervisor.exits_tx.clone());

        let exit = tokio::time::timeout(Duration::from_secs(2), supervisor.exits_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit.id, faulty);
        assert_eq!(exit.reason, ExitReason::Crashed);

        supervisor.handle_exit(exit);
        assert_eq!(supervisor.roster.live_count(), 2);
        assert!(supervisor.roster.ids().contains(&sibling));
        assert!(!supervisor.roster.ids().contains(&faulty));

        let response = call.await.unwrap().unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["contents"], "late");
    }

    #[tokio::test]
    async fn worker_error_is_reported_as_failed() {
        let (exits_tx, mut exits_rx) = mpsc::unbounded_channel();
        let id = WorkerId::next();
        supervise(id, async { Err(WorkerError::Listener(ListenerError::Closed)) }, exits_tx);

        let exit = exits_rx.recv().await.unwrap();
        assert_eq!(exit.id, id);
        assert!(matches!(exit.reason, ExitReason::Failed(ref message) if !message.is_empty()));
    }
}
