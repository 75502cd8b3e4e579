//! Worker subsystem.
//!
//! # Data Flow
//! ```text
//! Shared socket (one ListenerHandle per worker)
//!     → accept (global connection limit)
//!     → admission.rs (banned source? drop, no response)
//!     → hyper HTTP/1.1 connection, one RequestSession per request
//!     → WorkerMessage::Request up to the supervisor
//!
//! Supervisor commands (messages.rs):
//!     UpdateBans → replace snapshot
//!     Shutdown   → stop accepting, drain, exit
//! ```
//!
//! # Design Decisions
//! - Each worker is its own task: a panic ends that worker only and the
//!   supervisor sees it through the join handle
//! - Each connection is its own task inside the worker
//! - Sessions share nothing beyond the read-only SessionContext

pub mod admission;
pub mod messages;

pub use admission::{AdmissionGate, Rejected};
pub use messages::{ExitReason, SupervisorMessage, WorkerExit, WorkerId, WorkerMessage};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tower::ServiceExt;
use tracing::Instrument;

use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, ListenerError, ListenerHandle};
use crate::observability::metrics;
use crate::security::unix_now;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("listener failed: {0}")]
    Listener(#[from] ListenerError),
}

/// One member of the pool.
pub struct Worker {
    id: WorkerId,
    listener: ListenerHandle,
    router: Router,
    gate: Arc<AdmissionGate>,
    commands: mpsc::UnboundedReceiver<SupervisorMessage>,
    drain_timeout: Duration,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        listener: ListenerHandle,
        router: Router,
        gate: Arc<AdmissionGate>,
        commands: mpsc::UnboundedReceiver<SupervisorMessage>,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            id,
            listener,
            router,
            gate,
            commands,
            drain_timeout,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Serve until the supervisor says stop (or goes away), then drain.
    pub async fn run(self) -> Result<(), WorkerError> {
        let Worker {
            id,
            listener,
            router,
            gate,
            mut commands,
            drain_timeout,
        } = self;

        let listener = listener.into_listener()?;
        let connections = ConnectionTracker::new();
        let (drain_tx, drain_rx) = watch::channel(false);

        tracing::debug!(worker_id = %id, "Worker accepting");

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(SupervisorMessage::UpdateBans { bans }) => gate.replace_snapshot(bans),
                    Some(SupervisorMessage::Shutdown) | None => break,
                },

                accepted = listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) if e.is_transient() => {
                            tracing::debug!(worker_id = %id, error = %e, "Transient accept error");
                            continue;
                        }
                        Err(e) => return Err(e.into()),
                    };

                    let source = peer.ip().to_string();
                    if gate.is_banned(&source, unix_now()) {
                        tracing::debug!(worker_id = %id, source = %source, "Dropping banned source");
                        metrics::record_connection_dropped();
                        continue;
                    }

                    let guard = connections.track();
                    let span = tracing::debug_span!("connection", connection_id = %guard.id(), peer = %peer);
                    tokio::spawn(
                        serve_connection(
                            stream,
                            peer,
                            router.clone(),
                            Arc::clone(&gate),
                            drain_rx.clone(),
                            guard,
                            permit,
                        )
                        .instrument(span),
                    );
                }
            }
        }

        drop(listener);
        let _ = drain_tx.send(true);

        let open = connections.active_count();
        if open > 0 {
            tracing::debug!(worker_id = %id, open_connections = open, "Draining");
        }
        if tokio::time::timeout(drain_timeout, connections.wait_for_drain())
            .await
            .is_err()
        {
            tracing::warn!(
                worker_id = %id,
                open_connections = connections.active_count(),
                "Drain timed out"
            );
        }

        tracing::debug!(worker_id = %id, "Worker stopped");
        Ok(())
    }
}

/// Serve HTTP/1.1 on one admitted connection.
///
/// Every request is re-checked against the gate: a source banned while the
/// connection was open is cut off without a response.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    gate: Arc<AdmissionGate>,
    mut drain: watch::Receiver<bool>,
    _guard: ConnectionGuard,
    _permit: ConnectionPermit,
) {
    let source = peer.ip().to_string();
    let service = service_fn(move |mut request: Request<Incoming>| {
        let router = router.clone();
        let gate = Arc::clone(&gate);
        let source = source.clone();
        async move {
            if let Err(rejected) = gate.admit(&source) {
                tracing::debug!(source = %source, "Banned mid-connection, closing");
                return Err(rejected);
            }
            request.extensions_mut().insert(ConnectInfo(peer));
            match router.oneshot(request).await {
                Ok(response) => Ok(response),
                Err(never) => match never {},
            }
        }
    });

    let connection = http1::Builder::new()
        .timer(TokioTimer::new())
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = drain.changed() => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Connection ended with error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetchConfig, ListenerConfig};
    use crate::fetch::Fetcher;
    use crate::http::build_router;
    use crate::net::SharedListener;
    use crate::rpc::SessionContext;
    use crate::security::BanSnapshot;
    use std::collections::HashMap;

    struct Harness {
        addr: SocketAddr,
        commands: mpsc::UnboundedSender<SupervisorMessage>,
        events: mpsc::UnboundedReceiver<WorkerMessage>,
        task: tokio::task::JoinHandle<Result<(), WorkerError>>,
    }

    fn start() -> Harness {
        let shared = SharedListener::bind(&ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            max_connections: 16,
        })
        .unwrap();
        let addr = shared.local_addr().unwrap();

        let session = SessionContext {
            fetcher: Fetcher::new(&FetchConfig::default()).unwrap(),
            deadline: Duration::from_secs(5),
            max_request_body_bytes: 1024,
        };
        let (events_tx, events) = mpsc::unbounded_channel();
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let worker = Worker::new(
            WorkerId::next(),
            shared.handle().unwrap(),
            build_router(Arc::new(session)),
            Arc::new(AdmissionGate::new(60, events_tx)),
            commands_rx,
            Duration::from_secs(1),
        );

        Harness {
            addr,
            commands,
            events,
            task: tokio::spawn(worker.run()),
        }
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .no_proxy()
            .pool_max_idle_per_host(0)
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn serves_and_reports_requests() {
        let mut harness = start();

        let response = client()
            .get(format!("http://{}/?method=unknownOp", harness.addr))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 501);

        assert_eq!(
            harness.events.recv().await.unwrap(),
            WorkerMessage::Request {
                source_address: "127.0.0.1".into()
            }
        );

        harness.commands.send(SupervisorMessage::Shutdown).unwrap();
        harness.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn banned_source_gets_no_response() {
        let mut harness = start();

        let bans = HashMap::from([("127.0.0.1".to_string(), unix_now())]);
        harness
            .commands
            .send(SupervisorMessage::UpdateBans {
                bans: BanSnapshot::from(bans),
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = client()
            .get(format!("http://{}/?method=unknownOp", harness.addr))
            .send()
            .await;
        assert!(result.is_err());
        assert!(harness.events.try_recv().is_err());

        drop(harness.commands);
        harness.task.await.unwrap().unwrap();
    }
}
