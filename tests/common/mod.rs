//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fetch_gateway::{GatewayConfig, PoolStatus, Shutdown, Supervisor};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Read until the end of the request head so the client sees a clean reply.
async fn read_head(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a simple mock backend that returns a fixed 200 response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend with async support.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let (status, body) = f().await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line(status),
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a backend that waits `delay` before answering.
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    start_programmable_backend(move || async move {
        tokio::time::sleep(delay).await;
        (200, "late".to_string())
    })
    .await
}

/// An address nothing listens on.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A running gateway on a loopback port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub status: watch::Receiver<PoolStatus>,
    pub task: JoinHandle<Result<(), fetch_gateway::GatewayError>>,
}

impl TestGateway {
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Wait until the pool reports `workers` live workers.
    pub async fn wait_for_workers(&mut self, workers: usize) {
        tokio::time::timeout(
            Duration::from_secs(5),
            self.status.wait_for(|s| s.live_workers == workers),
        )
        .await
        .expect("pool did not reach the expected size")
        .expect("supervisor stopped");
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("supervisor did not stop")
            .unwrap()
            .unwrap();
    }
}

/// Config for a small loopback gateway.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.pool.min_workers = Some(2);
    config.pool.max_workers = 4;
    config.pool.drain_timeout_secs = 1;
    config.bans.requests_per_source_per_second = 1_000;
    config
}

/// Bind and run a gateway, returning once its minimum pool is up.
pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let min_workers = config.pool.resolved_min_workers();
    let supervisor = Supervisor::bind(config).unwrap();
    let addr = supervisor.local_addr().unwrap();
    let status = supervisor.status();
    let shutdown = Shutdown::new();
    let task = tokio::spawn(supervisor.run(shutdown.subscribe()));

    let mut gateway = TestGateway {
        addr,
        shutdown,
        status,
        task,
    };
    gateway.wait_for_workers(min_workers).await;
    gateway
}

/// Client that never reuses connections and bypasses any system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
