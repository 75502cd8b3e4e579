//! TCP listener shared by every worker, with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address once, in the supervisor
//! - Hand each worker its own handle on the same socket
//! - Enforce max_connections across all workers via one semaphore
//! - Graceful handling of accept errors

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Failed to duplicate the socket for a worker.
    Clone(std::io::Error),
    /// Failed to accept connection.
    Accept(std::io::Error),
    /// The connection semaphore was closed.
    Closed,
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Clone(e) => write!(f, "Failed to clone listener: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
            ListenerError::Closed => write!(f, "Connection limiter closed"),
        }
    }
}

impl std::error::Error for ListenerError {}

impl ListenerError {
    /// Accept errors that concern a single peer, not the socket.
    pub fn is_transient(&self) -> bool {
        match self {
            ListenerError::Accept(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

/// The bound socket, owned by the supervisor.
///
/// Workers never see this type; they get a [`ListenerHandle`] each.
#[derive(Debug)]
pub struct SharedListener {
    inner: std::net::TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl SharedListener {
    /// Bind to the configured address with connection limits.
    pub fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let listener = std::net::TcpListener::bind(addr).map_err(ListenerError::Bind)?;
        listener.set_nonblocking(true).map_err(ListenerError::Bind)?;

        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Duplicate the socket for one worker.
    pub fn handle(&self) -> Result<ListenerHandle, ListenerError> {
        let inner = self.inner.try_clone().map_err(ListenerError::Clone)?;
        Ok(ListenerHandle {
            inner,
            connection_limit: Arc::clone(&self.connection_limit),
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// One worker's duplicate of the shared socket, not yet registered with tokio.
#[derive(Debug)]
pub struct ListenerHandle {
    inner: std::net::TcpListener,
    connection_limit: Arc<Semaphore>,
}

impl ListenerHandle {
    /// Register the socket with the current runtime.
    pub fn into_listener(self) -> Result<Listener, ListenerError> {
        let inner = TcpListener::from_std(self.inner).map_err(ListenerError::Clone)?;
        Ok(Listener {
            inner,
            connection_limit: self.connection_limit,
        })
    }
}

/// A worker's accept side.
///
/// When the global limit is reached, accepting waits until a slot frees up.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
}

impl Listener {
    /// Accept a new connection, respecting the connection limit.
    ///
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    /// Cancel safe: dropping the future before it completes releases any permit taken.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::trace!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
/// This ensures backpressure is maintained even if the connection handler panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}
