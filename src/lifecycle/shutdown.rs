//! Stop latch for the gateway.
//!
//! Once triggered the latch stays set, so a supervisor that starts waiting
//! after the signal arrived still stops. Dropping every [`Shutdown`] handle
//! also counts as a stop: nothing could trigger it any more.

use std::sync::Arc;

use tokio::sync::watch;

/// Handle that stops the supervisor and, through it, every worker.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal for one supervisor run loop.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Set the latch. Repeated calls are no-ops.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Waiting side of [`Shutdown`], polled by the supervisor's select loop.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once the gateway has been told to stop.
    ///
    /// Cancel-safe: the latch is re-read on every call.
    pub async fn recv(&mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}
