//! Shutdown signalling between the process and the tick loop.

use tokio::sync::watch;

/// Sender side, held by whoever decides to stop the server.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

/// Receiver side, handed to the tick loop.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

/// Create a shutdown channel pair.
#[must_use]
pub fn shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), ShutdownRx(rx))
}

impl ShutdownTx {
    /// Signal all receivers to shut down.
    pub fn trigger(&self) {
        let _ = self.0.send(true);
    }
}

impl ShutdownRx {
    /// Wait until shutdown is signalled or the sender is dropped.
    pub async fn wait(&mut self) {
        while !*self.0.borrow() {
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }

    /// Non-blocking check.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }
}

/// Wait for Ctrl+C. Returns immediately if the handler cannot be installed.
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C"),
        Err(e) => tracing::error!("Failed to listen for Ctrl+C: {e}"),
    }
}
