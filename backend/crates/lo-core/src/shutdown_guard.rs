use tokio::sync::watch;

/// Per-task view of the shutdown signal.
pub struct ShutdownGuard {
    shutdown_rx: watch::Receiver<bool>,
}

impl ShutdownGuard {
    pub(crate) fn new(shutdown_rx: watch::Receiver<bool>) -> Self {
        Self { shutdown_rx }
    }

    /// Resolves once shutdown has been requested.
    pub async fn wait(&mut self) {
        let _ = self.shutdown_rx.wait_for(|stopped| *stopped).await;
    }

    /// Non-blocking check.
    pub fn poll_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }
}
