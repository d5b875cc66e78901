//! Delayed removal of download staging directories.

use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Removes staging directories a fixed delay after they were handed over,
/// or immediately once `shutdown` is cancelled.
#[derive(Debug, Clone)]
pub struct DeferredCleanup {
    delay: Duration,
    shutdown: CancellationToken,
}

impl DeferredCleanup {
    pub fn new(delay: Duration, shutdown: CancellationToken) -> Self {
        Self { delay, shutdown }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Take ownership of `dir` and remove it later.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, dir: TempDir) -> JoinHandle<()> {
        let delay = self.delay;
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => {
                    tracing::debug!(path = %dir.path().display(), "Shutdown: removing staging dir early");
                }
            }
            let path = dir.path().to_path_buf();
            match tokio::task::spawn_blocking(move || dir.close()).await {
                Ok(Ok(())) => tracing::debug!(path = %path.display(), "Staging dir removed"),
                Ok(Err(e)) => tracing::warn!(path = %path.display(), "Failed to remove staging dir: {e}"),
                Err(e) => tracing::warn!(path = %path.display(), "Cleanup task join error: {e}"),
            }
        })
    }
}
