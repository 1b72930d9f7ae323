//! Cancellation signal and completion barrier shared by the polling loops.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::error::SchedulerError;

/// Default timeout for graceful shutdown (5 seconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the cancellation token broadcast to every loop and tracks the loops
/// so shutdown can wait for all of them to finish.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Lifecycle {
    /// Create a lifecycle with no tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that fires when shutdown begins.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether shutdown has begun.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of loops still running.
    pub fn running(&self) -> usize {
        self.tracker.len()
    }

    /// Spawn a loop whose completion shutdown waits for.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::debug!(task = name, "Spawning task");
        self.tracker.spawn(async move {
            task.await;
            tracing::debug!(task = name, "Task finished");
        });
    }

    /// Signal cancellation without waiting.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel all loops and wait for them with the default timeout.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Cancel all loops and wait up to `timeout` for them to report completion.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<(), SchedulerError> {
        let running = self.tracker.len();
        self.token.cancel();
        self.tracker.close();

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                tracing::info!(tasks = running, "Polling loops stopped");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(
                    tasks = self.tracker.len(),
                    timeout_ms = timeout.as_millis(),
                    "Polling loops did not stop in time"
                );
                Err(SchedulerError::ShutdownTimeout(timeout))
            }
        }
    }
}
