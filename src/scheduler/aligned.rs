//! Wall-clock aligned consumption loop.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::record::Reporter;

use super::aligner::{Action, Aligner};
use super::lifecycle::Lifecycle;
use super::store::ScanStore;

/// Takes one scan per sample interval at aligned target times and hands
/// accepted scans to the [`Reporter`].
#[derive(Debug)]
pub struct AlignedLoop {
    store: Arc<ScanStore>,
    aligner: Aligner,
    reporter: Reporter,
}

impl AlignedLoop {
    /// Create a loop reading `store` on the schedule held by `aligner`.
    pub fn new(store: Arc<ScanStore>, aligner: Aligner, reporter: Reporter) -> Self {
        Self {
            store,
            aligner,
            reporter,
        }
    }

    /// Start the loop on `lifecycle`.
    pub fn spawn(self, lifecycle: &Lifecycle) {
        let first_target = self.aligner.target() + self.aligner.interval();
        tracing::info!(first_target = %first_target, "Spawning aligned output loop");
        lifecycle.spawn("aligned", self.run(lifecycle.token()));
    }

    /// Run until `token` is cancelled.
    pub async fn run(mut self, token: CancellationToken) {
        loop {
            let target = self.aligner.advance();
            tracing::debug!(target_time = %target, "Next target time");

            let wait = (target - Utc::now()).to_std().unwrap_or_default();
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
            if token.is_cancelled() {
                break;
            }

            let tick = self.aligner.on_tick(self.store.take());
            if let Some(scan) = &tick.announce {
                self.reporter.announce(scan);
            }
            if let Action::Emit(emission) = tick.action {
                if let Err(e) = self.reporter.emit(&emission) {
                    tracing::error!(error = %e, target_time = %emission.target, "Failed to write record");
                }
            }
        }

        tracing::info!("Aligned output loop stopped");
    }
}
