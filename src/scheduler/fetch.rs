//! Background device polling.
//!
//! Queries the device every internal interval and publishes each completed
//! scan into the [`ScanStore`]. Wake-ups are computed from a monotonically
//! advancing trigger (`trigger += interval`), not from "now", so scheduling
//! error does not accumulate over long sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::sync::CancellationToken;

use crate::device::{DeviceClient, DeviceError};

use super::error::SchedulerError;
use super::lifecycle::Lifecycle;
use super::params::PollingParams;
use super::store::ScanStore;

/// Periodic query loop feeding the scan store.
pub struct FetchLoop<D: DeviceClient> {
    device: Arc<D>,
    store: Arc<ScanStore>,
    ids: Vec<String>,
    interval: Duration,
    query_timeout: Duration,
}

impl<D: DeviceClient> std::fmt::Debug for FetchLoop<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchLoop")
            .field("points", &self.ids.len())
            .field("interval", &self.interval)
            .field("query_timeout", &self.query_timeout)
            .finish_non_exhaustive()
    }
}

impl<D: DeviceClient> FetchLoop<D> {
    /// Create a loop querying `ids` at the internal interval of `params`.
    pub fn new(
        device: Arc<D>,
        store: Arc<ScanStore>,
        ids: Vec<String>,
        params: &PollingParams,
    ) -> Self {
        Self {
            device,
            store,
            ids,
            interval: params.internal_interval(),
            query_timeout: params.query_timeout(),
        }
    }

    /// Start the loop on `lifecycle`.
    ///
    /// # Errors
    /// Returns `SchedulerError::NotConnected` if the device session is not open.
    pub fn spawn(self, lifecycle: &Lifecycle) -> Result<(), SchedulerError> {
        if !self.device.is_connected() {
            return Err(SchedulerError::NotConnected(
                "fetch loop requires an open device session".to_string(),
            ));
        }

        tracing::info!(
            interval_ms = self.interval.as_millis(),
            points = self.ids.len(),
            "Spawning internal polling loop"
        );
        lifecycle.spawn("fetch", self.run(lifecycle.token()));
        Ok(())
    }

    /// Issue one query and publish the result.
    ///
    /// # Errors
    /// Returns the device error, or `DeviceError::Timeout` if the query took
    /// longer than the configured timeout. Nothing is published on error.
    pub async fn fetch_once(&self) -> Result<(), DeviceError> {
        let (timestamp, data) = timeout(self.query_timeout, self.device.query(&self.ids))
            .await
            .map_err(|_| DeviceError::Timeout(self.query_timeout))??;
        tracing::trace!(scan_time = %timestamp, values = data.len(), "Scan published");
        self.store.publish(timestamp, data);
        Ok(())
    }

    async fn run(self, token: CancellationToken) {
        let mut trigger = Instant::now();
        let mut failures: u64 = 0;

        loop {
            trigger += self.interval;

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = sleep_until(trigger) => {}
            }

            // An in-flight query is abandoned on cancellation.
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = self.fetch_once() => result,
            };

            match result {
                Ok(()) => {
                    if failures > 0 {
                        tracing::info!(failures, "Device queries recovered");
                        failures = 0;
                    }
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(error = %e, failures, "Device query failed");
                }
            }
        }

        tracing::info!("Internal polling loop stopped");
    }
}
