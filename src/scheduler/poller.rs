//! Wires the fetch loop, scan store and aligned loop together.

use std::sync::Arc;

use chrono::Utc;

use crate::config::AppConfig;
use crate::device::DeviceClient;
use crate::record::{RecordSink, Reporter};

use super::aligned::AlignedLoop;
use super::aligner::Aligner;
use super::error::SchedulerError;
use super::fetch::FetchLoop;
use super::lifecycle::Lifecycle;
use super::params::PollingParams;
use super::store::ScanStore;

/// Scan scheduler for one connected device.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # use rpmon::config::{AppConfig, Target};
/// # use rpmon::device::{DeviceClient, SessionMode, SimulatedDevice};
/// # use rpmon::record::StdoutSink;
/// # use rpmon::scheduler::{Lifecycle, PollingParams, Poller};
/// # async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
/// let mut device = SimulatedDevice::new();
/// device.connect(&Target::new("10.0.0.5", 161), SessionMode::ReadOnly).await?;
///
/// let params = PollingParams::from_config(Duration::from_secs(1), &config)?;
/// let lifecycle = Lifecycle::new();
/// Poller::new(Arc::new(device), &config, params, Box::new(StdoutSink)).start(&lifecycle)?;
///
/// tokio::signal::ctrl_c().await?;
/// lifecycle.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct Poller<D: DeviceClient> {
    device: Arc<D>,
    store: Arc<ScanStore>,
    params: PollingParams,
    query_ids: Vec<String>,
    reporter: Reporter,
}

impl<D: DeviceClient> std::fmt::Debug for Poller<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("params", &self.params)
            .field("query_ids", &self.query_ids)
            .finish_non_exhaustive()
    }
}

impl<D: DeviceClient> Poller<D> {
    /// Create a poller for `device` using the point tables and station of `config`.
    pub fn new(
        device: Arc<D>,
        config: &AppConfig,
        params: PollingParams,
        sink: Box<dyn RecordSink>,
    ) -> Self {
        Self {
            device,
            store: Arc::new(ScanStore::new()),
            params,
            query_ids: config.points.query_ids(),
            reporter: Reporter::from_config(config, params.sample_interval(), sink),
        }
    }

    /// Store shared by the two loops.
    pub fn store(&self) -> Arc<ScanStore> {
        Arc::clone(&self.store)
    }

    /// Spawn both loops on `lifecycle`.
    ///
    /// # Errors
    /// Fails without spawning anything if the device is not connected or the
    /// sample interval cannot be aligned to the wall clock.
    pub fn start(self, lifecycle: &Lifecycle) -> Result<(), SchedulerError> {
        let aligner = Aligner::new(Utc::now(), self.params.sample_interval())?;

        FetchLoop::new(
            self.device,
            Arc::clone(&self.store),
            self.query_ids,
            &self.params,
        )
        .spawn(lifecycle)?;

        AlignedLoop::new(self.store, aligner, self.reporter).spawn(lifecycle);

        tracing::info!(
            sample_interval_ms = self.params.sample_interval().as_millis(),
            internal_interval_ms = self.params.internal_interval().as_millis(),
            "Scan scheduler started"
        );
        Ok(())
    }
}
