//! Simulated power monitor.
//!
//! Answers queries from memory so the scheduler can be exercised without
//! hardware. Values are deterministic per point id and drift slowly with
//! each query; individual points can be pinned with [`SimulatedDevice::with_value`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::Target;

use super::traits::{DeviceClient, DeviceError, PointValues, SessionMode};

/// In-memory [`DeviceClient`] with injectable latency, failures and clock skew.
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    target: Option<Target>,
    mode: SessionMode,
    connected: AtomicBool,
    pinned: HashMap<String, String>,
    latency: Duration,
    clock_skew: TimeDelta,
    pending_failures: AtomicU64,
    queries: AtomicU64,
}

impl SimulatedDevice {
    /// Create a disconnected simulated device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Always report `value` for point `id`.
    pub fn with_value(mut self, id: impl Into<String>, value: impl Into<String>) -> Self {
        self.pinned.insert(id.into(), value.into());
        self
    }

    /// Delay every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Shift reported sample times by `skew` relative to the local clock.
    pub fn with_clock_skew(mut self, skew: TimeDelta) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Make the next `count` queries fail with a protocol error.
    pub fn fail_next(&self, count: u64) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Number of queries received so far, failed ones included.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    /// Mode the session was opened with.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    fn name(&self) -> String {
        self.target
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "simulated".to_string())
    }

    fn synthesize(id: &str, sequence: u64) -> String {
        let base = id
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
        (100 + base % 400 + sequence % 5).to_string()
    }
}

#[async_trait::async_trait]
impl DeviceClient for SimulatedDevice {
    async fn connect(&mut self, target: &Target, mode: SessionMode) -> Result<(), DeviceError> {
        if self.is_connected() {
            return Err(DeviceError::AlreadyConnected(self.name()));
        }
        self.target = Some(target.clone());
        self.mode = mode;
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!(host = %target, mode = %mode, "Simulated device connected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn query(&self, ids: &[String]) -> Result<(DateTime<Utc>, PointValues), DeviceError> {
        if !self.is_connected() {
            return Err(DeviceError::NotConnected(self.name()));
        }
        let sequence = self.queries.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failing = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DeviceError::Protocol("simulated failure".to_string()));
        }

        let values = ids
            .iter()
            .map(|id| {
                let value = self
                    .pinned
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| Self::synthesize(id, sequence));
                (id.clone(), value)
            })
            .collect();

        Ok((Utc::now() + self.clock_skew, values))
    }

    async fn close(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            tracing::debug!(device = %self.name(), "Simulated device closed");
        }
    }
}
