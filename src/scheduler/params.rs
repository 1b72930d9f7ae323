//! Sampling and background query cadence.

use std::time::Duration;

use crate::config::AppConfig;

use super::error::SchedulerError;

/// Timing parameters shared by the fetch loop and the aligned loop.
///
/// The internal interval is always strictly shorter than the sample
/// interval, so at least one background query completes per output record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingParams {
    sample_interval: Duration,
    internal_interval: Duration,
    query_timeout: Duration,
}

impl PollingParams {
    /// Derive parameters from a sample interval and the number of background
    /// queries per interval (`divisor`, at least 2).
    ///
    /// The query timeout defaults to one sample interval.
    pub fn new(sample_interval: Duration, divisor: u32) -> Result<Self, SchedulerError> {
        if sample_interval.is_zero() {
            return Err(SchedulerError::InvalidInterval(
                "sample interval must be positive".to_string(),
            ));
        }
        if divisor < 2 {
            return Err(SchedulerError::InvalidInterval(format!(
                "divisor must be at least 2, got {divisor}"
            )));
        }

        let internal_interval = sample_interval / divisor;
        if internal_interval.is_zero() {
            return Err(SchedulerError::InvalidInterval(format!(
                "sample interval {sample_interval:?} too short for {divisor} queries"
            )));
        }

        Ok(Self {
            sample_interval,
            internal_interval,
            query_timeout: sample_interval,
        })
    }

    /// Build parameters from the user's sample interval and the polling and
    /// device sections of `config`.
    pub fn from_config(sample_interval: Duration, config: &AppConfig) -> Result<Self, SchedulerError> {
        let params = Self::new(sample_interval, config.polling.divisor)?;
        Ok(match config.device.timeout {
            Some(timeout) => params.with_query_timeout(timeout),
            None => params,
        })
    }

    /// Override the per-query timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Output cadence.
    pub fn sample_interval(&self) -> Duration {
        self.sample_interval
    }

    /// Background query cadence.
    pub fn internal_interval(&self) -> Duration {
        self.internal_interval
    }

    /// Upper bound on a single device query.
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }
}
