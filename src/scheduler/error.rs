//! Scheduler error types.
//!
//! Only startup and shutdown problems surface as [`SchedulerError`]. Device
//! failures during polling are absorbed by the fetch loop, and timing
//! anomalies by the aligned loop; both are visible only in logs and gaps.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while setting up or tearing down the scan scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Sample or internal interval is unusable.
    #[error("invalid polling interval: {0}")]
    InvalidInterval(String),

    /// The fetch loop was started on a device without an open session.
    #[error("device {0} is not connected")]
    NotConnected(String),

    /// Wall-clock arithmetic failed (e.g. rounding out of range).
    #[error("clock error: {0}")]
    Clock(String),

    /// Loops did not report completion in time.
    #[error("shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),
}
