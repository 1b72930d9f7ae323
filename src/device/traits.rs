//! Core device client traits and types.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::config::Target;

/// Values returned by one query, keyed by point id.
pub type PointValues = HashMap<String, String>;

/// Errors that can occur while talking to a device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Network I/O error.
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// The query did not complete within its deadline.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// The device answered with something that could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Operation requires an open session.
    #[error("device {0} is not connected")]
    NotConnected(String),

    /// `connect` was called on an open session.
    #[error("device {0} is already connected")]
    AlreadyConnected(String),
}

/// Access mode requested when opening a session.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum SessionMode {
    /// Queries only.
    #[default]
    ReadOnly,
    /// Queries and writes (relay actuation).
    ReadWrite,
}

/// A request/response session with a power-monitoring device.
///
/// The session is opened once with [`connect`](Self::connect) before any
/// loop starts. After that it is shared read-only: only the background fetch
/// loop issues [`query`](Self::query) calls, so implementations need no
/// locking beyond what their transport requires.
///
/// Implementations report the time the values were sampled; callers use
/// that timestamp, not their own clock, to place the values in time.
#[async_trait::async_trait]
pub trait DeviceClient: Send + Sync + 'static {
    /// Open a session to `target`.
    ///
    /// # Errors
    /// `AlreadyConnected` if a session is open, `Network` if the device
    /// cannot be reached.
    async fn connect(&mut self, target: &Target, mode: SessionMode) -> Result<(), DeviceError>;

    /// Whether a session is currently open.
    fn is_connected(&self) -> bool;

    /// Read `ids` in one round trip.
    ///
    /// Returns the sample time and a value per requested id. Ids the device
    /// does not know are simply absent from the map.
    async fn query(&self, ids: &[String]) -> Result<(DateTime<Utc>, PointValues), DeviceError>;

    /// Close the session. Closing a closed session is a no-op.
    async fn close(&self);
}
