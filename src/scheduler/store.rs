//! Single-slot hand-off between the fetch loop and the aligned loop.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::device::PointValues;

/// One timestamped snapshot of all polled device values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scan {
    /// Sample time reported by the device.
    pub timestamp: DateTime<Utc>,
    /// Values keyed by point id.
    pub data: PointValues,
}

impl Scan {
    /// Create a scan.
    pub fn new(timestamp: DateTime<Utc>, data: PointValues) -> Self {
        Self { timestamp, data }
    }

    /// Value of point `id`, if the device returned one.
    pub fn value(&self, id: &str) -> Option<&str> {
        self.data.get(id).map(String::as_str)
    }
}

/// Holds the most recently completed scan, or nothing.
///
/// Writers replace the slot unconditionally; readers [`take`](Self::take) it,
/// leaving the slot empty, so the same scan is never handed out twice.
/// Newer scans overwrite older ones: there is no queue and no back-pressure.
#[derive(Debug, Default)]
pub struct ScanStore {
    slot: Mutex<Option<Scan>>,
}

impl ScanStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held scan with a freshly completed one.
    pub fn publish(&self, timestamp: DateTime<Utc>, data: PointValues) {
        *self.slot() = Some(Scan::new(timestamp, data));
    }

    /// Remove and return the held scan; `None` if nothing was published since the last take.
    pub fn take(&self) -> Option<Scan> {
        self.slot().take()
    }

    /// Whether a scan is waiting to be taken.
    pub fn is_empty(&self) -> bool {
        self.slot().is_none()
    }

    // A panic while holding the lock cannot leave a half-written scan behind:
    // the slot is only ever assigned whole values.
    fn slot(&self) -> MutexGuard<'_, Option<Scan>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
