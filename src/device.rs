//! Device Layer
//!
//! The request/response seam between the scheduler and a power-monitoring
//! device. The wire protocol lives behind [`DeviceClient`]; the scheduler
//! only sees timestamped maps of point id to value string.
//!
//! - [`DeviceClient`]: connect / query / close capability
//! - [`DeviceError`]: network, timeout and protocol failures
//! - [`SimulatedDevice`]: in-memory device for dry runs and tests

pub mod sim;
mod traits;

pub use sim::SimulatedDevice;
pub use traits::{DeviceClient, DeviceError, PointValues, SessionMode};
