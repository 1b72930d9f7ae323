//! rpmon - Remote Power Monitor
//!
//! Samples a networked power-monitoring device on a fixed, wall-clock
//! aligned interval and writes one text record per interval. It can be used
//! as a library or run through the `rpmon` binary.
//!
//! # Architecture
//!
//! - **Device**: request/response seam to the monitored device ([`DeviceClient`])
//! - **Scheduler**: background fetch loop, single-slot scan store and aligned output loop
//! - **Record**: record formatting and sinks
//! - **Status**: one-shot status report
//! - **Config**: YAML station, polling and point tables
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rpmon::{AppConfig, DeviceClient, Lifecycle, Poller, PollingParams, SessionMode, SimulatedDevice, StdoutSink, Target};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load("configs/rpmon.yaml")?;
//!     let mut device = SimulatedDevice::new();
//!     device.connect(&Target::parse("10.0.0.5:161")?, SessionMode::ReadOnly).await?;
//!
//!     let params = PollingParams::from_config(Duration::from_secs(1), &config)?;
//!     let lifecycle = Lifecycle::new();
//!     Poller::new(Arc::new(device), &config, params, Box::new(StdoutSink)).start(&lifecycle)?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     lifecycle.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod record;
pub mod scheduler;
pub mod status;

pub use config::{AppConfig, ConfigError, Target};
pub use device::{DeviceClient, DeviceError, SessionMode, SimulatedDevice};
pub use record::{MemorySink, RecordSink, StdoutSink};
pub use scheduler::{Lifecycle, Poller, PollingParams, Scan, ScanStore, SchedulerError};
pub use status::{StatusReport, query_status};
