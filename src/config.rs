//! Configuration module for the rpmon agent.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Station identifiers (net, sta, loc)
//! - Device session settings (driver, mode, query timeout)
//! - Polling bounds and background cadence
//! - Static and data point tables

mod app;
mod points;
mod validation;

pub use app::{AppConfig, DeviceConfig, DeviceDriver, PollingConfig, StationConfig};
pub use points::{DataPoint, PointKind, PointsConfig, StaticPoint};
pub use validation::{ConfigError, Target, expand_env_vars, parse_duration, parse_sample_interval};

// Re-export constants
pub use app::{DEFAULT_DIVISOR, DEFAULT_MAX_INTERVAL, DEFAULT_MIN_INTERVAL};
