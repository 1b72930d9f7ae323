//! Application configuration structures.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::device::SessionMode;

use super::points::PointsConfig;
use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Smallest sampling interval accepted on the command line (1 second).
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Largest sampling interval accepted on the command line (1 hour).
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Background queries per sampling interval.
pub const DEFAULT_DIVISOR: u32 = 2;

fn default_min_interval() -> Duration {
    DEFAULT_MIN_INTERVAL
}

fn default_max_interval() -> Duration {
    DEFAULT_MAX_INTERVAL
}

fn default_divisor() -> u32 {
    DEFAULT_DIVISOR
}

// =============================================================================
// Station Configuration
// =============================================================================

/// Site identifiers written into every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Network code (default: "NN").
    pub net: String,

    /// Station code (default: "DFA").
    pub sta: String,

    /// Location code (default: "LL").
    pub loc: String,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            net: "NN".to_string(),
            sta: "DFA".to_string(),
            loc: "LL".to_string(),
        }
    }
}

// =============================================================================
// Device Configuration
// =============================================================================

/// Which [`DeviceClient`](crate::device::DeviceClient) implementation the binary drives.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceDriver {
    /// Built-in simulated device.
    #[default]
    Simulated,
}

/// Device session configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device driver (default: simulated).
    #[serde(default)]
    pub driver: DeviceDriver,

    /// Session mode (default: read-only).
    #[serde(default)]
    pub mode: SessionMode,

    /// Per-query timeout (default: one sample interval).
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

// =============================================================================
// Polling Configuration
// =============================================================================

/// Bounds and cadence for the scan scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Minimum sampling interval (default: 1s).
    #[serde(default = "default_min_interval", with = "humantime_serde")]
    pub min_interval: Duration,

    /// Maximum sampling interval (default: 1h).
    #[serde(default = "default_max_interval", with = "humantime_serde")]
    pub max_interval: Duration,

    /// Background queries per sampling interval, 2 or 3 (default: 2).
    #[serde(default = "default_divisor")]
    pub divisor: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            divisor: DEFAULT_DIVISOR,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Site identifiers.
    #[serde(default)]
    pub station: StationConfig,

    /// Device session settings.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Scheduler bounds and cadence.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Static and data point tables.
    pub points: PointsConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(&expand_env_vars(content))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("net", &self.station.net),
            ("sta", &self.station.sta),
            ("loc", &self.station.loc),
        ] {
            if value.is_empty() || value.contains(char::is_whitespace) {
                return Err(ConfigError::ValidationError(format!(
                    "station {} '{}' must be non-empty and contain no whitespace",
                    name, value
                )));
            }
        }

        if self.polling.min_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "polling min_interval must be positive".to_string(),
            ));
        }
        if self.polling.min_interval > self.polling.max_interval {
            return Err(ConfigError::ValidationError(format!(
                "polling min_interval ({:?}) exceeds max_interval ({:?})",
                self.polling.min_interval, self.polling.max_interval
            )));
        }
        if !(2..=3).contains(&self.polling.divisor) {
            return Err(ConfigError::ValidationError(format!(
                "polling divisor must be 2 or 3, got {}",
                self.polling.divisor
            )));
        }

        if self.device.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ValidationError(
                "device timeout must be positive".to_string(),
            ));
        }

        self.points.validate()?;

        Ok(())
    }
}
