//! Point (OID) tables: which values are read from the device and how they are labelled.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use super::validation::ConfigError;

/// Physical quantity behind a data point; drives unit scaling in the status report.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PointKind {
    /// Relay state (0 = open, 1 = closed).
    Relay,
    /// Voltage in tenths of a volt.
    Voltage,
    /// Current in tenths of an amp.
    Current,
    /// Temperature in tenths of a degree celsius.
    Temperature,
    /// Anything else; reported raw.
    #[default]
    Other,
}

/// A device identity point, read with every query and logged after a gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticPoint {
    /// Point identifier understood by the device (an OID for SNMP devices).
    pub id: String,
    /// Human-readable label.
    pub label: String,
}

/// A sampled point, written to every output record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Point identifier understood by the device.
    pub id: String,
    /// Human-readable label used in the status report.
    pub label: String,
    /// Short channel code used as the record label (`channel:value`).
    pub channel: String,
    /// Physical quantity.
    #[serde(default)]
    pub kind: PointKind,
}

impl DataPoint {
    /// Create a data point of kind [`PointKind::Other`].
    pub fn new(id: impl Into<String>, label: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            channel: channel.into(),
            kind: PointKind::Other,
        }
    }

    /// Set the point kind.
    pub fn with_kind(mut self, kind: PointKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Static and data point tables.
///
/// Data point order is the order of `channel:value` pairs in each record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsConfig {
    /// Identity points (product name, firmware version, ...).
    #[serde(default, rename = "static")]
    pub static_points: Vec<StaticPoint>,

    /// Sampled points.
    #[serde(default, rename = "data")]
    pub data_points: Vec<DataPoint>,
}

impl PointsConfig {
    /// All point ids in query order: static points first, then data points.
    pub fn query_ids(&self) -> Vec<String> {
        self.static_points
            .iter()
            .map(|p| p.id.clone())
            .chain(self.data_points.iter().map(|p| p.id.clone()))
            .collect()
    }

    /// Data points of one kind, in configured order.
    pub fn of_kind(&self, kind: PointKind) -> impl Iterator<Item = &DataPoint> {
        self.data_points.iter().filter(move |p| p.kind == kind)
    }

    /// Validate point tables.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_points.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one data point must be configured".to_string(),
            ));
        }

        let mut seen_ids = HashSet::new();
        let ids = self
            .static_points
            .iter()
            .map(|p| &p.id)
            .chain(self.data_points.iter().map(|p| &p.id));
        for id in ids {
            if id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "point id cannot be empty".to_string(),
                ));
            }
            if !seen_ids.insert(id) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate point id: '{}'",
                    id
                )));
            }
        }

        for point in &self.data_points {
            if point.channel.is_empty()
                || point.channel.contains(char::is_whitespace)
                || point.channel.contains(':')
            {
                return Err(ConfigError::ValidationError(format!(
                    "data point '{}': invalid channel code '{}'",
                    point.id, point.channel
                )));
            }
        }

        Ok(())
    }
}
