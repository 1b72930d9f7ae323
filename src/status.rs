//! One-shot device status report.
//!
//! Queries every configured point once and renders identity, query time and
//! data points grouped by kind, with raw tenths converted to engineering units.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{PointKind, PointsConfig, Target};
use crate::device::{DeviceClient, DeviceError};
use crate::scheduler::Scan;

/// Width of the right-aligned label column.
const LABEL_WIDTH: usize = 40;

/// Report sections, in display order.
const SECTIONS: [PointKind; 5] = [
    PointKind::Relay,
    PointKind::Voltage,
    PointKind::Current,
    PointKind::Temperature,
    PointKind::Other,
];

/// Divisor and unit for a point kind; `None` means report raw.
fn scaling(kind: PointKind) -> Option<(f64, &'static str)> {
    match kind {
        PointKind::Voltage => Some((10.0, "volts")),
        PointKind::Current => Some((10.0, "amps")),
        PointKind::Temperature => Some((10.0, "deg celsius")),
        PointKind::Relay | PointKind::Other => None,
    }
}

/// A labelled value in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// Point label.
    pub label: String,
    /// Value as returned by the device, if any.
    pub raw: Option<String>,
    /// Scaled value, for kinds with a unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Unit of `value`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
}

impl Reading {
    fn new(label: &str, kind: PointKind, raw: Option<&str>) -> Self {
        let (value, unit) = match (scaling(kind), raw.and_then(|r| r.trim().parse::<f64>().ok())) {
            (Some((divisor, unit)), Some(n)) => (Some(n / divisor), Some(unit)),
            _ => (None, None),
        };
        Self {
            label: label.to_string(),
            raw: raw.map(str::to_string),
            value,
            unit,
        }
    }

    fn display_value(&self) -> String {
        match (self.value, self.unit, &self.raw) {
            (Some(v), Some(unit), _) => format!("{v:4.1} ({unit})"),
            (_, _, Some(raw)) => raw.clone(),
            _ => "<missing>".to_string(),
        }
    }
}

/// Points of one kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    /// Kind shared by every reading.
    pub kind: PointKind,
    /// Readings in configured order.
    pub readings: Vec<Reading>,
}

/// Snapshot of a device's identity and current values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    /// Device address.
    pub host: String,
    /// Sample time reported by the device.
    pub queried_at: DateTime<Utc>,
    /// Static identity points.
    pub identity: Vec<Reading>,
    /// Non-empty data point sections.
    pub sections: Vec<Section>,
}

impl StatusReport {
    /// Build a report from a completed scan.
    pub fn from_scan(target: &Target, points: &PointsConfig, scan: &Scan) -> Self {
        let identity = points
            .static_points
            .iter()
            .map(|p| Reading::new(&p.label, PointKind::Other, scan.value(&p.id)))
            .collect();

        let sections = SECTIONS
            .iter()
            .map(|&kind| Section {
                kind,
                readings: points
                    .of_kind(kind)
                    .map(|p| Reading::new(&p.label, kind, scan.value(&p.id)))
                    .collect(),
            })
            .filter(|s| !s.readings.is_empty())
            .collect();

        Self {
            host: target.to_string(),
            queried_at: scan.timestamp,
            identity,
            sections,
        }
    }

    /// Render as right-aligned `label:  value` lines.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let mut line = |label: &str, value: &str| {
            let _ = writeln!(out, "{label:>LABEL_WIDTH$}:  {value}");
        };

        line("Host", &self.host);
        for reading in &self.identity {
            line(&reading.label, &reading.display_value());
        }
        line(
            "Time of Query",
            &self.queried_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );

        for section in &self.sections {
            out.push('\n');
            for reading in &section.readings {
                let _ = writeln!(
                    out,
                    "{:>LABEL_WIDTH$}:  {}",
                    reading.label,
                    reading.display_value()
                );
            }
        }

        out
    }
}

/// Query all configured points once and build a report.
///
/// # Errors
/// Returns the device error, or `DeviceError::Timeout` after `timeout`.
pub async fn query_status<D: DeviceClient>(
    device: &D,
    target: &Target,
    points: &PointsConfig,
    timeout: Duration,
) -> Result<StatusReport, DeviceError> {
    let ids = points.query_ids();
    let (timestamp, data) = tokio::time::timeout(timeout, device.query(&ids))
        .await
        .map_err(|_| DeviceError::Timeout(timeout))??;

    tracing::debug!(values = data.len(), "Status query complete");
    Ok(StatusReport::from_scan(target, points, &Scan::new(timestamp, data)))
}
