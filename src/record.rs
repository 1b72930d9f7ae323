//! Output records.
//!
//! One line per accepted interval:
//!
//! ```text
//! YYYY MM DD HH MM SS NET STA LOC INTERVAL CH:value CH:value ...
//! ```
//!
//! Date and time are the interval's target time in UTC; `INTERVAL` is the
//! sample interval in whole seconds; channel pairs follow the configured data
//! point order. Downstream consumers parse these fields positionally.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{Datelike, Timelike};

use crate::config::{AppConfig, DataPoint, StaticPoint, StationConfig};
use crate::scheduler::{Emission, Scan};

/// Destination for formatted records.
pub trait RecordSink: Send + 'static {
    /// Write one record line (without trailing newline).
    fn write_record(&mut self, line: &str) -> io::Result<()>;
}

/// Writes records to standard output, flushing after each line.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl RecordSink for StdoutSink {
    fn write_record(&mut self, line: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{line}")?;
        out.flush()
    }
}

/// Collects records in memory; clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RecordSink for MemorySink {
    fn write_record(&mut self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }
}

/// Turns emissions into record lines.
#[derive(Debug, Clone)]
pub struct RecordFormatter {
    station: StationConfig,
    points: Vec<DataPoint>,
    interval: Duration,
}

impl RecordFormatter {
    /// Create a formatter for `points` sampled every `interval`.
    pub fn new(station: StationConfig, points: Vec<DataPoint>, interval: Duration) -> Self {
        Self {
            station,
            points,
            interval,
        }
    }

    /// Format one record. Points missing from the scan get an empty value.
    pub fn format(&self, emission: &Emission) -> String {
        let t = emission.target;
        let mut line = format!(
            "{:04} {:02} {:02} {:02} {:02} {:02} {} {} {} {:.0}",
            t.year(),
            t.month(),
            t.day(),
            t.hour(),
            t.minute(),
            t.second(),
            self.station.net,
            self.station.sta,
            self.station.loc,
            self.interval.as_secs_f64(),
        );

        for point in &self.points {
            line.push(' ');
            line.push_str(&point.channel);
            line.push(':');
            line.push_str(emission.scan.value(&point.id).unwrap_or(""));
        }

        line
    }
}

/// Log the identity points of the device that produced `scan`.
pub fn log_device_info(points: &[StaticPoint], scan: &Scan) {
    for point in points {
        tracing::info!(
            "{}: {}",
            point.label,
            scan.value(&point.id).unwrap_or("<missing>")
        );
    }
}

/// Output collaborator of the aligned loop: formats and writes records,
/// and logs device identity after gaps.
pub struct Reporter {
    formatter: RecordFormatter,
    static_points: Vec<StaticPoint>,
    sink: Box<dyn RecordSink>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("formatter", &self.formatter)
            .field("static_points", &self.static_points.len())
            .finish_non_exhaustive()
    }
}

impl Reporter {
    /// Create a reporter from its parts.
    pub fn new(
        formatter: RecordFormatter,
        static_points: Vec<StaticPoint>,
        sink: Box<dyn RecordSink>,
    ) -> Self {
        Self {
            formatter,
            static_points,
            sink,
        }
    }

    /// Build a reporter for `config` at `interval`, writing to `sink`.
    pub fn from_config(config: &AppConfig, interval: Duration, sink: Box<dyn RecordSink>) -> Self {
        let formatter = RecordFormatter::new(
            config.station.clone(),
            config.points.data_points.clone(),
            interval,
        );
        Self::new(formatter, config.points.static_points.clone(), sink)
    }

    /// Log device identity from the first scan after a gap.
    pub fn announce(&self, scan: &Scan) {
        log_device_info(&self.static_points, scan);
    }

    /// Format and write one record.
    pub fn emit(&mut self, emission: &Emission) -> io::Result<()> {
        let line = self.formatter.format(emission);
        if emission.repeated {
            tracing::debug!(record = %line, "Writing repeated record");
        }
        self.sink.write_record(&line)
    }
}
