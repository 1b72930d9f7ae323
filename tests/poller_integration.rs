//! Scan Scheduler Integration Tests
//!
//! Runs the full poller against the simulated device on short real-time
//! intervals.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use rpmon::config::{AppConfig, PointKind, Target};
use rpmon::device::{DeviceClient, SessionMode, SimulatedDevice};
use rpmon::record::MemorySink;
use rpmon::scheduler::{Lifecycle, Poller, PollingParams};
use rpmon::status::query_status;

// =============================================================================
// Test Helpers
// =============================================================================

const CONFIG: &str = r#"
station:
  net: XX
  sta: TST
  loc: "00"
polling:
  divisor: 3
points:
  static:
    - id: sys.name
      label: Product Name
  data:
    - { id: volts.1, label: Voltage 1, channel: V1, kind: voltage }
    - { id: amps.1, label: Current 1, channel: C1, kind: current }
"#;

fn config() -> AppConfig {
    AppConfig::from_yaml(CONFIG).expect("Failed to parse test config")
}

async fn connected(device: SimulatedDevice) -> Arc<SimulatedDevice> {
    let mut device = device;
    device
        .connect(&Target::new("127.0.0.1", 161), SessionMode::ReadOnly)
        .await
        .expect("Failed to connect simulated device");
    Arc::new(device)
}

/// Run a poller for `run_for`, shut it down and return the records written.
async fn run_poller(
    device: Arc<SimulatedDevice>,
    interval: Duration,
    run_for: Duration,
) -> Vec<String> {
    let config = config();
    let params = PollingParams::from_config(interval, &config).unwrap();
    let sink = MemorySink::new();
    let lifecycle = Lifecycle::new();

    Poller::new(device, &config, params, Box::new(sink.clone()))
        .start(&lifecycle)
        .unwrap();

    tokio::time::sleep(run_for).await;
    lifecycle.shutdown().await.unwrap();
    assert_eq!(lifecycle.running(), 0);

    sink.lines()
}

// =============================================================================
// Polling
// =============================================================================

#[tokio::test]
async fn test_poll_writes_aligned_records() {
    let device = connected(SimulatedDevice::new().with_value("volts.1", "1204")).await;
    let interval = Duration::from_millis(200);

    let lines = run_poller(Arc::clone(&device), interval, Duration::from_millis(1500)).await;

    assert!(lines.len() >= 3, "expected records, got {lines:?}");
    for line in &lines {
        let fields: Vec<&str> = line.split(' ').collect();
        assert_eq!(fields.len(), 12, "unexpected record: {line}");
        assert_eq!(&fields[6..10], &["XX", "TST", "00", "0"]);
        assert_eq!(fields[10], "V1:1204");
        assert!(fields[11].starts_with("C1:"));
    }

    // Target times never go backwards.
    let stamps: Vec<&str> = lines.iter().map(|l| &l[..19]).collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]), "{stamps:?}");
    assert!(device.query_count() >= lines.len() as u64);
}

#[tokio::test]
async fn test_no_queries_or_records_after_shutdown() {
    let device = connected(SimulatedDevice::new()).await;
    let config = config();
    let params = PollingParams::from_config(Duration::from_millis(200), &config).unwrap();
    let sink = MemorySink::new();
    let lifecycle = Lifecycle::new();

    Poller::new(Arc::clone(&device), &config, params, Box::new(sink.clone()))
        .start(&lifecycle)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;
    lifecycle.shutdown().await.unwrap();

    let queries = device.query_count();
    let records = sink.lines().len();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(device.query_count(), queries);
    assert_eq!(sink.lines().len(), records);
}

#[tokio::test]
async fn test_poll_recovers_from_query_failures() {
    let device = connected(SimulatedDevice::new()).await;
    device.fail_next(4);

    let lines = run_poller(
        Arc::clone(&device),
        Duration::from_millis(200),
        Duration::from_millis(1600),
    )
    .await;

    assert!(device.query_count() > 4);
    assert!(!lines.is_empty(), "expected records after recovery");
}

#[tokio::test]
async fn test_dropped_responses_leave_no_missing_targets() {
    let device = connected(SimulatedDevice::new()).await;
    let mut config = config();
    config.polling.divisor = 2;
    let params = PollingParams::from_config(Duration::from_secs(1), &config).unwrap();
    let sink = MemorySink::new();
    let lifecycle = Lifecycle::new();

    Poller::new(Arc::clone(&device), &config, params, Box::new(sink.clone()))
        .start(&lifecycle)
        .unwrap();

    // Lose one full interval's worth of responses mid-run.
    tokio::time::sleep(Duration::from_millis(3300)).await;
    device.fail_next(u64::from(config.polling.divisor));
    tokio::time::sleep(Duration::from_millis(3000)).await;
    lifecycle.shutdown().await.unwrap();

    let lines = sink.lines();
    assert!(lines.len() >= 4, "expected records, got {lines:?}");
    let targets: Vec<NaiveDateTime> = lines
        .iter()
        .map(|l| NaiveDateTime::parse_from_str(&l[..19], "%Y %m %d %H %M %S").unwrap())
        .collect();
    for pair in targets.windows(2) {
        assert_eq!(pair[1] - pair[0], TimeDelta::seconds(1), "{lines:?}");
    }
}

#[tokio::test]
async fn test_stale_device_clock_writes_nothing() {
    // Every scan is a full second behind its target, so no interval ever
    // has an acceptable scan and there is no previous scan to repeat.
    let device = connected(SimulatedDevice::new().with_clock_skew(TimeDelta::seconds(-1))).await;

    let lines = run_poller(
        Arc::clone(&device),
        Duration::from_millis(200),
        Duration::from_millis(1000),
    )
    .await;

    assert!(device.query_count() > 0);
    assert!(lines.is_empty(), "unexpected records: {lines:?}");
}

#[tokio::test]
async fn test_poller_rejects_disconnected_device() {
    let config = config();
    let params = PollingParams::from_config(Duration::from_secs(1), &config).unwrap();
    let lifecycle = Lifecycle::new();

    let result = Poller::new(
        Arc::new(SimulatedDevice::new()),
        &config,
        params,
        Box::new(MemorySink::new()),
    )
    .start(&lifecycle);

    assert!(result.is_err());
    lifecycle.shutdown().await.unwrap();
}

// =============================================================================
// Shipped Configuration
// =============================================================================

#[test]
fn test_default_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/rpmon.yaml");
    let config = AppConfig::load(path).expect("Failed to load shipped config");

    assert_eq!(config.points.static_points.len(), 3);
    assert_eq!(config.points.data_points.len(), 14);
    assert_eq!(config.points.of_kind(PointKind::Relay).count(), 4);
    assert_eq!(config.points.of_kind(PointKind::Temperature).count(), 2);
    assert_eq!(config.polling.divisor, 2);
}

#[tokio::test]
async fn test_status_against_shipped_config() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/rpmon.yaml");
    let config = AppConfig::load(path).unwrap();
    let target = Target::new("127.0.0.1", 161);
    let device = connected(
        SimulatedDevice::new()
            .with_value("enterprises.45621.2.1.1.0", "TPDIN2-WEB")
            .with_value("enterprises.45621.2.2.5.0", "1210"),
    )
    .await;

    let report = query_status(device.as_ref(), &target, &config.points, Duration::from_secs(1))
        .await
        .unwrap();
    let text = report.render_text();

    assert!(text.contains("Product Name:  TPDIN2-WEB"));
    assert!(text.contains("Voltage 1:  121.0 (volts)"));
    assert_eq!(report.sections.len(), 4);
}
