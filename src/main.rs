//! rpmon Binary Entry Point
//!
//! Polls a power-monitoring device and writes one record per sampling
//! interval to stdout. Logs go to stderr.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rpmon::{
    config::{AppConfig, DeviceDriver, Target, parse_sample_interval},
    device::{DeviceClient, SimulatedDevice},
    record::StdoutSink,
    scheduler::{Lifecycle, Poller, PollingParams},
    status::query_status,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Timeout for the one-shot status query when the config sets none.
const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// rpmon - Remote Power Monitor
#[derive(Parser, Debug)]
#[command(name = "rpmon", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/rpmon.yaml",
        env = "RPMON_CONFIG"
    )]
    config: String,

    /// Device address as host:port
    target: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample the device every INTERVAL and write one record per interval
    Poll {
        /// Sampling interval: seconds ("1", "2.5") or a duration ("1m")
        interval: String,
    },
    /// Query the device once and print its status
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing; stdout is reserved for records.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rpmon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config);
    let config = AppConfig::load(&cli.config)?;
    let target = Target::parse(&cli.target)?;

    match config.device.driver {
        DeviceDriver::Simulated => {
            let device = config
                .points
                .static_points
                .iter()
                .fold(SimulatedDevice::new(), |device, point| {
                    device.with_value(&point.id, format!("simulated {}", point.label))
                });
            run(device, &target, &config, cli.command).await
        }
    }
}

/// Connect `device` and run the selected command against it.
async fn run<D: DeviceClient>(
    mut device: D,
    target: &Target,
    config: &AppConfig,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    // Validate the interval before touching the network.
    let params = match &command {
        Command::Poll { interval } => {
            let interval = parse_sample_interval(
                interval,
                config.polling.min_interval,
                config.polling.max_interval,
            )?;
            Some(PollingParams::from_config(interval, config)?)
        }
        Command::Status { .. } => None,
    };

    tracing::info!(host = %target, driver = %config.device.driver, "Connecting to device");
    if let Err(e) = device.connect(target, config.device.mode).await {
        tracing::error!(host = %target, error = %e, "Could not connect to device");
        return Err(e.into());
    }
    let device = Arc::new(device);

    let json = matches!(command, Command::Status { json: true });
    let result = match params {
        Some(params) => poll(Arc::clone(&device), config, params).await,
        None => status(device.as_ref(), target, config, json).await,
    };

    device.close().await;
    result
}

async fn poll<D: DeviceClient>(
    device: Arc<D>,
    config: &AppConfig,
    params: PollingParams,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Polling interval: {:.0} sec(s), {} points",
        params.sample_interval().as_secs_f64(),
        config.points.data_points.len()
    );

    let lifecycle = Lifecycle::new();
    if let Err(e) = Poller::new(device, config, params, Box::new(StdoutSink)).start(&lifecycle) {
        tracing::error!(error = %e, "Could not start polling loops");
        lifecycle.shutdown().await?;
        return Err(e.into());
    }

    shutdown_signal().await;

    tracing::info!("Shutting down polling loops...");
    if let Err(e) = lifecycle.shutdown().await {
        tracing::error!("Failed to shutdown polling loops: {}", e);
    }

    tracing::info!("Poll exiting");
    Ok(())
}

async fn status<D: DeviceClient>(
    device: &D,
    target: &Target,
    config: &AppConfig,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let timeout = config.device.timeout.unwrap_or(DEFAULT_STATUS_TIMEOUT);
    let report = match query_status(device, target, &config.points, timeout).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(host = %target, error = %e, "Error querying device");
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        print!("{}", report.render_text());
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
