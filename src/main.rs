//! PumpGuard - Pump Simulation and Anomaly Monitoring
//!
//! Runs one or more pump scenarios through the simulator and monitors the
//! resulting telemetry with the threshold/trend detector. Alerts are written
//! to stdout as JSON lines; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Simulate and monitor two assets (asset ids from file stems)
//! pumpguard --scenario scenarios/bearing_wear.json --scenario scenarios/clogging_ramp.json
//!
//! # Monitor telemetry produced elsewhere
//! pump-sim scenarios/valve_stuck.json --speed 0 | pumpguard --stdin
//!
//! # Replay a recorded run
//! pumpguard --replay run.jsonl
//! ```
//!
//! # Environment Variables
//!
//! - `PUMPGUARD_CONFIG`: Path to a pumpguard.toml (default: ./pumpguard.toml)
//! - `RUST_LOG`: Logging level (default: info)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pumpguard::config::{self, PlantConfig};
use pumpguard::detector::ThresholdDetector;
use pumpguard::pipeline::{
    ChannelSink, ChannelSource, EventSink, FanoutSink, JsonLinesSink, MonitorLoop, MonitorStats,
    ReplaySource, SimulationRegistry, StdinSource, TelemetrySource,
};
use pumpguard::types::Telemetry;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "pumpguard")]
#[command(about = "Pump plant simulator with rule-based anomaly monitoring")]
#[command(version)]
struct CliArgs {
    /// Plant configuration file (overrides PUMPGUARD_CONFIG and ./pumpguard.toml)
    #[arg(short, long, env = "PUMPGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Scenario JSON file to simulate; repeat for several assets
    #[arg(short, long = "scenario", value_name = "PATH")]
    scenarios: Vec<PathBuf>,

    /// Asset id for a single scenario (default: the file stem)
    #[arg(long)]
    asset_id: Option<String>,

    /// Monitor JSON telemetry lines from stdin instead of simulating
    #[arg(long, conflicts_with_all = ["scenarios", "replay"])]
    stdin: bool,

    /// Monitor a recorded JSONL telemetry file instead of simulating
    #[arg(long, value_name = "PATH", conflicts_with = "scenarios")]
    replay: Option<PathBuf>,

    /// Simulation speed-up (1 = real time, 0 = as fast as possible)
    #[arg(long)]
    speed: Option<f64>,

    /// Also record every simulated sample to this JSONL file
    #[arg(long, value_name = "PATH")]
    echo_telemetry: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

fn init_logging(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(args: &CliArgs) -> Result<PlantConfig> {
    let mut plant_config = match &args.config {
        Some(path) => PlantConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PlantConfig::load(),
    };
    if let Some(speed) = args.speed {
        if speed < 0.0 || !speed.is_finite() {
            bail!("--speed must be a non-negative number, got {speed}");
        }
        plant_config.simulator.speed = speed;
    }
    Ok(plant_config)
}

// ============================================================================
// Simulation Mode
// ============================================================================

fn asset_id_for(path: &Path, args: &CliArgs, fallback: &str) -> String {
    if args.scenarios.len() == 1 {
        if let Some(id) = &args.asset_id {
            return id.clone();
        }
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .map_or_else(|| fallback.to_string(), str::to_string)
}

/// Load and start every scenario, then drive the registry until all workers
/// finish or shutdown is requested. Dropping the registry closes the
/// telemetry channel, which ends the monitor.
async fn spawn_simulation(
    args: &CliArgs,
    plant_config: &PlantConfig,
    telemetry_tx: mpsc::Sender<Telemetry>,
    cancel_token: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
    let channel: Arc<dyn EventSink<Telemetry>> = Arc::new(ChannelSink::new(telemetry_tx));
    let sink: Arc<dyn EventSink<Telemetry>> = match &args.echo_telemetry {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            info!("Recording telemetry to {}", path.display());
            let recorder: Arc<dyn EventSink<Telemetry>> =
                Arc::new(JsonLinesSink::new(file, format!("file:{}", path.display())));
            Arc::new(FanoutSink::new(vec![channel, recorder]))
        }
        None => channel,
    };

    let registry = SimulationRegistry::new(plant_config.clone(), sink);
    for path in &args.scenarios {
        let asset_id = asset_id_for(path, args, &plant_config.plant.default_asset_id);
        registry
            .load_file(&asset_id, path)
            .await
            .with_context(|| format!("Failed to load scenario {}", path.display()))?;
        registry.start(&asset_id).await?;
    }
    for status in registry.list().await {
        info!(
            asset_id = %status.asset_id,
            scenario = %status.scenario_name,
            duration_sec = status.duration_sec,
            "Asset running"
        );
    }

    Ok(tokio::spawn(async move {
        tokio::select! {
            () = cancel_token.cancelled() => registry.shutdown().await,
            () = registry.wait_all() => info!("All scenarios complete"),
        }
    }))
}

async fn run_monitor<S: TelemetrySource>(
    mut source: S,
    cancel_token: CancellationToken,
) -> MonitorStats {
    let monitor_config = config::get().monitor;
    let detector = Arc::new(ThresholdDetector::from_config());
    let mut monitor = MonitorLoop::with_buffer_size(
        monitor_config.window_sec,
        monitor_config.max_points_per_asset,
        detector,
    );
    monitor
        .run(&mut source, &JsonLinesSink::stdout(), cancel_token)
        .await
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_format);

    let plant_config = load_config(&args)?;
    info!(
        plant_id = %plant_config.plant.plant_id,
        frequency_hz = plant_config.simulator.frequency_hz,
        speed = plant_config.simulator.speed,
        window_sec = plant_config.detector.window_sec,
        "PumpGuard starting"
    );
    config::init(plant_config.clone());

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    let stats = if args.stdin {
        info!("Input: stdin (JSON telemetry lines)");
        run_monitor(StdinSource::stdin(), cancel_token).await
    } else if let Some(path) = &args.replay {
        info!("Input: replay of {}", path.display());
        run_monitor(ReplaySource::open(path).await?, cancel_token).await
    } else {
        if args.scenarios.is_empty() {
            bail!("Nothing to do: pass --scenario <PATH>, --stdin or --replay <PATH>");
        }
        if args.asset_id.is_some() && args.scenarios.len() > 1 {
            warn!("--asset-id ignored with several scenarios; using file stems");
        }
        if plant_config.simulator.tick_period().is_none() {
            warn!("Unthrottled simulation; samples are dropped if the monitor falls behind");
        }

        let (tx, rx) = mpsc::channel(plant_config.simulator.telemetry_channel_capacity);
        let driver = spawn_simulation(&args, &plant_config, tx, cancel_token.clone()).await?;
        let stats = run_monitor(ChannelSource::new(rx), cancel_token.clone()).await;

        cancel_token.cancel();
        if let Err(e) = driver.await {
            warn!("Simulation driver failed: {}", e);
        }
        stats
    };

    info!(
        messages = stats.messages_processed,
        alerts = stats.alerts_generated,
        critical = stats.critical_alerts,
        assets = stats.assets_monitored,
        "PumpGuard shutdown complete"
    );
    Ok(())
}
