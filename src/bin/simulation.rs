//! Pump Scenario Simulation
//!
//! Runs one scenario file through the scenario executor and writes the
//! telemetry stream to stdout, one sample per line. Mission log lines go to
//! stderr so the output can be piped straight into the monitor.
//!
//! # Usage
//! ```bash
//! pump-sim scenarios/bearing_wear.json --speed 0 | pumpguard --stdin
//! pump-sim scenarios/clogging_ramp.json --speed 0 --format csv > clogging.csv
//! pump-sim scenarios/valve_stuck.json --speed 0 --detect --quiet > /dev/null
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::{Parser, ValueEnum};

use pumpguard::config::PlantConfig;
use pumpguard::detector::ThresholdDetector;
use pumpguard::evaluation::DetectionScorecard;
use pumpguard::scenario::{Scenario, ScenarioExecutor};
use pumpguard::telemetry_buffer::TelemetryBuffer;
use pumpguard::types::{Severity, Telemetry};

const CSV_HEADER: &str = "ts,plant_id,asset_id,pressure_bar,flow_m3h,temp_c,bearing_temp_c,\
vibration_rms,rpm,motor_current_a,valve_open_pct,fault,fault_severity";

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "pump-sim")]
#[command(about = "Centrifugal pump scenario simulation")]
#[command(version)]
struct Args {
    /// Scenario JSON file
    scenario: PathBuf,

    /// Plant configuration file (default: PUMPGUARD_CONFIG, ./pumpguard.toml, built-ins)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the scenario's random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Time compression factor (1 = real time, 0 = as fast as possible)
    #[arg(short, long, default_value = "0")]
    speed: f64,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Run the detector inline and print a detection scorecard to stderr
    #[arg(long)]
    detect: bool,

    /// Suppress the mission log (only output telemetry)
    #[arg(short, long)]
    quiet: bool,

    #[arg(long)]
    plant_id: Option<String>,

    #[arg(long)]
    asset_id: Option<String>,
}

// ============================================================================
// Output Helpers
// ============================================================================

fn format_time(seconds: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

fn log_mission(time: f64, message: &str, quiet: bool) {
    if !quiet {
        eprintln!("[{}] {}", format_time(time), message);
    }
}

fn write_csv(out: &mut impl Write, t: &Telemetry) -> io::Result<()> {
    let s = &t.signals;
    writeln!(
        out,
        "{},{},{},{:.3},{:.3},{:.3},{:.3},{:.3},{:.1},{:.3},{:.2},{},{:.3}",
        t.ts.to_rfc3339_opts(SecondsFormat::Millis, true),
        t.plant_id,
        t.asset_id,
        s.pressure_bar,
        s.flow_m3h,
        s.temp_c,
        s.bearing_temp_c,
        s.vibration_rms,
        s.rpm,
        s.motor_current_a,
        s.valve_open_pct,
        t.truth.fault,
        t.truth.severity,
    )
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    // Library logs (config loading, fault activation) stay quiet unless asked for
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let plant_config = match &args.config {
        Some(path) => PlantConfig::load_from_file(path)?,
        None => PlantConfig::load(),
    };
    let mut scenario = Scenario::load_from_file(&args.scenario)
        .with_context(|| format!("Failed to load scenario {}", args.scenario.display()))?;
    if args.seed.is_some() {
        scenario.seed = args.seed;
    }

    let plant_id = args
        .plant_id
        .clone()
        .unwrap_or_else(|| plant_config.plant.plant_id.clone());
    let asset_id = args
        .asset_id
        .clone()
        .unwrap_or_else(|| plant_config.plant.default_asset_id.clone());

    let mut simulator = plant_config.simulator;
    simulator.speed = args.speed.max(0.0);
    let dt = simulator.dt_sec();
    let tick_period = simulator.tick_period();

    // Mission briefing
    log_mission(0.0, &"=".repeat(60), args.quiet);
    log_mission(0.0, &format!("PUMP SIMULATION: {}", scenario.name), args.quiet);
    log_mission(0.0, &"=".repeat(60), args.quiet);
    log_mission(0.0, &format!("  Asset: {plant_id}/{asset_id}"), args.quiet);
    log_mission(0.0, &format!("  Duration: {:.0} s at {} Hz", scenario.duration_sec, simulator.frequency_hz), args.quiet);
    log_mission(
        0.0,
        &format!(
            "  Initial: {:.0} rpm, valve {:.0}%",
            scenario.initial_conditions.rpm, scenario.initial_conditions.valve_open_pct
        ),
        args.quiet,
    );
    if let Some(seed) = scenario.seed {
        log_mission(0.0, &format!("  Random seed: {seed}"), args.quiet);
    }
    for fault in &scenario.faults {
        log_mission(0.0, &format!("  Fault: {} at t={:.0}s", fault.fault_type, fault.start_time_sec), args.quiet);
    }
    for sp in &scenario.setpoints {
        log_mission(0.0, &format!("  Setpoint at t={:.0}s: rpm={:?} valve={:?}", sp.time_sec, sp.rpm, sp.valve_open_pct), args.quiet);
    }
    log_mission(0.0, &"=".repeat(60), args.quiet);

    let mut executor = ScenarioExecutor::new(scenario, plant_config.plant_models())?
        .with_ids(plant_id, asset_id);
    executor.start()?;

    let detector = ThresholdDetector::new(&plant_config.detector);
    let mut buffer = TelemetryBuffer::new(
        plant_config.monitor.window_sec,
        plant_config.monitor.max_points_per_asset,
    );
    let mut scorecard = DetectionScorecard::new();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.format == OutputFormat::Csv {
        writeln!(out, "{CSV_HEADER}")?;
    }

    let start_time = Instant::now();
    let mut last_log_percent = 0u32;
    let mut was_faulted = false;
    let mut critical_seen = false;

    while let Some(telemetry) = executor.step(dt) {
        let loop_start = Instant::now();
        let sim_time = executor.current_time() - dt;

        match args.format {
            OutputFormat::Json => {
                serde_json::to_writer(&mut out, &telemetry)?;
                writeln!(out)?;
            }
            OutputFormat::Csv => write_csv(&mut out, &telemetry)?,
        }

        if !was_faulted && telemetry.truth.severity > 0.0 {
            was_faulted = true;
            log_mission(sim_time, &format!(">>> FAULT ACTIVE: {}", telemetry.truth.fault), args.quiet);
        }

        if args.detect {
            buffer.push(&telemetry);
            let alert = detector.detect(&telemetry, Some(&buffer));
            if let Some(event) = &alert {
                if event.severity == Severity::Critical && !critical_seen {
                    critical_seen = true;
                    let signals: Vec<&str> = event.alerts.iter().map(|a| a.signal.as_str()).collect();
                    log_mission(sim_time, &format!(">>> FIRST CRITICAL ALERT: {}", signals.join(", ")), args.quiet);
                }
            }
            scorecard.observe(&telemetry, alert.as_ref());
        }

        // Progress logging (every 10%)
        let status = executor.get_status();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let current_percent = status.progress_pct as u32 / 10 * 10;
        if current_percent > last_log_percent {
            let s = &telemetry.signals;
            log_mission(
                sim_time,
                &format!(
                    "Progress: {}% | Flow: {:.1} m3/h | P: {:.2} bar | Vib: {:.2} mm/s | Bearing: {:.1} C",
                    current_percent, s.flow_m3h, s.pressure_bar, s.vibration_rms, s.bearing_temp_c
                ),
                args.quiet,
            );
            last_log_percent = current_percent;
        }

        // Sleep for time compression
        if let Some(period) = tick_period {
            out.flush()?;
            let elapsed = loop_start.elapsed();
            if elapsed < period {
                std::thread::sleep(period - elapsed);
            }
        }
    }
    out.flush()?;
    drop(out);

    let total_elapsed = start_time.elapsed();
    log_mission(executor.current_time(), &"=".repeat(60), args.quiet);
    log_mission(executor.current_time(), "SIMULATION COMPLETE", args.quiet);
    log_mission(executor.current_time(), &format!("Real time: {:.1}s", total_elapsed.as_secs_f64()), args.quiet);
    log_mission(executor.current_time(), &"=".repeat(60), args.quiet);

    if args.detect {
        let report = scorecard.report();
        eprintln!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
