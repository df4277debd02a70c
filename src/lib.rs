//! PumpGuard: Centrifugal Pump Simulation and Anomaly Detection
//!
//! Physics-based pump plant simulator with scheduled fault injection, feeding
//! a rule-based threshold/trend detector over a per-asset sliding window.
//!
//! ## Architecture
//!
//! - **Physics Engine**: Pump curve, system curve, bearing and motor models
//! - **Faults**: Degradation and sensor faults applied on each tick
//! - **Scenario**: JSON scenario loading and the discrete-time executor
//! - **Telemetry Buffer**: Time-windowed per-asset history with statistics
//! - **Detector**: Static limits, trend slopes, and valve/flow mismatch
//! - **Pipeline**: Simulation registry, monitor loop, sources and sinks
//! - **Evaluation**: Detection latency and false-alarm scorecard

pub mod config;
pub mod detector;
pub mod evaluation;
pub mod faults;
pub mod physics_engine;
pub mod pipeline;
pub mod scenario;
pub mod telemetry_buffer;
pub mod types;

// Re-export plant configuration
pub use config::PlantConfig;

// Re-export commonly used types
pub use types::{
    AlertDetail, AlertEvent, DetectionMethod, FaultKind, Severity, Signal, SignalSet, Telemetry,
    TelemetryTruth,
};

pub use detector::ThresholdDetector;
pub use evaluation::{DetectionScorecard, EvaluationSummary, ScorecardReport};
pub use faults::{FaultError, FaultInjector};
pub use physics_engine::PlantModels;
pub use pipeline::{MonitorLoop, MonitorStats, SimulationRegistry};
pub use scenario::{Scenario, ScenarioError, ScenarioExecutor};
pub use telemetry_buffer::{SharedTelemetryBuffer, TelemetryBuffer};
