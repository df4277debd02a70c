//! Shared data structures for pump telemetry and alerting
//!
//! - `telemetry`: signals, ground-truth labels, and the per-tick sample
//! - `alert`: detector output
//! - `thresholds`: static and trend limit tables

mod alert;
mod telemetry;
pub mod thresholds;

pub use alert::{AlertDetail, AlertEvent, DetectionMethod, Evidence, Severity};
pub use telemetry::{FaultKind, Signal, SignalSet, Telemetry, TelemetryTruth};
pub use thresholds::{
    default_slope_rules, default_threshold_rules, pump_thresholds, Side, SlopeRule, ThresholdRule,
    ValveFlowRule,
};
