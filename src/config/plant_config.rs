//! Plant Configuration - physics parameters, runtime knobs and detector tables
//!
//! Every section implements `Default` with the built-in values, so a missing
//! file (or a file that sets a single key) behaves exactly like the defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::physics_engine::{BearingParams, MotorParams, PipeParams, PlantModels, PumpParams};
use crate::telemetry_buffer::{DEFAULT_MAX_POINTS_PER_ASSET, DEFAULT_WINDOW_SEC};
use crate::types::{
    default_slope_rules, default_threshold_rules, pump_thresholds, Side, Signal, SlopeRule,
    ThresholdRule, ValveFlowRule,
};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PUMPGUARD_CONFIG";

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "pumpguard.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a plant deployment.
///
/// Load with `PlantConfig::load()` which searches:
/// 1. `$PUMPGUARD_CONFIG` env var
/// 2. `./pumpguard.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlantConfig {
    /// Plant / asset identification
    pub plant: PlantInfo,
    pub pump: PumpParams,
    pub pipe: PipeParams,
    pub bearing: BearingParams,
    pub motor: MotorParams,
    /// Tick rate and telemetry fan-out
    pub simulator: SimulatorConfig,
    /// Sliding-window buffer sizing
    pub monitor: MonitorConfig,
    /// Rule tables for the threshold/trend detector
    pub detector: DetectorConfig,
}

impl PlantConfig {
    /// Load configuration using the standard search order:
    /// 1. `$PUMPGUARD_CONFIG` environment variable
    /// 2. `./pumpguard.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), plant = %config.plant.plant_id, "Loaded plant config from {CONFIG_ENV_VAR}");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(plant = %config.plant.plant_id, "Loaded plant config from ./{LOCAL_CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys only warn.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in &super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Fresh, undegraded plant models built from the physics sections
    pub fn plant_models(&self) -> PlantModels {
        PlantModels::new(self.pump, self.pipe, self.bearing, self.motor)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Plant config saved");
        Ok(())
    }

    /// Validate physical ranges and rule escalation.
    ///
    /// Rules:
    /// - High-side critical limits must be >= their warning limits
    /// - Low-side critical limits must be <= their warning limits
    /// - Range rules need `min < max`
    /// - Rule tables may only name known signals
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.plant.plant_id.trim().is_empty() {
            errors.push("plant.plant_id must not be empty".to_string());
        }
        if self.plant.default_asset_id.trim().is_empty() {
            errors.push("plant.default_asset_id must not be empty".to_string());
        }

        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        let d = &self.detector;
        for name in d
            .thresholds
            .keys()
            .chain(d.slope_thresholds.keys())
            .chain(d.min_duration_overrides.keys())
        {
            if Signal::from_name(name).is_none() {
                errors.push(format!("detector: unknown signal '{name}'"));
            }
        }

        for (signal, rule) in d.threshold_rules() {
            let name = signal.as_str();
            if let (Some(w), Some(c)) = (rule.warning, rule.critical) {
                Self::check_escalation(w, c, &format!("thresholds.{name}"), &mut errors);
            }
            if let (Some(w), Some(c)) = (rule.warning_high, rule.critical_high) {
                Self::check_escalation(w, c, &format!("thresholds.{name}.high"), &mut errors);
            }
            if let (Some(w), Some(c)) = (rule.warning_low, rule.critical_low) {
                // Lower is worse on the low side
                Self::check_escalation(-w, -c, &format!("thresholds.{name}.low"), &mut errors);
            }
            if let (Some(min), Some(max)) = (rule.min, rule.max) {
                if min.partial_cmp(&max) != Some(std::cmp::Ordering::Less) {
                    errors.push(format!(
                        "thresholds.{name}: min ({min:.3}) must be < max ({max:.3})"
                    ));
                }
            }
        }

        for (signal, rule) in d.slope_rules() {
            let name = format!("slope_thresholds.{}", signal.as_str());
            if let (Some(w), Some(c)) = (rule.warning, rule.critical) {
                match rule.side {
                    Side::High => Self::check_escalation(w, c, &name, &mut errors),
                    Side::Low => Self::check_escalation(-w, -c, &name, &mut errors),
                }
            }
            if rule.window_sec == Some(0) {
                errors.push(format!("{name}.window_sec must be > 0"));
            }
        }

        for (name, secs) in &d.min_duration_overrides {
            if !secs.is_finite() || *secs < 0.0 {
                errors.push(format!(
                    "detector.min_duration_overrides.{name} must be >= 0 (got {secs})"
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_escalation(warning: f64, critical: f64, name: &str, errors: &mut Vec<String>) {
        // NaN comparisons silently pass
        if !warning.is_finite() || !critical.is_finite() {
            errors.push(format!(
                "{name}: values must be finite (got warning={warning}, critical={critical})"
            ));
            return;
        }
        if critical < warning {
            errors.push(format!(
                "{name}: critical ({:.3}) is less severe than warning ({:.3})",
                critical.abs(),
                warning.abs()
            ));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            Self::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            Self::Serialize(e) => write!(f, "Config serialization error: {e}"),
            Self::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Plant Info
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlantInfo {
    pub plant_id: String,
    /// Asset id used when a scenario is loaded without one
    pub default_asset_id: String,
}

impl Default for PlantInfo {
    fn default() -> Self {
        Self {
            plant_id: super::defaults::DEFAULT_PLANT_ID.to_string(),
            default_asset_id: super::defaults::DEFAULT_ASSET_ID.to_string(),
        }
    }
}

// ============================================================================
// Simulator / Monitor
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Ticks per simulated second
    pub frequency_hz: f64,
    /// Wall-clock speed-up; 0 runs as fast as possible
    pub speed: f64,
    /// Bound of the telemetry channel between workers and the monitor
    pub telemetry_channel_capacity: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            frequency_hz: super::defaults::DEFAULT_FREQUENCY_HZ,
            speed: super::defaults::DEFAULT_SPEED,
            telemetry_channel_capacity: super::defaults::TELEMETRY_CHANNEL_CAPACITY,
        }
    }
}

impl SimulatorConfig {
    /// Simulated seconds per tick
    pub fn dt_sec(&self) -> f64 {
        1.0 / self.frequency_hz
    }

    /// Wall-clock period between ticks, `None` when running unthrottled
    pub fn tick_period(&self) -> Option<std::time::Duration> {
        if self.speed <= 0.0 {
            return None;
        }
        std::time::Duration::try_from_secs_f64(self.dt_sec() / self.speed).ok()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    pub window_sec: u64,
    pub max_points_per_asset: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window_sec: DEFAULT_WINDOW_SEC,
            max_points_per_asset: DEFAULT_MAX_POINTS_PER_ASSET,
        }
    }
}

// ============================================================================
// Detector
// ============================================================================

/// Partial slope rule as written in config; unset fields keep the built-in value
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SlopeOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_sec: Option<u64>,
}

impl SlopeOverride {
    #[must_use]
    pub fn apply(&self, base: SlopeRule) -> SlopeRule {
        SlopeRule {
            side: self.side.unwrap_or(base.side),
            warning: self.warning.or(base.warning),
            critical: self.critical.or(base.critical),
            window_sec: self.window_sec.or(base.window_sec),
        }
    }
}

/// Detector tuning. Table keys are signal wire names (`flow_m3h`, `rpm`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    /// Window for threshold evidence and duration gating (s)
    pub window_sec: u64,
    /// Duration gate for signals without a per-signal value (s); 0 disables
    pub min_duration_sec: f64,
    /// Per-signal duration gates (s), on top of the built-in flow/rpm gates
    pub min_duration_overrides: BTreeMap<String, f64>,
    /// Field-by-field overrides of the static limit table
    pub thresholds: BTreeMap<String, ThresholdRule>,
    /// Field-by-field overrides of the trend table
    pub slope_thresholds: BTreeMap<String, SlopeOverride>,
    pub valve_flow: ValveFlowRule,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_sec: super::defaults::DETECTOR_WINDOW_SEC,
            min_duration_sec: 0.0,
            min_duration_overrides: BTreeMap::new(),
            thresholds: BTreeMap::new(),
            slope_thresholds: BTreeMap::new(),
            valve_flow: ValveFlowRule::default(),
        }
    }
}

impl DetectorConfig {
    /// Default limit table with the configured overrides laid on top.
    /// Entries naming unknown signals are skipped with a warning.
    pub fn threshold_rules(&self) -> BTreeMap<Signal, ThresholdRule> {
        let mut rules = default_threshold_rules();
        for (name, over) in &self.thresholds {
            let Some(signal) = Signal::from_name(name) else {
                warn!(signal = %name, "Ignoring threshold override for unknown signal");
                continue;
            };
            let base = rules.get(&signal).copied().unwrap_or_default();
            rules.insert(signal, base.overlay(over));
        }
        rules
    }

    /// Default trend table with the configured overrides laid on top
    pub fn slope_rules(&self) -> BTreeMap<Signal, SlopeRule> {
        let mut rules = default_slope_rules();
        for (name, over) in &self.slope_thresholds {
            let Some(signal) = Signal::from_name(name) else {
                warn!(signal = %name, "Ignoring slope override for unknown signal");
                continue;
            };
            let base = rules.get(&signal).copied().unwrap_or_default();
            rules.insert(signal, over.apply(base));
        }
        rules
    }

    /// Duration gate for one signal: configured override, then the built-in
    /// flow/rpm gates, then the global `min_duration_sec`
    pub fn min_duration_for(&self, signal: Signal) -> f64 {
        if let Some(secs) = self.min_duration_overrides.get(signal.as_str()) {
            return *secs;
        }
        match signal {
            Signal::FlowM3h => pump_thresholds::FLOW_MIN_DURATION_SEC,
            Signal::Rpm => pump_thresholds::RPM_MIN_DURATION_SEC,
            _ => self.min_duration_sec,
        }
    }
}
