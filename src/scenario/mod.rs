//! Scenario definitions: JSON loading and validation
//!
//! A scenario describes one asset run: duration, optional seed, initial
//! speed/valve, a fault schedule, and an operator setpoint schedule.
//! Loading is all-or-nothing: every problem is collected and the scenario is
//! rejected before any simulation state exists.

pub mod executor;

pub use executor::{ExecutorStatus, ScenarioExecutor};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::faults::{Fault, FaultParams};
use crate::types::FaultKind;

/// Initial shaft speed when the scenario omits it (rpm)
pub const DEFAULT_INITIAL_RPM: f64 = 2950.0;

/// Initial valve opening when the scenario omits it (%)
pub const DEFAULT_INITIAL_VALVE_PCT: f64 = 60.0;

/// Scenario format version assumed when absent
pub const DEFAULT_SCENARIO_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse scenario JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid scenario: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Validated Scenario
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct InitialConditions {
    pub rpm: f64,
    pub valve_open_pct: f64,
}

impl Default for InitialConditions {
    fn default() -> Self {
        Self {
            rpm: DEFAULT_INITIAL_RPM,
            valve_open_pct: DEFAULT_INITIAL_VALVE_PCT,
        }
    }
}

/// One scheduled fault
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaultSpec {
    #[serde(rename = "type")]
    pub fault_type: String,
    pub start_time_sec: f64,
    #[serde(default)]
    pub params: FaultParams,
}

/// One scheduled operator change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Setpoint {
    pub time_sec: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valve_open_pct: Option<f64>,
}

/// A validated, immutable scenario
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub version: String,
    pub duration_sec: f64,
    pub seed: Option<u64>,
    pub initial_conditions: InitialConditions,
    pub faults: Vec<FaultSpec>,
    /// Sorted by `time_sec`
    pub setpoints: Vec<Setpoint>,
}

// ============================================================================
// Raw (unvalidated) Form
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct RawInitialConditions {
    rpm: Option<f64>,
    valve_open_pct: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawFault {
    #[serde(rename = "type")]
    fault_type: Option<String>,
    start_time_sec: Option<f64>,
    params: Option<FaultParams>,
}

#[derive(Debug, Deserialize)]
struct RawSetpoint {
    time_sec: Option<f64>,
    rpm: Option<f64>,
    valve_open_pct: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawScenario {
    name: Option<String>,
    version: Option<String>,
    duration_sec: Option<f64>,
    seed: Option<u64>,
    initial_conditions: Option<RawInitialConditions>,
    faults: Option<Vec<RawFault>>,
    setpoints: Option<Vec<RawSetpoint>>,
}

impl RawScenario {
    fn validate(self) -> Result<Scenario, ScenarioError> {
        let mut errors = Vec::new();

        if self.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
            errors.push("missing required field: name".to_string());
        }
        match self.duration_sec {
            None => errors.push("missing required field: duration_sec".to_string()),
            Some(d) if !d.is_finite() || d <= 0.0 => {
                errors.push(format!("duration_sec must be positive, got {d}"));
            }
            Some(_) => {}
        }

        let ic = self.initial_conditions.unwrap_or_default();
        let initial_conditions = InitialConditions {
            rpm: ic.rpm.unwrap_or(DEFAULT_INITIAL_RPM),
            valve_open_pct: ic.valve_open_pct.unwrap_or(DEFAULT_INITIAL_VALVE_PCT),
        };

        let mut faults = Vec::new();
        for (i, raw) in self.faults.unwrap_or_default().into_iter().enumerate() {
            let Some(fault_type) = raw.fault_type else {
                errors.push(format!("faults[{i}]: missing 'type'"));
                continue;
            };
            let Some(start_time_sec) = raw.start_time_sec else {
                errors.push(format!("faults[{i}] ({fault_type}): missing 'start_time_sec'"));
                continue;
            };
            let params = raw.params.unwrap_or_default();
            match FaultKind::injectable(&fault_type) {
                None => errors.push(format!("faults[{i}]: unknown fault type '{fault_type}'")),
                Some(kind) => {
                    if let Err(e) = Fault::from_params(kind, &params, 0) {
                        errors.push(format!("faults[{i}]: {e}"));
                    }
                }
            }
            faults.push(FaultSpec {
                fault_type,
                start_time_sec,
                params,
            });
        }

        let mut setpoints = Vec::new();
        for (i, raw) in self.setpoints.unwrap_or_default().into_iter().enumerate() {
            let Some(time_sec) = raw.time_sec else {
                errors.push(format!("setpoints[{i}]: missing 'time_sec'"));
                continue;
            };
            setpoints.push(Setpoint {
                time_sec,
                rpm: raw.rpm,
                valve_open_pct: raw.valve_open_pct,
            });
        }
        setpoints.sort_by(|a, b| a.time_sec.total_cmp(&b.time_sec));

        if !errors.is_empty() {
            return Err(ScenarioError::Validation(errors));
        }

        Ok(Scenario {
            name: self.name.unwrap_or_default(),
            version: self
                .version
                .unwrap_or_else(|| DEFAULT_SCENARIO_VERSION.to_string()),
            duration_sec: self.duration_sec.unwrap_or_default(),
            seed: self.seed,
            initial_conditions,
            faults,
            setpoints,
        })
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Scenario {
    pub fn from_json_str(json: &str) -> Result<Self, ScenarioError> {
        let raw: RawScenario = serde_json::from_str(json)?;
        raw.validate()
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, ScenarioError> {
        let raw: RawScenario = serde_json::from_value(value)?;
        raw.validate()
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ScenarioError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ScenarioError::Io(path.to_path_buf(), e))?;
        Self::from_json_str(&content)
    }

    /// Fault type the scenario is built around, if any (first scheduled fault)
    pub fn expected_fault(&self) -> FaultKind {
        self.faults
            .first()
            .and_then(|f| FaultKind::injectable(&f.fault_type))
            .unwrap_or(FaultKind::None)
    }
}
