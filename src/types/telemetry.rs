//! Telemetry samples produced by the simulator and consumed by the monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Signals
// ============================================================================

/// One of the eight sensor channels reported by a pump asset
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Discharge pressure (bar)
    PressureBar,
    /// Volumetric flow (m³/h)
    FlowM3h,
    /// Fluid temperature (°C)
    TempC,
    /// Bearing housing temperature (°C)
    BearingTempC,
    /// Vibration velocity RMS (mm/s)
    VibrationRms,
    /// Shaft speed (rpm)
    Rpm,
    /// Motor phase current (A)
    MotorCurrentA,
    /// Reported valve opening (%)
    ValveOpenPct,
}

impl Signal {
    /// Every signal, in telemetry field order
    pub const ALL: [Self; 8] = [
        Self::PressureBar,
        Self::FlowM3h,
        Self::TempC,
        Self::BearingTempC,
        Self::VibrationRms,
        Self::Rpm,
        Self::MotorCurrentA,
        Self::ValveOpenPct,
    ];

    /// Wire name of the signal
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PressureBar => "pressure_bar",
            Self::FlowM3h => "flow_m3h",
            Self::TempC => "temp_c",
            Self::BearingTempC => "bearing_temp_c",
            Self::VibrationRms => "vibration_rms",
            Self::Rpm => "rpm",
            Self::MotorCurrentA => "motor_current_a",
            Self::ValveOpenPct => "valve_open_pct",
        }
    }

    /// Parse a wire name (for config tables and fault params)
    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sig| sig.as_str() == s)
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of all eight signals at one instant
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SignalSet {
    pub pressure_bar: f64,
    pub flow_m3h: f64,
    pub temp_c: f64,
    pub bearing_temp_c: f64,
    pub vibration_rms: f64,
    pub rpm: f64,
    pub motor_current_a: f64,
    pub valve_open_pct: f64,
}

impl SignalSet {
    pub const fn get(&self, signal: Signal) -> f64 {
        match signal {
            Signal::PressureBar => self.pressure_bar,
            Signal::FlowM3h => self.flow_m3h,
            Signal::TempC => self.temp_c,
            Signal::BearingTempC => self.bearing_temp_c,
            Signal::VibrationRms => self.vibration_rms,
            Signal::Rpm => self.rpm,
            Signal::MotorCurrentA => self.motor_current_a,
            Signal::ValveOpenPct => self.valve_open_pct,
        }
    }

    pub fn set(&mut self, signal: Signal, value: f64) {
        let slot = match signal {
            Signal::PressureBar => &mut self.pressure_bar,
            Signal::FlowM3h => &mut self.flow_m3h,
            Signal::TempC => &mut self.temp_c,
            Signal::BearingTempC => &mut self.bearing_temp_c,
            Signal::VibrationRms => &mut self.vibration_rms,
            Signal::Rpm => &mut self.rpm,
            Signal::MotorCurrentA => &mut self.motor_current_a,
            Signal::ValveOpenPct => &mut self.valve_open_pct,
        };
        *slot = value;
    }

    /// Finite value of a signal, `None` if the reading is NaN or infinite
    pub fn reading(&self, signal: Signal) -> Option<f64> {
        let v = self.get(signal);
        v.is_finite().then_some(v)
    }
}

// ============================================================================
// Ground Truth
// ============================================================================

/// Injected fault label carried alongside each sample
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    #[default]
    None,
    BearingWear,
    Clogging,
    ValveStuck,
    SensorDrift,
    SensorStuck,
    NoiseBurst,
    Unknown,
}

impl FaultKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BearingWear => "bearing_wear",
            Self::Clogging => "clogging",
            Self::ValveStuck => "valve_stuck",
            Self::SensorDrift => "sensor_drift",
            Self::SensorStuck => "sensor_stuck",
            Self::NoiseBurst => "noise_burst",
            Self::Unknown => "unknown",
        }
    }

    /// Parse an injectable fault type. `none` and `unknown` are labels only.
    pub fn injectable(s: &str) -> Option<Self> {
        match s {
            "bearing_wear" => Some(Self::BearingWear),
            "clogging" => Some(Self::Clogging),
            "valve_stuck" => Some(Self::ValveStuck),
            "sensor_drift" => Some(Self::SensorDrift),
            "sensor_stuck" => Some(Self::SensorStuck),
            "noise_burst" => Some(Self::NoiseBurst),
            _ => None,
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TelemetryTruth {
    pub fault: FaultKind,
    /// 0.0 = healthy, 1.0 = fully developed
    pub severity: f64,
}

// ============================================================================
// Telemetry
// ============================================================================

/// One simulator tick for one asset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Telemetry {
    pub ts: DateTime<Utc>,
    pub plant_id: String,
    pub asset_id: String,
    pub signals: SignalSet,
    #[serde(default)]
    pub truth: TelemetryTruth,
}
