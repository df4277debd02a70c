//! Pump alarm limits, trend limits, and the rule shapes the detector evaluates

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Signal;

/// Default limits for centrifugal pump monitoring
pub mod pump_thresholds {
    // === Vibration (ISO 20816 zone boundaries, mm/s RMS) ===
    /// Zone A/B boundary
    pub const VIBRATION_GOOD: f64 = 2.8;
    /// Zone B/C boundary, warning
    pub const VIBRATION_WARNING: f64 = 7.1;
    /// Zone C/D boundary, critical
    pub const VIBRATION_CRITICAL: f64 = 18.0;

    // === Temperatures (°C) ===
    pub const BEARING_TEMP_WARNING: f64 = 70.0;
    pub const BEARING_TEMP_CRITICAL: f64 = 85.0;
    pub const FLUID_TEMP_WARNING: f64 = 80.0;
    pub const FLUID_TEMP_CRITICAL: f64 = 95.0;

    // === Hydraulics ===
    /// Discharge pressure warning (bar)
    pub const PRESSURE_WARNING: f64 = 18.0;
    /// Discharge pressure critical (bar)
    pub const PRESSURE_CRITICAL: f64 = 25.0;
    /// Low-flow warning (m³/h)
    pub const FLOW_LOW_WARNING: f64 = 80.0;
    /// Low-flow critical (m³/h)
    pub const FLOW_LOW_CRITICAL: f64 = 50.0;

    // === Electrical ===
    pub const MOTOR_CURRENT_WARNING: f64 = 38.0;
    pub const MOTOR_CURRENT_CRITICAL: f64 = 45.0;

    // === Speed band (rpm) ===
    pub const RPM_MIN: f64 = 1400.0;
    pub const RPM_MAX: f64 = 1600.0;

    // === Valve/flow mismatch ===
    /// Valve at least this open (%)...
    pub const MISMATCH_VALVE_MIN_PCT: f64 = 80.0;
    /// ...while flow is at most this (m³/h)
    pub const MISMATCH_FLOW_MAX_M3H: f64 = 50.0;
    /// Sustained for at least this long (s)
    pub const MISMATCH_MIN_DURATION_SEC: f64 = 20.0;
    /// Look-back window for the mismatch duration (s)
    pub const MISMATCH_WINDOW_SEC: u64 = 60;

    // === Duration gating ===
    /// Flow must stay beyond its limit this long before alerting (s)
    pub const FLOW_MIN_DURATION_SEC: f64 = 15.0;
    /// Speed must stay outside its band this long before alerting (s)
    pub const RPM_MIN_DURATION_SEC: f64 = 10.0;
}

// ============================================================================
// Threshold Rules
// ============================================================================

/// Which direction of deviation a rule watches
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[default]
    High,
    Low,
}

impl Side {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }

    /// Whether `value` is at or beyond `threshold` on this side
    pub fn breached(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::High => value >= threshold,
            Self::Low => value <= threshold,
        }
    }
}

/// Static limit table entry for one signal.
///
/// Four shapes may coexist on one entry:
/// - high: `warning` / `critical`
/// - high (alternate keys): `warning_high` / `critical_high`
/// - low: `warning_low` / `critical_low`
/// - range: `min` / `max`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThresholdRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ThresholdRule {
    pub const fn high(warning: f64, critical: f64) -> Self {
        Self {
            warning: Some(warning),
            critical: Some(critical),
            warning_high: None,
            critical_high: None,
            warning_low: None,
            critical_low: None,
            min: None,
            max: None,
        }
    }

    pub const fn high_alt(warning: f64, critical: f64) -> Self {
        Self {
            warning: None,
            critical: None,
            warning_high: Some(warning),
            critical_high: Some(critical),
            warning_low: None,
            critical_low: None,
            min: None,
            max: None,
        }
    }

    pub const fn low(warning: f64, critical: f64) -> Self {
        Self {
            warning: None,
            critical: None,
            warning_high: None,
            critical_high: None,
            warning_low: Some(warning),
            critical_low: Some(critical),
            min: None,
            max: None,
        }
    }

    pub const fn range(min: f64, max: f64) -> Self {
        Self {
            warning: None,
            critical: None,
            warning_high: None,
            critical_high: None,
            warning_low: None,
            critical_low: None,
            min: Some(min),
            max: Some(max),
        }
    }

    /// Overlay `other` on top of `self`; fields set in `other` win
    #[must_use]
    pub fn overlay(self, other: &Self) -> Self {
        Self {
            warning: other.warning.or(self.warning),
            critical: other.critical.or(self.critical),
            warning_high: other.warning_high.or(self.warning_high),
            critical_high: other.critical_high.or(self.critical_high),
            warning_low: other.warning_low.or(self.warning_low),
            critical_low: other.critical_low.or(self.critical_low),
            min: other.min.or(self.min),
            max: other.max.or(self.max),
        }
    }

    /// Side used for duration gating: low if any low-side key is present
    pub const fn gating_side(&self) -> Side {
        if self.critical_low.is_some() || self.warning_low.is_some() {
            Side::Low
        } else {
            Side::High
        }
    }

    /// First critical limit present, in `critical`, `critical_high`, `critical_low` order
    pub fn gating_critical(&self) -> Option<f64> {
        self.critical.or(self.critical_high).or(self.critical_low)
    }

    /// First warning limit present, in `warning`, `warning_high`, `warning_low` order
    pub fn gating_warning(&self) -> Option<f64> {
        self.warning.or(self.warning_high).or(self.warning_low)
    }
}

/// Default static limits per signal
pub fn default_threshold_rules() -> BTreeMap<Signal, ThresholdRule> {
    use pump_thresholds::*;
    BTreeMap::from([
        (Signal::VibrationRms, ThresholdRule::high(VIBRATION_WARNING, VIBRATION_CRITICAL)),
        (Signal::BearingTempC, ThresholdRule::high(BEARING_TEMP_WARNING, BEARING_TEMP_CRITICAL)),
        (Signal::PressureBar, ThresholdRule::high_alt(PRESSURE_WARNING, PRESSURE_CRITICAL)),
        (
            Signal::MotorCurrentA,
            ThresholdRule::high_alt(MOTOR_CURRENT_WARNING, MOTOR_CURRENT_CRITICAL),
        ),
        (Signal::TempC, ThresholdRule::high_alt(FLUID_TEMP_WARNING, FLUID_TEMP_CRITICAL)),
        (Signal::FlowM3h, ThresholdRule::low(FLOW_LOW_WARNING, FLOW_LOW_CRITICAL)),
        (Signal::Rpm, ThresholdRule::range(RPM_MIN, RPM_MAX)),
    ])
}

// ============================================================================
// Slope Rules
// ============================================================================

/// Rate-of-change limit for one signal (units per second)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SlopeRule {
    pub side: Side,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical: Option<f64>,
    /// Own look-back window; falls back to the detector window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_sec: Option<u64>,
}

impl SlopeRule {
    pub const fn new(side: Side, warning: f64, critical: f64, window_sec: Option<u64>) -> Self {
        Self {
            side,
            warning: Some(warning),
            critical: Some(critical),
            window_sec,
        }
    }
}

/// Default trend limits per signal
pub fn default_slope_rules() -> BTreeMap<Signal, SlopeRule> {
    BTreeMap::from([
        (Signal::VibrationRms, SlopeRule::new(Side::High, 0.03, 0.08, None)),
        (Signal::BearingTempC, SlopeRule::new(Side::High, 0.1, 0.3, None)),
        (Signal::FlowM3h, SlopeRule::new(Side::Low, -2.0, -5.0, Some(10))),
        (Signal::PressureBar, SlopeRule::new(Side::High, 0.5, 1.0, Some(10))),
        (Signal::MotorCurrentA, SlopeRule::new(Side::High, 0.3, 0.8, Some(5))),
    ])
}

// ============================================================================
// Combination Rule
// ============================================================================

/// Valve wide open while flow collapses (blockage or dead-heading)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValveFlowRule {
    pub valve_min_pct: f64,
    pub flow_max_m3h: f64,
    pub min_duration_sec: f64,
    pub window_sec: u64,
}

impl Default for ValveFlowRule {
    fn default() -> Self {
        use pump_thresholds::*;
        Self {
            valve_min_pct: MISMATCH_VALVE_MIN_PCT,
            flow_max_m3h: MISMATCH_FLOW_MAX_M3H,
            min_duration_sec: MISMATCH_MIN_DURATION_SEC,
            window_sec: MISMATCH_WINDOW_SEC,
        }
    }
}
