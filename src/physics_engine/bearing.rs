//! Rolling-element bearing wear: vibration and temperature response

use serde::{Deserialize, Serialize};

use crate::types::pump_thresholds;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BearingParams {
    /// Healthy vibration RMS at nominal load (mm/s)
    pub base_vibration_mm_s: f64,
    pub base_bearing_temp_c: f64,
    pub ambient_temp_c: f64,
}

impl Default for BearingParams {
    fn default() -> Self {
        Self {
            base_vibration_mm_s: 2.0,
            base_bearing_temp_c: 45.0,
            ambient_temp_c: 25.0,
        }
    }
}

/// ISO 20816 vibration severity zone
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum VibrationGrade {
    /// Newly commissioned
    A,
    /// Unrestricted long-term operation
    B,
    /// Restricted operation
    C,
    /// Damage likely
    D,
}

impl VibrationGrade {
    pub fn from_rms(vibration_rms: f64) -> Self {
        use pump_thresholds::{VIBRATION_CRITICAL, VIBRATION_GOOD, VIBRATION_WARNING};
        if vibration_rms < VIBRATION_GOOD {
            Self::A
        } else if vibration_rms < VIBRATION_WARNING {
            Self::B
        } else if vibration_rms < VIBRATION_CRITICAL {
            Self::C
        } else {
            Self::D
        }
    }
}

impl std::fmt::Display for VibrationGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct BearingModel {
    params: BearingParams,
    /// 0.0 = healthy, 1.0 = failed
    wear_level: f64,
}

impl BearingModel {
    pub const fn new(params: BearingParams) -> Self {
        Self {
            params,
            wear_level: 0.0,
        }
    }

    pub const fn wear_level(&self) -> f64 {
        self.wear_level
    }

    /// Advance wear linearly, capped at 1.0
    pub fn update_wear(&mut self, rate_per_sec: f64, dt: f64) {
        self.wear_level = (self.wear_level + rate_per_sec * dt).clamp(0.0, 1.0);
    }

    pub fn reset_wear(&mut self) {
        self.wear_level = 0.0;
    }

    /// Vibration RMS (mm/s): `base·(1 + 2d + 5d³)·(1 + 0.2(load − 1))`, floored at 0.1
    pub fn vibration(&self, load_factor: f64) -> f64 {
        let d = self.wear_level;
        let wear_effect = 1.0 + 2.0 * d + 5.0 * d.powi(3);
        let load_effect = 1.0 + 0.2 * (load_factor - 1.0);
        (self.params.base_vibration_mm_s * wear_effect * load_effect).max(0.1)
    }

    /// Bearing temperature (°C) from a thermal balance.
    ///
    /// Heat generation grows with load and friction `(1 + 3d)`; degraded
    /// lubrication changes the effective thermal resistance `0.5/(1 + 0.5d)`.
    pub fn temperature(&self, load_factor: f64) -> f64 {
        let d = self.wear_level;
        let ambient = self.params.ambient_temp_c;
        let heat_generation = load_factor * (1.0 + 3.0 * d);
        let thermal_resistance = 0.5 / (1.0 + 0.5 * d);
        let rise = heat_generation * thermal_resistance * 20.0;
        let base_rise = self.params.base_bearing_temp_c - ambient;
        (ambient + base_rise + rise).max(ambient)
    }
}
