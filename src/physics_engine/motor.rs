//! Three-phase induction motor current draw

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MotorParams {
    /// Line-to-line voltage (V)
    pub rated_voltage_v: f64,
    pub motor_efficiency: f64,
    pub power_factor: f64,
    pub no_load_current_a: f64,
}

impl Default for MotorParams {
    fn default() -> Self {
        Self {
            rated_voltage_v: 400.0,
            motor_efficiency: 0.92,
            power_factor: 0.85,
            no_load_current_a: 5.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MotorModel {
    params: MotorParams,
}

impl MotorModel {
    pub const fn new(params: MotorParams) -> Self {
        Self { params }
    }

    pub const fn params(&self) -> &MotorParams {
        &self.params
    }

    /// Phase current (A) for a shaft load: `I0 + (P/η)·1000/(√3·U·cosφ)`
    pub fn current(&self, shaft_power_kw: f64) -> f64 {
        let p = &self.params;
        if shaft_power_kw <= 0.0 {
            return p.no_load_current_a;
        }
        let denom = 3f64.sqrt() * p.rated_voltage_v * p.power_factor;
        if denom <= 0.0 || p.motor_efficiency <= 0.0 {
            return p.no_load_current_a;
        }
        let electrical_w = shaft_power_kw / p.motor_efficiency * 1000.0;
        (p.no_load_current_a + electrical_w / denom).max(p.no_load_current_a)
    }
}
