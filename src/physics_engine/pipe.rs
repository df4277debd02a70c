//! Pipe system curve (Darcy-Weisbach with a fixed friction factor)

use serde::{Deserialize, Serialize};

use super::GRAVITY;

/// Turbulent-flow friction factor assumed for the whole line
const FRICTION_FACTOR: f64 = 0.02;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipeParams {
    pub pipe_length_m: f64,
    pub pipe_diameter_m: f64,
    /// Wall roughness (mm). Informational; the friction factor is fixed.
    pub pipe_roughness_mm: f64,
    /// Sum of fitting K values
    pub fitting_loss_coefficient: f64,
    /// Elevation difference (m)
    pub static_head_m: f64,
}

impl Default for PipeParams {
    fn default() -> Self {
        Self {
            pipe_length_m: 100.0,
            pipe_diameter_m: 0.2,
            pipe_roughness_mm: 0.1,
            fitting_loss_coefficient: 2.5,
            static_head_m: 10.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipeSystem {
    params: PipeParams,
    base_resistance: f64,
    clogging_factor: f64,
}

impl PipeSystem {
    pub fn new(params: PipeParams) -> Self {
        Self {
            base_resistance: base_resistance(&params),
            params,
            clogging_factor: 1.0,
        }
    }

    pub const fn params(&self) -> &PipeParams {
        &self.params
    }

    /// Clean-pipe resistance coefficient (s²/m⁵)
    pub const fn base_resistance(&self) -> f64 {
        self.base_resistance
    }

    /// Current resistance coefficient including clogging (s²/m⁵)
    pub fn resistance(&self) -> f64 {
        self.base_resistance * self.clogging_factor
    }

    pub const fn clogging_factor(&self) -> f64 {
        self.clogging_factor
    }

    /// Required head (m) to push `flow_m3h` through the system
    pub fn system_head(&self, flow_m3h: f64) -> f64 {
        let q_m3s = flow_m3h / 3600.0;
        self.resistance() * q_m3s * q_m3s + self.params.static_head_m
    }

    /// Scale resistance by `factor` relative to the clean pipe. Values below 1.0 are clamped.
    pub fn set_clogging(&mut self, factor: f64) {
        self.clogging_factor = factor.max(1.0);
    }

    pub fn reset_clogging(&mut self) {
        self.clogging_factor = 1.0;
    }
}

/// `R = f·(L/D)/(2gA²) + K/(2gA²)`
fn base_resistance(p: &PipeParams) -> f64 {
    let area = std::f64::consts::PI * (p.pipe_diameter_m / 2.0).powi(2);
    let denom = 2.0 * GRAVITY * area * area;
    if denom <= 0.0 {
        return 0.0;
    }
    let friction = FRICTION_FACTOR * (p.pipe_length_m / p.pipe_diameter_m) / denom;
    let fittings = p.fitting_loss_coefficient / denom;
    friction + fittings
}
