//! Physics Engine Module
//!
//! Deterministic first-principles models for one pump asset.
//! Everything here is closed-form or bounded-iteration math; no randomness.
//!
//! ## Models
//! - `PumpModel` - head/flow curve, affinity laws, operating point solver, efficiency
//! - `PipeSystem` - Darcy-Weisbach system curve with a clogging multiplier
//! - `BearingModel` - wear-driven vibration and temperature, ISO 20816 grading
//! - `MotorModel` - phase current from shaft power
//!
//! `PlantModels` bundles the four so fault variants can mutate the ones they affect.

pub mod bearing;
pub mod motor;
pub mod pipe;
pub mod pump;

pub use bearing::{BearingModel, BearingParams, VibrationGrade};
pub use motor::{MotorModel, MotorParams};
pub use pipe::{PipeParams, PipeSystem};
pub use pump::{shaft_power_kw, OperatingPoint, PumpModel, PumpParams};

/// Water density (kg/m³)
pub const WATER_DENSITY: f64 = 1000.0;

/// Standard gravity (m/s²)
pub const GRAVITY: f64 = 9.81;

/// Fluid temperature with no shaft load (°C)
pub const FLUID_BASE_TEMP_C: f64 = 25.0;

/// Fluid heating per kW of shaft power (°C/kW)
pub const FLUID_HEATING_PER_KW: f64 = 0.5;

/// Shaft power that corresponds to a bearing load factor of 1.0 (kW)
pub const NOMINAL_LOAD_KW: f64 = 10.0;

/// Metres of head per bar
pub const HEAD_M_PER_BAR: f64 = 10.0;

/// The four physical models of one asset
#[derive(Debug, Clone)]
pub struct PlantModels {
    pub pump: PumpModel,
    pub pipe: PipeSystem,
    pub bearing: BearingModel,
    pub motor: MotorModel,
}

impl PlantModels {
    pub fn new(pump: PumpParams, pipe: PipeParams, bearing: BearingParams, motor: MotorParams) -> Self {
        Self {
            pump: PumpModel::new(pump),
            pipe: PipeSystem::new(pipe),
            bearing: BearingModel::new(bearing),
            motor: MotorModel::new(motor),
        }
    }

    /// Restore every fault-mutable field (clogging, wear) to healthy
    pub fn reset_degradation(&mut self) {
        self.pipe.reset_clogging();
        self.bearing.reset_wear();
    }

    /// Solve one steady-state snapshot for the given speed and actual valve opening
    pub fn snapshot(&self, rpm: f64, valve_actual_pct: f64) -> PhysicsSnapshot {
        let op = self
            .pump
            .solve_operating_point(rpm, valve_actual_pct, |q| self.pipe.system_head(q));
        let efficiency = self.pump.efficiency(op.flow_m3h, rpm);
        let shaft_power_kw = shaft_power_kw(op.flow_m3h, op.head_m, efficiency);
        let load_factor = shaft_power_kw / NOMINAL_LOAD_KW;

        PhysicsSnapshot {
            flow_m3h: op.flow_m3h,
            head_m: op.head_m,
            efficiency,
            shaft_power_kw,
            motor_current_a: self.motor.current(shaft_power_kw),
            vibration_rms: self.bearing.vibration(load_factor),
            bearing_temp_c: self.bearing.temperature(load_factor),
            fluid_temp_c: FLUID_BASE_TEMP_C + FLUID_HEATING_PER_KW * shaft_power_kw,
        }
    }
}

impl Default for PlantModels {
    fn default() -> Self {
        Self::new(
            PumpParams::default(),
            PipeParams::default(),
            BearingParams::default(),
            MotorParams::default(),
        )
    }
}

/// True physical state of an asset at one instant, before any sensor faults
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsSnapshot {
    pub flow_m3h: f64,
    pub head_m: f64,
    pub efficiency: f64,
    pub shaft_power_kw: f64,
    pub motor_current_a: f64,
    pub vibration_rms: f64,
    pub bearing_temp_c: f64,
    pub fluid_temp_c: f64,
}

impl PhysicsSnapshot {
    pub fn pressure_bar(&self) -> f64 {
        self.head_m / HEAD_M_PER_BAR
    }
}
