//! Scenario Executor
//!
//! Drives one asset through discrete time steps. Each `step()` applies due
//! setpoints, advances faults, solves the hydraulic operating point, derives
//! the remaining physical quantities, applies sensor faults, and returns one
//! `Telemetry` sample. The end of the scenario is signalled by `None`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Scenario;
use crate::config::defaults::{DEFAULT_ASSET_ID, DEFAULT_PLANT_ID};
use crate::faults::{FaultError, FaultInjector, GroundTruth};
use crate::physics_engine::PlantModels;
use crate::types::{SignalSet, Telemetry};

/// Point-in-time view of an executor for control surfaces
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutorStatus {
    pub scenario_name: String,
    pub asset_id: String,
    pub running: bool,
    pub current_time_sec: f64,
    pub duration_sec: f64,
    pub progress_pct: f64,
    pub rpm: f64,
    pub valve_open_pct: f64,
}

#[derive(Debug)]
pub struct ScenarioExecutor {
    scenario: Scenario,
    models: PlantModels,
    injector: FaultInjector,
    plant_id: String,
    asset_id: String,
    /// Wall-clock instant that simulation time 0 maps to
    clock_origin: DateTime<Utc>,
    /// Steps taken since t = 0; simulation time is `tick * dt`
    tick: u64,
    current_time: f64,
    rpm: f64,
    valve_open_pct: f64,
    setpoint_index: usize,
    running: bool,
}

impl ScenarioExecutor {
    /// Build an executor and register the scenario's faults. Not running until `start()`.
    pub fn new(scenario: Scenario, models: PlantModels) -> Result<Self, FaultError> {
        let mut executor = Self {
            injector: FaultInjector::new(scenario.seed),
            rpm: scenario.initial_conditions.rpm,
            valve_open_pct: scenario.initial_conditions.valve_open_pct,
            scenario,
            models,
            plant_id: DEFAULT_PLANT_ID.to_string(),
            asset_id: DEFAULT_ASSET_ID.to_string(),
            clock_origin: Utc::now(),
            tick: 0,
            current_time: 0.0,
            setpoint_index: 0,
            running: false,
        };
        executor.register_faults()?;
        Ok(executor)
    }

    #[must_use]
    pub fn with_ids(mut self, plant_id: impl Into<String>, asset_id: impl Into<String>) -> Self {
        self.plant_id = plant_id.into();
        self.asset_id = asset_id.into();
        self
    }

    /// Pin timestamps to a fixed origin (reproducible output)
    #[must_use]
    pub fn with_clock_origin(mut self, origin: DateTime<Utc>) -> Self {
        self.clock_origin = origin;
        self
    }

    fn register_faults(&mut self) -> Result<(), FaultError> {
        for spec in &self.scenario.faults {
            self.injector
                .inject_fault(&spec.fault_type, spec.start_time_sec, &spec.params)?;
        }
        Ok(())
    }

    /// Back to t = 0 with initial conditions and a freshly registered fault plan
    fn rewind(&mut self) -> Result<(), FaultError> {
        self.tick = 0;
        self.current_time = 0.0;
        self.setpoint_index = 0;
        self.rpm = self.scenario.initial_conditions.rpm;
        self.valve_open_pct = self.scenario.initial_conditions.valve_open_pct;
        self.injector.clear_all_faults(&mut self.models);
        self.register_faults()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Rewind and begin running. Calling again restarts from t = 0.
    pub fn start(&mut self) -> Result<(), FaultError> {
        self.rewind()?;
        self.running = true;
        info!(
            asset_id = %self.asset_id,
            scenario = %self.scenario.name,
            duration_sec = self.scenario.duration_sec,
            faults = self.injector.fault_count(),
            "Scenario started"
        );
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.running {
            info!(asset_id = %self.asset_id, t = self.current_time, "Scenario stopped");
        }
        self.running = false;
    }

    /// Stop and rewind without starting
    pub fn reset(&mut self) -> Result<(), FaultError> {
        self.running = false;
        self.rewind()
    }

    /// Manual operator override of speed and/or valve command
    pub fn set_setpoint(&mut self, rpm: Option<f64>, valve_open_pct: Option<f64>) {
        if let Some(rpm) = rpm {
            self.rpm = rpm;
        }
        if let Some(valve) = valve_open_pct {
            self.valve_open_pct = valve;
        }
        debug!(asset_id = %self.asset_id, rpm = self.rpm, valve = self.valve_open_pct, "Setpoint override");
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    fn apply_due_setpoints(&mut self) {
        while let Some(sp) = self.scenario.setpoints.get(self.setpoint_index) {
            if sp.time_sec > self.current_time {
                break;
            }
            if let Some(rpm) = sp.rpm {
                self.rpm = rpm;
            }
            if let Some(valve) = sp.valve_open_pct {
                self.valve_open_pct = valve;
            }
            debug!(asset_id = %self.asset_id, t = self.current_time, rpm = self.rpm, valve = self.valve_open_pct, "Setpoint applied");
            self.setpoint_index += 1;
        }
    }

    fn timestamp(&self) -> DateTime<Utc> {
        #[allow(clippy::cast_possible_truncation)]
        let micros = (self.current_time * 1_000_000.0).round() as i64;
        self.clock_origin + Duration::microseconds(micros)
    }

    /// Advance one tick of `dt` seconds. Returns `None` once stopped or past the end.
    ///
    /// `dt` is expected to stay the same for a whole run.
    pub fn step(&mut self, dt: f64) -> Option<Telemetry> {
        if !self.running {
            return None;
        }
        if self.current_time >= self.scenario.duration_sec {
            self.running = false;
            info!(asset_id = %self.asset_id, scenario = %self.scenario.name, "Scenario complete");
            return None;
        }

        self.apply_due_setpoints();
        self.injector
            .update(self.current_time, dt, &mut self.models);

        let valve_actual = self.injector.apply_valve_faults(self.valve_open_pct);
        let physics = self.models.snapshot(self.rpm, valve_actual);

        let true_signals = SignalSet {
            pressure_bar: physics.pressure_bar(),
            flow_m3h: physics.flow_m3h,
            temp_c: physics.fluid_temp_c,
            bearing_temp_c: physics.bearing_temp_c,
            vibration_rms: physics.vibration_rms,
            rpm: self.rpm,
            motor_current_a: physics.motor_current_a,
            valve_open_pct: valve_actual,
        };
        let signals = self.injector.apply_sensor_faults(&true_signals);

        let telemetry = Telemetry {
            ts: self.timestamp(),
            plant_id: self.plant_id.clone(),
            asset_id: self.asset_id.clone(),
            signals,
            truth: self.injector.get_ground_truth().truth(),
        };

        self.tick += 1;
        #[allow(clippy::cast_precision_loss)]
        let ticks = self.tick as f64;
        self.current_time = ticks * dt;
        Some(telemetry)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn get_status(&self) -> ExecutorStatus {
        let duration = self.scenario.duration_sec;
        let progress_pct = if duration > 0.0 {
            (self.current_time / duration * 100.0).min(100.0)
        } else {
            0.0
        };
        ExecutorStatus {
            scenario_name: self.scenario.name.clone(),
            asset_id: self.asset_id.clone(),
            running: self.running,
            current_time_sec: self.current_time,
            duration_sec: duration,
            progress_pct,
            rpm: self.rpm,
            valve_open_pct: self.valve_open_pct,
        }
    }

    pub const fn is_running(&self) -> bool {
        self.running
    }

    pub const fn current_time(&self) -> f64 {
        self.current_time
    }

    pub const fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub const fn models(&self) -> &PlantModels {
        &self.models
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn plant_id(&self) -> &str {
        &self.plant_id
    }

    pub fn ground_truth(&self) -> GroundTruth {
        self.injector.get_ground_truth()
    }
}
