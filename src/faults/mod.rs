//! Fault Injection
//!
//! Registry of time-activated fault state machines for one asset.
//!
//! ## Tick protocol
//! 1. `update()` - activate faults whose start time has passed, advance their
//!    progress, and push parameter changes (wear, clogging) into the models
//! 2. `apply_valve_faults()` - commanded valve position → actual position
//! 3. `apply_sensor_faults()` - true signals → sensor-reported signals
//! 4. `get_ground_truth()` - label for the tick
//!
//! All randomness (noise bursts) comes from generators seeded through the
//! injector, so a seeded scenario replays bit-identically.

mod variants;

pub use variants::{CloggingMode, Fault, FaultDescriptor, FaultInstance, FaultParams};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::physics_engine::PlantModels;
use crate::types::{FaultKind, Signal, SignalSet, TelemetryTruth};

#[derive(Debug, Error)]
pub enum FaultError {
    #[error("Unknown fault type: {0}")]
    UnknownFaultType(String),

    #[error("Invalid params for {fault} fault: {reason}")]
    InvalidParams { fault: &'static str, reason: String },
}

/// Primary fault label plus every active fault
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroundTruth {
    pub fault: FaultKind,
    pub severity: f64,
    pub faults: Vec<FaultDescriptor>,
}

impl GroundTruth {
    pub const fn truth(&self) -> TelemetryTruth {
        TelemetryTruth {
            fault: self.fault,
            severity: self.severity,
        }
    }
}

#[derive(Debug)]
pub struct FaultInjector {
    faults: Vec<FaultInstance>,
    seed: Option<u64>,
    rng: StdRng,
}

impl FaultInjector {
    /// `seed` drives every noise burst that does not carry its own seed
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            faults: Vec::new(),
            seed,
            rng: Self::make_rng(seed),
        }
    }

    fn make_rng(seed: Option<u64>) -> StdRng {
        seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
    }

    /// Register a fault by type name. Unknown types and malformed params are rejected
    /// and nothing is registered.
    pub fn inject_fault(
        &mut self,
        fault_type: &str,
        start_time_sec: f64,
        params: &FaultParams,
    ) -> Result<(), FaultError> {
        let kind = FaultKind::injectable(fault_type)
            .ok_or_else(|| FaultError::UnknownFaultType(fault_type.to_string()))?;
        let fallback_seed: u64 = self.rng.gen();
        let fault = Fault::from_params(kind, params, fallback_seed)?;
        debug!(fault = %kind, start_time_sec, "Fault registered");
        self.faults.push(FaultInstance::new(start_time_sec, fault));
        Ok(())
    }

    pub fn fault_count(&self) -> usize {
        self.faults.len()
    }

    pub fn faults(&self) -> &[FaultInstance] {
        &self.faults
    }

    pub fn active_faults(&self) -> impl Iterator<Item = &FaultInstance> {
        self.faults.iter().filter(|f| f.is_active())
    }

    /// Flip every fault whose start time has been reached
    pub fn activate(&mut self, current_time: f64) {
        for fault in &mut self.faults {
            fault.activate(current_time);
        }
    }

    /// Activate and advance every fault by one tick
    pub fn update(&mut self, current_time: f64, dt: f64, models: &mut PlantModels) {
        for fault in &mut self.faults {
            let was_active = fault.is_active();
            fault.activate(current_time);
            fault.update(current_time, dt, models);
            if !was_active && fault.is_active() {
                debug!(fault = %fault.kind(), current_time, "Fault activated");
            }
        }
    }

    /// Commanded valve position → actual position. Only stuck valves participate.
    pub fn apply_valve_faults(&self, command_pct: f64) -> f64 {
        self.faults
            .iter()
            .fold(command_pct, |valve, fault| fault.apply_valve(valve))
    }

    /// True signals → sensor readings, fault by fault in registration order
    pub fn apply_sensor_faults(&mut self, signals: &SignalSet) -> SignalSet {
        let mut out = *signals;
        for fault in &mut self.faults {
            for signal in Signal::ALL {
                let reading = fault.apply_sensor(signal, out.get(signal));
                out.set(signal, reading);
            }
        }
        out
    }

    /// Active fault with the strictly highest severity; first registered wins ties.
    /// Reports `none` with severity 0 when nothing active has positive severity.
    pub fn get_ground_truth(&self) -> GroundTruth {
        let mut primary = FaultKind::None;
        let mut max_severity = 0.0;
        let mut faults = Vec::new();

        for fault in self.active_faults() {
            let descriptor = fault.descriptor();
            if descriptor.severity > max_severity {
                max_severity = descriptor.severity;
                primary = descriptor.fault;
            }
            faults.push(descriptor);
        }

        GroundTruth {
            fault: primary,
            severity: max_severity,
            faults,
        }
    }

    /// Drop every fault, restore healthy model parameters, and reseed the generator
    pub fn clear_all_faults(&mut self, models: &mut PlantModels) {
        self.faults.clear();
        self.rng = Self::make_rng(self.seed);
        models.reset_degradation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: serde_json::Value) -> FaultParams {
        match v {
            serde_json::Value::Object(m) => m,
            _ => FaultParams::new(),
        }
    }

    #[test]
    fn test_unknown_fault_type_is_rejected() {
        let mut inj = FaultInjector::new(Some(1));
        let err = inj
            .inject_fault("impeller_crack", 0.0, &FaultParams::new())
            .unwrap_err();
        assert!(matches!(err, FaultError::UnknownFaultType(ref t) if t == "impeller_crack"));
        assert_eq!(inj.fault_count(), 0);
    }

    #[test]
    fn test_ground_truth_none_when_idle() {
        let mut inj = FaultInjector::new(Some(1));
        inj.inject_fault("valve_stuck", 100.0, &FaultParams::new()).unwrap();
        let gt = inj.get_ground_truth();
        assert_eq!(gt.fault, FaultKind::None);
        assert_eq!(gt.severity, 0.0);
        assert!(gt.faults.is_empty());
    }

    #[test]
    fn test_ground_truth_single_active() {
        let mut inj = FaultInjector::new(Some(1));
        let mut models = PlantModels::default();
        inj.inject_fault("valve_stuck", 0.0, &FaultParams::new()).unwrap();
        inj.update(0.0, 1.0, &mut models);
        let gt = inj.get_ground_truth();
        assert_eq!(gt.fault, FaultKind::ValveStuck);
        assert_eq!(gt.severity, 1.0);
        assert_eq!(gt.faults.len(), 1);
    }

    #[test]
    fn test_ground_truth_tie_first_wins() {
        let mut inj = FaultInjector::new(Some(1));
        let mut models = PlantModels::default();
        inj.inject_fault("sensor_stuck", 0.0, &FaultParams::new()).unwrap();
        inj.inject_fault("valve_stuck", 0.0, &FaultParams::new()).unwrap();
        inj.update(0.0, 1.0, &mut models);
        let gt = inj.get_ground_truth();
        assert_eq!(gt.fault, FaultKind::SensorStuck);
        assert_eq!(gt.faults.len(), 2);
    }

    #[test]
    fn test_ground_truth_highest_severity_wins() {
        let mut inj = FaultInjector::new(Some(1));
        let mut models = PlantModels::default();
        inj.inject_fault("bearing_wear", 0.0, &params(json!({"rate_per_sec": 0.001})))
            .unwrap();
        inj.inject_fault("clogging", 0.0, &params(json!({"resistance_factor": 2.0})))
            .unwrap();
        inj.update(0.0, 1.0, &mut models);
        let gt = inj.get_ground_truth();
        assert_eq!(gt.fault, FaultKind::Clogging);
        assert!((gt.severity - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_params_leave_injector_empty() {
        let mut inj = FaultInjector::new(Some(1));
        let mut models = PlantModels::default();
        assert!(inj
            .inject_fault("clogging", 0.0, &params(json!({"resistance_factor": 0.5})))
            .is_err());
        assert!(inj
            .inject_fault("bearing_wear", 0.0, &params(json!({"rate_per_sec": -0.2})))
            .is_err());
        assert_eq!(inj.fault_count(), 0);

        for t in 0..5 {
            inj.update(f64::from(t), 1.0, &mut models);
        }
        assert_eq!(models.bearing.wear_level(), 0.0);
        assert_eq!(models.pipe.clogging_factor(), 1.0);
    }

    #[test]
    fn test_wear_bounded_and_monotone_through_injector() {
        let mut inj = FaultInjector::new(None);
        let mut models = PlantModels::default();
        inj.inject_fault("bearing_wear", 5.0, &params(json!({"rate_per_sec": 0.01})))
            .unwrap();
        let mut last = 0.0;
        for t in 0..300 {
            inj.update(f64::from(t), 1.0, &mut models);
            let wear = models.bearing.wear_level();
            assert!((0.0..=1.0).contains(&wear));
            assert!(wear >= last);
            last = wear;
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_apply_valve_faults() {
        let mut inj = FaultInjector::new(Some(1));
        let mut models = PlantModels::default();
        inj.inject_fault("valve_stuck", 3.0, &params(json!({"stuck_value": 35.0})))
            .unwrap();
        assert_eq!(inj.apply_valve_faults(90.0), 90.0);
        inj.update(3.0, 1.0, &mut models);
        assert_eq!(inj.apply_valve_faults(90.0), 35.0);
    }

    #[test]
    fn test_apply_sensor_faults_leaves_other_signals() {
        let mut inj = FaultInjector::new(Some(1));
        let mut models = PlantModels::default();
        inj.inject_fault("sensor_drift", 0.0, &params(json!({"drift_rate": 1.0})))
            .unwrap();
        for t in 0..3 {
            inj.update(f64::from(t), 1.0, &mut models);
        }
        let truth = SignalSet {
            pressure_bar: 5.0,
            flow_m3h: 60.0,
            ..SignalSet::default()
        };
        let sensed = inj.apply_sensor_faults(&truth);
        assert!((sensed.pressure_bar - 8.0).abs() < 1e-12);
        assert_eq!(sensed.flow_m3h, 60.0);
    }

    #[test]
    fn test_clear_all_faults_resets_models() {
        let mut inj = FaultInjector::new(Some(1));
        let mut models = PlantModels::default();
        inj.inject_fault("bearing_wear", 0.0, &params(json!({"rate_per_sec": 0.1})))
            .unwrap();
        inj.inject_fault("clogging", 0.0, &FaultParams::new()).unwrap();
        inj.update(0.0, 1.0, &mut models);
        assert!(models.bearing.wear_level() > 0.0);
        assert!(models.pipe.clogging_factor() > 1.0);

        inj.clear_all_faults(&mut models);
        assert_eq!(inj.fault_count(), 0);
        assert_eq!(models.bearing.wear_level(), 0.0);
        assert_eq!(models.pipe.clogging_factor(), 1.0);
    }

    #[test]
    fn test_seeded_injector_noise_is_reproducible() {
        let run = || {
            let mut inj = FaultInjector::new(Some(2024));
            let mut models = PlantModels::default();
            inj.inject_fault("noise_burst", 0.0, &FaultParams::new()).unwrap();
            (0..5)
                .map(|t| {
                    inj.update(f64::from(t), 1.0, &mut models);
                    inj.apply_sensor_faults(&SignalSet::default()).vibration_rms
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
