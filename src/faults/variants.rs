//! Fault variants and their typed parameters
//!
//! Each variant is one physical or sensor failure mechanism. Parameters arrive
//! as a JSON object (from scenario files) and are decoded into the variant's
//! own struct, with per-field defaults.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::FaultError;
use crate::physics_engine::PlantModels;
use crate::types::{FaultKind, Signal};

/// Raw fault params as they appear in scenario JSON
pub type FaultParams = serde_json::Map<String, serde_json::Value>;

fn decode<T: DeserializeOwned>(kind: FaultKind, params: &FaultParams) -> Result<T, FaultError> {
    serde_json::from_value(serde_json::Value::Object(params.clone())).map_err(|e| {
        FaultError::InvalidParams {
            fault: kind.as_str(),
            reason: e.to_string(),
        }
    })
}

fn parse_signal(kind: FaultKind, name: &str) -> Result<Signal, FaultError> {
    Signal::from_name(name).ok_or_else(|| FaultError::InvalidParams {
        fault: kind.as_str(),
        reason: format!("unknown signal '{name}'"),
    })
}

/// Reject a non-finite value or one below `min`.
fn at_least(kind: FaultKind, name: &str, value: f64, min: f64) -> Result<f64, FaultError> {
    if value.is_finite() && value >= min {
        Ok(value)
    } else {
        Err(FaultError::InvalidParams {
            fault: kind.as_str(),
            reason: format!("{name} must be a finite value >= {min}, got {value}"),
        })
    }
}

// ============================================================================
// Parameter Structs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct BearingWearParams {
    rate_per_sec: f64,
}

impl Default for BearingWearParams {
    fn default() -> Self {
        Self { rate_per_sec: 1e-4 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct CloggingParams {
    resistance_factor: Option<f64>,
    ramp_rate: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ValveStuckParams {
    stuck_value: f64,
}

impl Default for ValveStuckParams {
    fn default() -> Self {
        Self { stuck_value: 50.0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct SensorDriftParams {
    signal: String,
    drift_rate: f64,
}

impl Default for SensorDriftParams {
    fn default() -> Self {
        Self {
            signal: Signal::PressureBar.as_str().to_string(),
            drift_rate: 0.01,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct SensorStuckParams {
    signal: String,
}

impl Default for SensorStuckParams {
    fn default() -> Self {
        Self {
            signal: Signal::PressureBar.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct NoiseBurstParams {
    signal: String,
    noise_amplitude: f64,
    duration_sec: f64,
    seed: Option<u64>,
}

impl Default for NoiseBurstParams {
    fn default() -> Self {
        Self {
            signal: Signal::VibrationRms.as_str().to_string(),
            noise_amplitude: 5.0,
            duration_sec: 10.0,
            seed: None,
        }
    }
}

// ============================================================================
// Variants
// ============================================================================

/// How a clogging fault sets the pipe resistance multiplier
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CloggingMode {
    /// Fixed multiplier from activation onwards
    Step { factor: f64 },
    /// Multiplier starts at 1.0 and grows by `rate` per second while active
    Ramp { rate: f64, factor: f64 },
}

impl CloggingMode {
    pub const fn factor(&self) -> f64 {
        match self {
            Self::Step { factor } | Self::Ramp { factor, .. } => *factor,
        }
    }
}

/// Mechanism-specific state of one fault instance
#[derive(Debug)]
pub enum Fault {
    BearingWear {
        rate_per_sec: f64,
        elapsed_sec: f64,
    },
    Clogging(CloggingMode),
    ValveStuck {
        stuck_value: f64,
    },
    SensorDrift {
        signal: Signal,
        drift_rate: f64,
        elapsed_sec: f64,
        offset: f64,
    },
    SensorStuck {
        signal: Signal,
        last_value: Option<f64>,
        frozen_value: Option<f64>,
    },
    NoiseBurst {
        signal: Signal,
        noise: Normal<f64>,
        duration_sec: f64,
        elapsed_sec: f64,
        rng: StdRng,
    },
}

impl Fault {
    /// Build a variant from its params.
    ///
    /// `fallback_seed` seeds a noise burst that carries no `seed` param of its own.
    pub fn from_params(kind: FaultKind, params: &FaultParams, fallback_seed: u64) -> Result<Self, FaultError> {
        let fault = match kind {
            FaultKind::BearingWear => {
                let p: BearingWearParams = decode(kind, params)?;
                Self::BearingWear {
                    rate_per_sec: at_least(kind, "rate_per_sec", p.rate_per_sec, 0.0)?,
                    elapsed_sec: 0.0,
                }
            }
            FaultKind::Clogging => {
                let p: CloggingParams = decode(kind, params)?;
                let mode = match (p.resistance_factor, p.ramp_rate) {
                    (Some(factor), _) => CloggingMode::Step {
                        factor: at_least(kind, "resistance_factor", factor, 1.0)?,
                    },
                    (None, Some(rate)) => CloggingMode::Ramp {
                        rate: at_least(kind, "ramp_rate", rate, 0.0)?,
                        factor: 1.0,
                    },
                    (None, None) => CloggingMode::Step { factor: 1.5 },
                };
                Self::Clogging(mode)
            }
            FaultKind::ValveStuck => {
                let p: ValveStuckParams = decode(kind, params)?;
                Self::ValveStuck {
                    stuck_value: p.stuck_value,
                }
            }
            FaultKind::SensorDrift => {
                let p: SensorDriftParams = decode(kind, params)?;
                Self::SensorDrift {
                    signal: parse_signal(kind, &p.signal)?,
                    drift_rate: p.drift_rate,
                    elapsed_sec: 0.0,
                    offset: 0.0,
                }
            }
            FaultKind::SensorStuck => {
                let p: SensorStuckParams = decode(kind, params)?;
                Self::SensorStuck {
                    signal: parse_signal(kind, &p.signal)?,
                    last_value: None,
                    frozen_value: None,
                }
            }
            FaultKind::NoiseBurst => {
                let p: NoiseBurstParams = decode(kind, params)?;
                let noise = Normal::new(0.0, p.noise_amplitude).map_err(|e| FaultError::InvalidParams {
                    fault: kind.as_str(),
                    reason: format!("noise_amplitude {}: {e}", p.noise_amplitude),
                })?;
                Self::NoiseBurst {
                    signal: parse_signal(kind, &p.signal)?,
                    noise,
                    duration_sec: p.duration_sec,
                    elapsed_sec: 0.0,
                    rng: StdRng::seed_from_u64(p.seed.unwrap_or(fallback_seed)),
                }
            }
            FaultKind::None | FaultKind::Unknown => {
                return Err(FaultError::UnknownFaultType(kind.as_str().to_string()));
            }
        };
        Ok(fault)
    }

    pub const fn kind(&self) -> FaultKind {
        match self {
            Self::BearingWear { .. } => FaultKind::BearingWear,
            Self::Clogging(_) => FaultKind::Clogging,
            Self::ValveStuck { .. } => FaultKind::ValveStuck,
            Self::SensorDrift { .. } => FaultKind::SensorDrift,
            Self::SensorStuck { .. } => FaultKind::SensorStuck,
            Self::NoiseBurst { .. } => FaultKind::NoiseBurst,
        }
    }

    /// Advance internal progress by `dt`. Only called while active.
    fn advance(&mut self, dt: f64, models: &mut PlantModels) {
        match self {
            Self::BearingWear {
                rate_per_sec,
                elapsed_sec,
            } => {
                *elapsed_sec += dt;
                models.bearing.update_wear(*rate_per_sec, dt);
            }
            Self::Clogging(mode) => {
                if let CloggingMode::Ramp { rate, factor } = mode {
                    *factor += *rate * dt;
                }
                models.pipe.set_clogging(mode.factor());
            }
            Self::SensorDrift {
                drift_rate,
                elapsed_sec,
                offset,
                ..
            } => {
                *elapsed_sec += dt;
                *offset = *drift_rate * *elapsed_sec;
            }
            Self::NoiseBurst { elapsed_sec, .. } => *elapsed_sec += dt,
            Self::ValveStuck { .. } | Self::SensorStuck { .. } => {}
        }
    }

    /// Severity while active (0.0-1.0)
    fn active_severity(&self) -> f64 {
        let severity = match self {
            Self::BearingWear {
                rate_per_sec,
                elapsed_sec,
            } => (elapsed_sec * rate_per_sec * 10.0).min(1.0),
            Self::Clogging(mode) => ((mode.factor() - 1.0) / 2.0).min(1.0),
            Self::SensorDrift { offset, .. } => (offset.abs() / 10.0).min(1.0),
            Self::NoiseBurst {
                duration_sec,
                elapsed_sec,
                ..
            } => {
                if elapsed_sec < duration_sec {
                    1.0
                } else {
                    0.0
                }
            }
            Self::ValveStuck { .. } | Self::SensorStuck { .. } => 1.0,
        };
        severity.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Fault Instance
// ============================================================================

/// One registered fault: activation time, one-way `active` flag, and mechanism state
#[derive(Debug)]
pub struct FaultInstance {
    start_time_sec: f64,
    active: bool,
    fault: Fault,
}

/// Ground-truth view of one fault instance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FaultDescriptor {
    pub fault: FaultKind,
    pub active: bool,
    pub severity: f64,
}

impl FaultInstance {
    pub const fn new(start_time_sec: f64, fault: Fault) -> Self {
        Self {
            start_time_sec,
            active: false,
            fault,
        }
    }

    pub const fn kind(&self) -> FaultKind {
        self.fault.kind()
    }

    pub const fn start_time_sec(&self) -> f64 {
        self.start_time_sec
    }

    pub const fn is_active(&self) -> bool {
        self.active
    }

    pub const fn fault(&self) -> &Fault {
        &self.fault
    }

    /// Flip to active once `current_time` reaches the start time. Never flips back.
    pub fn activate(&mut self, current_time: f64) {
        if current_time >= self.start_time_sec {
            self.active = true;
        }
    }

    /// Advance the mechanism and push parameter changes into the models
    pub fn update(&mut self, current_time: f64, dt: f64, models: &mut PlantModels) {
        self.activate(current_time);
        if self.active {
            self.fault.advance(dt, models);
        }
    }

    /// Actual valve position for a commanded one
    pub fn apply_valve(&self, command_pct: f64) -> f64 {
        match self.fault {
            Fault::ValveStuck { stuck_value } if self.active => stuck_value,
            _ => command_pct,
        }
    }

    /// Sensor reading for one signal's incoming value.
    ///
    /// Takes `&mut self` because a stuck sensor records the last healthy
    /// reading and a noise burst draws from its generator.
    pub fn apply_sensor(&mut self, signal: Signal, value: f64) -> f64 {
        let active = self.active;
        match &mut self.fault {
            Fault::SensorDrift {
                signal: target,
                offset,
                ..
            } if *target == signal && active => value + *offset,
            Fault::SensorStuck {
                signal: target,
                last_value,
                frozen_value,
            } if *target == signal => {
                if active {
                    *frozen_value.get_or_insert(last_value.unwrap_or(value))
                } else {
                    *last_value = Some(value);
                    value
                }
            }
            Fault::NoiseBurst {
                signal: target,
                noise,
                duration_sec,
                elapsed_sec,
                rng,
            } if *target == signal && active && *elapsed_sec < *duration_sec => value + noise.sample(rng),
            _ => value,
        }
    }

    pub fn severity(&self) -> f64 {
        if self.active {
            self.fault.active_severity()
        } else {
            0.0
        }
    }

    pub fn descriptor(&self) -> FaultDescriptor {
        FaultDescriptor {
            fault: self.kind(),
            active: self.active,
            severity: self.severity(),
        }
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

    fn instance(kind: FaultKind, start: f64, p: serde_json::Value) -> FaultInstance {
        FaultInstance::new(start, Fault::from_params(kind, &params(p), 7).unwrap())
    }

    #[test]
    fn test_activation_is_one_way() {
        let mut f = instance(FaultKind::ValveStuck, 10.0, json!({}));
        f.activate(9.0);
        assert!(!f.is_active());
        f.activate(10.0);
        assert!(f.is_active());
        f.activate(0.0);
        assert!(f.is_active(), "activation must never revert");
    }

    #[test]
    fn test_bearing_wear_severity_and_model() {
        let mut models = PlantModels::default();
        let mut f = instance(FaultKind::BearingWear, 0.0, json!({"rate_per_sec": 0.01}));
        for t in 0..5 {
            f.update(f64::from(t), 1.0, &mut models);
        }
        // elapsed 5 s * 0.01 * 10 = 0.5
        assert!((f.severity() - 0.5).abs() < 1e-12);
        assert!((models.bearing.wear_level() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_clogging_modes() {
        let step = Fault::from_params(FaultKind::Clogging, &params(json!({"resistance_factor": 2.0})), 0).unwrap();
        assert!(matches!(step, Fault::Clogging(CloggingMode::Step { factor }) if factor == 2.0));

        let default = Fault::from_params(FaultKind::Clogging, &FaultParams::new(), 0).unwrap();
        assert!(matches!(default, Fault::Clogging(CloggingMode::Step { factor }) if factor == 1.5));

        let mut models = PlantModels::default();
        let mut ramp = instance(FaultKind::Clogging, 0.0, json!({"ramp_rate": 0.1}));
        for t in 0..10 {
            ramp.update(f64::from(t), 1.0, &mut models);
        }
        assert!((models.pipe.clogging_factor() - 2.0).abs() < 1e-9);
        assert!((ramp.severity() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_valve_stuck_overrides_only_when_active() {
        let mut f = instance(FaultKind::ValveStuck, 5.0, json!({"stuck_value": 20.0}));
        assert_eq!(f.apply_valve(80.0), 80.0);
        assert_eq!(f.severity(), 0.0);
        f.activate(5.0);
        assert_eq!(f.apply_valve(80.0), 20.0);
        assert_eq!(f.severity(), 1.0);
    }

    #[test]
    fn test_sensor_drift_targets_one_signal() {
        let mut models = PlantModels::default();
        let mut f = instance(FaultKind::SensorDrift, 0.0, json!({"signal": "temp_c", "drift_rate": 0.5}));
        for t in 0..4 {
            f.update(f64::from(t), 1.0, &mut models);
        }
        assert!((f.apply_sensor(Signal::TempC, 30.0) - 32.0).abs() < 1e-12);
        assert_eq!(f.apply_sensor(Signal::PressureBar, 5.0), 5.0);
        assert!((f.severity() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_sensor_stuck_freezes_last_healthy_value() {
        let mut f = instance(FaultKind::SensorStuck, 2.0, json!({"signal": "flow_m3h"}));
        assert_eq!(f.apply_sensor(Signal::FlowM3h, 90.0), 90.0);
        assert_eq!(f.apply_sensor(Signal::FlowM3h, 91.0), 91.0);
        f.activate(2.0);
        assert_eq!(f.apply_sensor(Signal::FlowM3h, 40.0), 91.0);
        assert_eq!(f.apply_sensor(Signal::FlowM3h, 10.0), 91.0);
    }

    #[test]
    fn test_sensor_stuck_without_history_uses_first_value() {
        let mut f = instance(FaultKind::SensorStuck, 0.0, json!({}));
        f.activate(0.0);
        assert_eq!(f.apply_sensor(Signal::PressureBar, 4.2), 4.2);
        assert_eq!(f.apply_sensor(Signal::PressureBar, 6.0), 4.2);
    }

    #[test]
    fn test_noise_burst_self_expires() {
        let mut models = PlantModels::default();
        let mut f = instance(FaultKind::NoiseBurst, 0.0, json!({"duration_sec": 3.0, "noise_amplitude": 2.0}));
        f.update(0.0, 1.0, &mut models);
        assert_eq!(f.severity(), 1.0);
        assert_ne!(f.apply_sensor(Signal::VibrationRms, 2.0), 2.0);
        f.update(1.0, 1.0, &mut models);
        f.update(2.0, 1.0, &mut models);
        assert_eq!(f.severity(), 0.0);
        assert_eq!(f.apply_sensor(Signal::VibrationRms, 2.0), 2.0);
    }

    #[test]
    fn test_noise_burst_seed_param_is_reproducible() {
        let mut a = instance(FaultKind::NoiseBurst, 0.0, json!({"seed": 42}));
        let mut b = FaultInstance::new(
            0.0,
            Fault::from_params(FaultKind::NoiseBurst, &params(json!({"seed": 42})), 999).unwrap(),
        );
        a.activate(0.0);
        b.activate(0.0);
        for _ in 0..5 {
            assert_eq!(
                a.apply_sensor(Signal::VibrationRms, 2.0),
                b.apply_sensor(Signal::VibrationRms, 2.0)
            );
        }
    }

    #[test]
    fn test_invalid_params_rejected() {
        let err = Fault::from_params(FaultKind::SensorDrift, &params(json!({"signal": "torque"})), 0).unwrap_err();
        assert!(matches!(err, FaultError::InvalidParams { .. }));

        let err = Fault::from_params(FaultKind::BearingWear, &params(json!({"rate_per_sec": "fast"})), 0).unwrap_err();
        assert!(matches!(err, FaultError::InvalidParams { .. }));

        let err =
            Fault::from_params(FaultKind::NoiseBurst, &params(json!({"noise_amplitude": -1.0})), 0).unwrap_err();
        assert!(matches!(err, FaultError::InvalidParams { .. }));
    }

    #[test]
    fn test_out_of_range_progress_params_rejected() {
        for (kind, p) in [
            (FaultKind::BearingWear, json!({"rate_per_sec": -0.2})),
            (FaultKind::Clogging, json!({"resistance_factor": 0.5})),
            (FaultKind::Clogging, json!({"ramp_rate": -0.01})),
        ] {
            let err = Fault::from_params(kind, &params(p.clone()), 0).unwrap_err();
            assert!(
                matches!(err, FaultError::InvalidParams { fault, .. } if fault == kind.as_str()),
                "{p}"
            );
        }

        // Boundary values stay valid
        assert!(Fault::from_params(FaultKind::BearingWear, &params(json!({"rate_per_sec": 0.0})), 0).is_ok());
        assert!(Fault::from_params(FaultKind::Clogging, &params(json!({"resistance_factor": 1.0})), 0).is_ok());
        assert!(Fault::from_params(FaultKind::Clogging, &params(json!({"ramp_rate": 0.0})), 0).is_ok());
    }

    #[test]
    fn test_severity_stays_in_unit_range() {
        let mut models = PlantModels::default();
        let mut wear = instance(FaultKind::BearingWear, 0.0, json!({"rate_per_sec": 1.0}));
        let mut ramp = instance(FaultKind::Clogging, 0.0, json!({"ramp_rate": 5.0}));
        for t in 0..20 {
            wear.update(f64::from(t), 1.0, &mut models);
            ramp.update(f64::from(t), 1.0, &mut models);
            assert!((0.0..=1.0).contains(&wear.severity()));
            assert!((0.0..=1.0).contains(&ramp.severity()));
        }
        assert_eq!(wear.severity(), 1.0);
        assert_eq!(ramp.severity(), 1.0);
    }
}
