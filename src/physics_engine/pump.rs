//! Centrifugal pump head/flow curve with affinity-law speed scaling
//!
//! `H(Q, n) = H_shutoff·(n/n_N)² − a·Q²`, where `H_shutoff = 1.2·H_N` and
//! `a` is fitted so the curve passes through the rated point `(Q_N, H_N)`.

use serde::{Deserialize, Serialize};

use super::{GRAVITY, WATER_DENSITY};

/// Shutoff head as a multiple of rated head
const SHUTOFF_HEAD_RATIO: f64 = 1.2;

/// Efficiency never drops below this, even far off the best-efficiency point
pub const MIN_EFFICIENCY: f64 = 0.3;

/// Operating point solver iteration cap
const SOLVER_MAX_ITERATIONS: usize = 50;

/// Operating point solver tolerance (m of head)
const SOLVER_TOLERANCE_M: f64 = 0.01;

/// Rated duty point of the pump
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PumpParams {
    pub nominal_rpm: f64,
    pub nominal_flow_m3h: f64,
    pub nominal_head_m: f64,
    /// Best-efficiency-point efficiency (0-1)
    pub nominal_efficiency: f64,
}

impl Default for PumpParams {
    fn default() -> Self {
        Self {
            nominal_rpm: 2950.0,
            nominal_flow_m3h: 100.0,
            nominal_head_m: 50.0,
            nominal_efficiency: 0.75,
        }
    }
}

/// Solved intersection of the pump and system curves
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatingPoint {
    pub flow_m3h: f64,
    pub head_m: f64,
}

#[derive(Debug, Clone)]
pub struct PumpModel {
    params: PumpParams,
    shutoff_head_m: f64,
    curve_coeff: f64,
}

impl PumpModel {
    pub fn new(params: PumpParams) -> Self {
        let shutoff_head_m = params.nominal_head_m * SHUTOFF_HEAD_RATIO;
        let curve_coeff = if params.nominal_flow_m3h > 0.0 {
            (shutoff_head_m - params.nominal_head_m) / params.nominal_flow_m3h.powi(2)
        } else {
            0.0
        };
        Self {
            params,
            shutoff_head_m,
            curve_coeff,
        }
    }

    pub const fn params(&self) -> &PumpParams {
        &self.params
    }

    fn speed_ratio(&self, rpm: f64) -> f64 {
        if self.params.nominal_rpm > 0.0 {
            rpm / self.params.nominal_rpm
        } else {
            0.0
        }
    }

    /// Pump head (m) at `flow_m3h` and `rpm`, never negative
    pub fn head(&self, flow_m3h: f64, rpm: f64) -> f64 {
        let n = self.speed_ratio(rpm);
        let h = self.shutoff_head_m * n * n - self.curve_coeff * flow_m3h * flow_m3h;
        h.max(0.0)
    }

    /// Upper flow bound for the solver: rated flow scaled by speed and valve opening
    pub fn max_flow(&self, rpm: f64, valve_open_pct: f64) -> f64 {
        self.params.nominal_flow_m3h * self.speed_ratio(rpm) * (valve_open_pct / 100.0)
    }

    /// Find `Q` where pump head meets `system_head(Q)` by bisection over `[0, Q_max]`.
    ///
    /// Stops early once the head mismatch is under tolerance; otherwise returns
    /// the midpoint of the final bracket.
    pub fn solve_operating_point<F>(&self, rpm: f64, valve_open_pct: f64, system_head: F) -> OperatingPoint
    where
        F: Fn(f64) -> f64,
    {
        let mut q_low = 0.0;
        let mut q_high = self.max_flow(rpm, valve_open_pct);

        for _ in 0..SOLVER_MAX_ITERATIONS {
            let q_mid = (q_low + q_high) / 2.0;
            let h_pump = self.head(q_mid, rpm);
            let diff = h_pump - system_head(q_mid);

            if diff.abs() < SOLVER_TOLERANCE_M {
                return OperatingPoint {
                    flow_m3h: q_mid,
                    head_m: h_pump,
                };
            }
            if diff > 0.0 {
                q_low = q_mid;
            } else {
                q_high = q_mid;
            }
        }

        let flow_m3h = (q_low + q_high) / 2.0;
        OperatingPoint {
            flow_m3h,
            head_m: self.head(flow_m3h, rpm),
        }
    }

    /// Hydraulic efficiency: parabola centred on the speed-scaled BEP flow,
    /// clamped to `[MIN_EFFICIENCY, nominal_efficiency]`
    pub fn efficiency(&self, flow_m3h: f64, rpm: f64) -> f64 {
        let q_opt = self.params.nominal_flow_m3h * self.speed_ratio(rpm);
        if q_opt <= 0.0 {
            return MIN_EFFICIENCY;
        }
        let deviation = (flow_m3h - q_opt) / q_opt;
        let eta = self.params.nominal_efficiency * (1.0 - deviation * deviation);
        eta.min(self.params.nominal_efficiency).max(MIN_EFFICIENCY)
    }
}

/// Shaft power (kW) for a duty point: `ρ·g·Q·H/η`
pub fn shaft_power_kw(flow_m3h: f64, head_m: f64, efficiency: f64) -> f64 {
    if efficiency <= 0.0 {
        return 0.0;
    }
    let q_m3s = flow_m3h / 3600.0;
    WATER_DENSITY * GRAVITY * q_m3s * head_m / efficiency / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pump() -> PumpModel {
        PumpModel::new(PumpParams::default())
    }

    #[test]
    fn test_head_at_rated_point() {
        let p = pump();
        assert!((p.head(0.0, 2950.0) - 60.0).abs() < 1e-9, "shutoff = 1.2 * H_N");
        assert!((p.head(100.0, 2950.0) - 50.0).abs() < 1e-9, "curve passes through rated point");
    }

    #[test]
    fn test_head_affinity_law() {
        let p = pump();
        // Half speed => quarter shutoff head
        assert!((p.head(0.0, 1475.0) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_head_never_negative() {
        assert_eq!(pump().head(1000.0, 2950.0), 0.0);
    }

    #[test]
    fn test_efficiency_peak_and_floor() {
        let p = pump();
        assert!((p.efficiency(100.0, 2950.0) - 0.75).abs() < 1e-12);
        assert_eq!(p.efficiency(0.0, 2950.0), MIN_EFFICIENCY);
        assert_eq!(p.efficiency(50.0, 0.0), MIN_EFFICIENCY);
        // 40% off BEP: 0.75 * (1 - 0.16)
        assert!((p.efficiency(60.0, 2950.0) - 0.63).abs() < 1e-12);
    }

    #[test]
    fn test_shaft_power() {
        // 36 m³/h = 0.01 m³/s, 10 m, eta 0.981 => 1000 W
        let p = shaft_power_kw(36.0, 10.0, 0.981);
        assert!((p - 1.0).abs() < 1e-9);
        assert_eq!(shaft_power_kw(50.0, 40.0, 0.0), 0.0);
    }

    #[test]
    fn test_solver_finds_intersection() {
        let p = pump();
        // Flat 55 m system curve: 60 - 0.001 Q² = 55 => Q = 70.71
        let op = p.solve_operating_point(2950.0, 100.0, |_| 55.0);
        assert!((op.flow_m3h - 70.71).abs() < 0.1, "got {}", op.flow_m3h);
        assert!((op.head_m - 55.0).abs() < 0.01);
    }

    #[test]
    fn test_solver_flow_monotone_in_valve() {
        let p = pump();
        let system = |q: f64| 645.0 * (q / 3600.0).powi(2) + 10.0;
        let mut last = -1.0;
        for valve in (0..=100).step_by(5) {
            let op = p.solve_operating_point(2950.0, f64::from(valve), system);
            if valve > 0 {
                assert!(op.flow_m3h > last, "flow must rise with valve ({valve}%)");
            }
            last = op.flow_m3h;
        }
    }

    #[test]
    fn test_solver_closed_valve_gives_zero_flow() {
        let op = pump().solve_operating_point(2950.0, 0.0, |_| 10.0);
        assert_eq!(op.flow_m3h, 0.0);
    }
}
