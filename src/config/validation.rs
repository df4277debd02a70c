//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physical range checks.
//!
//! Two-pass parse: the raw TOML is first walked as a `toml::Value` tree and
//! every dotted key is compared against the known key patterns, producing
//! "did you mean?" warnings. Normal serde deserialization follows. Warnings
//! never break a config.

use std::collections::HashSet;

use super::PlantConfig;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, ", did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Valid dotted key patterns for `PlantConfig`. A `*` segment matches any
/// single key (signal names in the detector tables).
///
/// Maintained by hand against the structs in `plant_config.rs`.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [plant]
        "plant",
        "plant.plant_id",
        "plant.default_asset_id",
        // [pump]
        "pump",
        "pump.nominal_rpm",
        "pump.nominal_flow_m3h",
        "pump.nominal_head_m",
        "pump.nominal_efficiency",
        // [pipe]
        "pipe",
        "pipe.pipe_length_m",
        "pipe.pipe_diameter_m",
        "pipe.pipe_roughness_mm",
        "pipe.fitting_loss_coefficient",
        "pipe.static_head_m",
        // [bearing]
        "bearing",
        "bearing.base_vibration_mm_s",
        "bearing.base_bearing_temp_c",
        "bearing.ambient_temp_c",
        // [motor]
        "motor",
        "motor.rated_voltage_v",
        "motor.motor_efficiency",
        "motor.power_factor",
        "motor.no_load_current_a",
        // [simulator]
        "simulator",
        "simulator.frequency_hz",
        "simulator.speed",
        "simulator.telemetry_channel_capacity",
        // [monitor]
        "monitor",
        "monitor.window_sec",
        "monitor.max_points_per_asset",
        // [detector]
        "detector",
        "detector.window_sec",
        "detector.min_duration_sec",
        "detector.min_duration_overrides",
        "detector.min_duration_overrides.*",
        "detector.thresholds",
        "detector.thresholds.*",
        "detector.thresholds.*.warning",
        "detector.thresholds.*.critical",
        "detector.thresholds.*.warning_high",
        "detector.thresholds.*.critical_high",
        "detector.thresholds.*.warning_low",
        "detector.thresholds.*.critical_low",
        "detector.thresholds.*.min",
        "detector.thresholds.*.max",
        "detector.slope_thresholds",
        "detector.slope_thresholds.*",
        "detector.slope_thresholds.*.side",
        "detector.slope_thresholds.*.warning",
        "detector.slope_thresholds.*.critical",
        "detector.slope_thresholds.*.window_sec",
        "detector.valve_flow",
        "detector.valve_flow.valve_min_pct",
        "detector.valve_flow.flow_max_m3h",
        "detector.valve_flow.min_duration_sec",
        "detector.valve_flow.window_sec",
    ];
    keys.iter().copied().collect()
}

/// Whether `key` matches `pattern`, segment by segment
fn matches_pattern(key: &str, pattern: &str) -> bool {
    let mut k = key.split('.');
    let mut p = pattern.split('.');
    loop {
        match (k.next(), p.next()) {
            (None, None) => return true,
            (Some(ks), Some(ps)) if ps == "*" || ps == ks => {}
            _ => return false,
        }
    }
}

fn is_known(key: &str, known: &HashSet<&str>) -> bool {
    known.contains(key) || known.iter().any(|p| p.contains('*') && matches_pattern(key, p))
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Wildcard patterns are compared with their `*` replaced by the matching
/// segment of the unknown key, so `detector.thresholds.rpm.mxa` suggests
/// `detector.thresholds.rpm.max`.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let segments: Vec<&str> = unknown.split('.').collect();
    let mut best: Option<(String, usize)> = None;
    for &pattern in known {
        let candidate = if pattern.contains('*') {
            pattern
                .split('.')
                .enumerate()
                .map(|(i, p)| {
                    if p == "*" {
                        segments.get(i).copied().unwrap_or(p)
                    } else {
                        p
                    }
                })
                .collect::<Vec<_>>()
                .join(".")
        } else {
            pattern.to_string()
        };
        let dist = levenshtein(unknown, &candidate);
        if dist <= 3 && best.as_ref().map_or(true, |(_, d)| dist < *d) {
            best = Some((candidate, dist));
        }
    }
    best.map(|(k, _)| k)
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Never fails: parse errors surface later from serde.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !is_known(key, &known))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Physical Range Validation
// ============================================================================

fn require_positive(value: f64, name: &str, errors: &mut Vec<String>) {
    if !(value.is_finite() && value > 0.0) {
        errors.push(format!("{name} = {value} must be > 0"));
    }
}

fn require_fraction(value: f64, name: &str, errors: &mut Vec<String>) {
    if !(value.is_finite() && value > 0.0 && value <= 1.0) {
        errors.push(format!("{name} = {value} must be in (0, 1]"));
    }
}

/// Validate physical ranges on a parsed `PlantConfig`.
///
/// Returns (errors, warnings). Errors are impossible values that must
/// prevent startup; warnings are suspicious but not fatal.
pub fn validate_physical_ranges(config: &PlantConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let pump = &config.pump;
    require_positive(pump.nominal_rpm, "pump.nominal_rpm", &mut errors);
    require_positive(pump.nominal_flow_m3h, "pump.nominal_flow_m3h", &mut errors);
    require_positive(pump.nominal_head_m, "pump.nominal_head_m", &mut errors);
    require_fraction(pump.nominal_efficiency, "pump.nominal_efficiency", &mut errors);

    let pipe = &config.pipe;
    require_positive(pipe.pipe_length_m, "pipe.pipe_length_m", &mut errors);
    require_positive(pipe.pipe_diameter_m, "pipe.pipe_diameter_m", &mut errors);
    if !(pipe.pipe_roughness_mm.is_finite() && pipe.pipe_roughness_mm >= 0.0) {
        errors.push(format!(
            "pipe.pipe_roughness_mm = {} cannot be negative",
            pipe.pipe_roughness_mm
        ));
    }
    if !(pipe.fitting_loss_coefficient.is_finite() && pipe.fitting_loss_coefficient >= 0.0) {
        errors.push(format!(
            "pipe.fitting_loss_coefficient = {} cannot be negative",
            pipe.fitting_loss_coefficient
        ));
    }
    if !pipe.static_head_m.is_finite() {
        errors.push("pipe.static_head_m must be finite".to_string());
    } else if pipe.static_head_m >= pump.nominal_head_m {
        warnings.push(ValidationWarning {
            field: "pipe.static_head_m".to_string(),
            message: format!(
                "pipe.static_head_m = {:.1} is at or above the pump shut-off head ({:.1} m); the pump cannot deliver flow",
                pipe.static_head_m, pump.nominal_head_m
            ),
            suggestion: None,
        });
    }

    let bearing = &config.bearing;
    require_positive(
        bearing.base_vibration_mm_s,
        "bearing.base_vibration_mm_s",
        &mut errors,
    );
    if !bearing.base_bearing_temp_c.is_finite() || !bearing.ambient_temp_c.is_finite() {
        errors.push("bearing temperatures must be finite".to_string());
    }

    let motor = &config.motor;
    require_positive(motor.rated_voltage_v, "motor.rated_voltage_v", &mut errors);
    require_fraction(motor.motor_efficiency, "motor.motor_efficiency", &mut errors);
    require_fraction(motor.power_factor, "motor.power_factor", &mut errors);
    if !(motor.no_load_current_a.is_finite() && motor.no_load_current_a >= 0.0) {
        errors.push(format!(
            "motor.no_load_current_a = {} cannot be negative",
            motor.no_load_current_a
        ));
    }

    let sim = &config.simulator;
    require_positive(sim.frequency_hz, "simulator.frequency_hz", &mut errors);
    if !(sim.speed.is_finite() && sim.speed >= 0.0) {
        errors.push(format!("simulator.speed = {} cannot be negative", sim.speed));
    }
    if sim.telemetry_channel_capacity == 0 {
        errors.push("simulator.telemetry_channel_capacity must be > 0".to_string());
    }
    if sim.frequency_hz > 100.0 {
        warnings.push(ValidationWarning {
            field: "simulator.frequency_hz".to_string(),
            message: format!(
                "simulator.frequency_hz = {:.1} is unusually high for plant telemetry",
                sim.frequency_hz
            ),
            suggestion: None,
        });
    }

    if config.monitor.window_sec == 0 {
        errors.push("monitor.window_sec must be > 0".to_string());
    }
    if config.monitor.max_points_per_asset == 0 {
        errors.push("monitor.max_points_per_asset must be > 0".to_string());
    }

    let det = &config.detector;
    if det.window_sec == 0 {
        errors.push("detector.window_sec must be > 0".to_string());
    }
    if !(det.min_duration_sec.is_finite() && det.min_duration_sec >= 0.0) {
        errors.push(format!(
            "detector.min_duration_sec = {} cannot be negative",
            det.min_duration_sec
        ));
    }
    if det.window_sec > config.monitor.window_sec {
        warnings.push(ValidationWarning {
            field: "detector.window_sec".to_string(),
            message: format!(
                "detector.window_sec = {} exceeds monitor.window_sec = {}; older points are already evicted",
                det.window_sec, config.monitor.window_sec
            ),
            suggestion: None,
        });
    }

    let vf = &det.valve_flow;
    if !(0.0..=100.0).contains(&vf.valve_min_pct) {
        errors.push(format!(
            "detector.valve_flow.valve_min_pct = {} is outside 0-100 %",
            vf.valve_min_pct
        ));
    }
    if !(vf.flow_max_m3h.is_finite() && vf.flow_max_m3h >= 0.0) {
        errors.push(format!(
            "detector.valve_flow.flow_max_m3h = {} cannot be negative",
            vf.flow_max_m3h
        ));
    }
    if !(vf.min_duration_sec.is_finite() && vf.min_duration_sec >= 0.0) {
        errors.push(format!(
            "detector.valve_flow.min_duration_sec = {} cannot be negative",
            vf.min_duration_sec
        ));
    }
    if vf.window_sec == 0 {
        errors.push("detector.valve_flow.window_sec must be > 0".to_string());
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
