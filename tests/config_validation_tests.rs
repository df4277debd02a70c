//! Config Validation Tests
//!
//! Exercises TOML loading, typo detection, and rule validation through the
//! public config API, including the shipped example file.

use std::path::{Path, PathBuf};

use pumpguard::config::validation::{validate_physical_ranges, validate_unknown_keys};
use pumpguard::config::{ConfigError, PlantConfig};
use pumpguard::detector::ThresholdDetector;
use pumpguard::types::Signal;

fn example_config_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("pumpguard.toml.example")
}

fn validation_errors(toml_str: &str) -> Vec<String> {
    match PlantConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => errors,
        other => panic!("expected validation failure, got {other:?}"),
    }
}

// ============================================================================
// Example file
// ============================================================================

#[test]
fn example_config_loads_and_validates() {
    let config = PlantConfig::load_from_file(&example_config_path()).unwrap();
    assert_eq!(config.plant.plant_id, "plant01");
    assert_eq!(config.detector.window_sec, 60);

    let rpm = &config.detector.threshold_rules()[&Signal::Rpm];
    assert_eq!((rpm.min, rpm.max), (Some(2800.0), Some(3100.0)));
    let flow = &config.detector.threshold_rules()[&Signal::FlowM3h];
    assert_eq!(flow.warning_low, Some(45.0));
    assert_eq!(flow.critical_low, Some(30.0));
}

#[test]
fn example_config_has_no_unknown_keys() {
    let raw = std::fs::read_to_string(example_config_path()).unwrap();
    let warnings = validate_unknown_keys(&raw);
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
}

#[test]
fn example_config_physics_is_clean() {
    let config = PlantConfig::load_from_file(&example_config_path()).unwrap();
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty(), "{errors:?}");
    assert!(warnings.is_empty(), "{warnings:?}");
}

#[test]
fn detector_built_from_example_uses_overrides() {
    let config = PlantConfig::load_from_file(&example_config_path()).unwrap();
    let detector = ThresholdDetector::new(&config.detector);
    assert_eq!(detector.min_duration_sec(Signal::FlowM3h), 15.0);
    assert_eq!(detector.min_duration_sec(Signal::Rpm), 10.0);
    assert_eq!(detector.min_duration_sec(Signal::VibrationRms), 0.0);
    assert_eq!(
        detector.threshold_rule(Signal::Rpm).and_then(|r| r.max),
        Some(3100.0)
    );
}

// ============================================================================
// Typo detection
// ============================================================================

#[test]
fn typo_in_simulator_section_warns_with_suggestion() {
    let warnings = validate_unknown_keys(
        r#"
[simulator]
frequncy_hz = 2.0
"#,
    );
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("simulator.frequency_hz")
    );
}

#[test]
fn typo_does_not_block_loading() {
    let config = PlantConfig::from_toml_str(
        r#"
[monitor]
windw_sec = 30
"#,
    )
    .unwrap();
    // The misspelt key is ignored; the default stays
    assert_eq!(config.monitor.window_sec, 120);
}

// ============================================================================
// Rule validation
// ============================================================================

#[test]
fn inverted_high_alt_rule_is_rejected() {
    let errors = validation_errors(
        r#"
[detector.thresholds.pressure_bar]
warning_high = 20.0
critical_high = 15.0
"#,
    );
    assert!(
        errors.iter().any(|e| e.contains("thresholds.pressure_bar.high")),
        "{errors:?}"
    );
}

#[test]
fn inverted_range_is_rejected() {
    let errors = validation_errors(
        r#"
[detector.thresholds.rpm]
min = 3100.0
max = 2800.0
"#,
    );
    assert!(errors.iter().any(|e| e.contains("thresholds.rpm")), "{errors:?}");
}

#[test]
fn low_side_slope_escalation_checked() {
    // Flow slopes are negative; critical must be the steeper drop
    let errors = validation_errors(
        r#"
[detector.slope_thresholds.flow_m3h]
warning = -5.0
critical = -2.0
"#,
    );
    assert!(
        errors.iter().any(|e| e.contains("slope_thresholds.flow_m3h")),
        "{errors:?}"
    );
}

#[test]
fn errors_are_collected_not_short_circuited() {
    let errors = validation_errors(
        r#"
[pump]
nominal_efficiency = 1.5

[simulator]
frequency_hz = 0.0

[detector.thresholds.impeller_rpm]
max = 10.0
"#,
    );
    assert!(errors.len() >= 3, "{errors:?}");
    assert!(errors.iter().any(|e| e.contains("impeller_rpm")));
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn save_then_load_preserves_overrides() {
    let mut config = PlantConfig::default();
    config.plant.plant_id = "plant-north".to_string();
    config.simulator.speed = 0.0;
    config
        .detector
        .min_duration_overrides
        .insert("vibration_rms".to_string(), 5.0);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pumpguard.toml");
    config.save_to_file(&path).unwrap();

    let loaded = PlantConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.detector.min_duration_for(Signal::VibrationRms), 5.0);
}

#[test]
fn missing_file_is_io_error() {
    let err = PlantConfig::load_from_file(Path::new("/nonexistent/pumpguard.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}

#[test]
fn parse_error_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[simulator\nspeed = ").unwrap();

    let err = PlantConfig::load_from_file(&path).unwrap_err();
    match &err {
        ConfigError::Parse(p, _) => assert_eq!(p, &path),
        other => panic!("expected parse error, got {other:?}"),
    }
    assert!(err.to_string().contains("broken.toml"));
}
