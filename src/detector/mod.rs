//! Threshold/Trend Detector
//!
//! Turns one telemetry sample (plus, optionally, the asset's recent window)
//! into at most one `AlertEvent`.
//!
//! ## Rule families
//!
//! 1. **Threshold**: static limits per signal in four shapes (low, range,
//!    high, high with `_high` keys), evaluated in that order
//! 2. **Combination**: valve wide open while flow has collapsed, sustained
//! 3. **Slope**: secant rate of change over a window against trend limits
//!
//! Without a buffer only instantaneous threshold checks run. With a buffer,
//! threshold evidence gains window statistics, duration gating suppresses
//! transients, and the combination and slope rules become available.
//!
//! The detector holds no per-asset state; share it behind an `Arc`.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::debug;

use crate::config::DetectorConfig;
use crate::telemetry_buffer::TelemetryBuffer;
use crate::types::{
    AlertDetail, AlertEvent, DetectionMethod, Evidence, Severity, Side, Signal, SlopeRule,
    Telemetry, ThresholdRule, ValveFlowRule,
};

/// Synthetic signal name for the valve/flow combination rule
pub const VALVE_FLOW_MISMATCH: &str = "valve_flow_mismatch";

/// Warning limit used for comparison when a low rule has no `warning_low`
const LOW_WARNING_FALLBACK: f64 = 1.5;
/// Same, for `critical` rules without `warning`
const HIGH_WARNING_FALLBACK: f64 = 0.5;
/// Same, for `critical_high` rules without `warning_high`
const HIGH_ALT_WARNING_FALLBACK: f64 = 0.8;

/// Round to `decimals` places, half away from zero
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Threshold value for evidence; `null` when the limit came from a fallback
fn threshold_json(threshold: Option<f64>) -> Value {
    threshold.map_or(Value::Null, |t| json!(t))
}

// ============================================================================
// Duration Gate
// ============================================================================

/// Sustain check for one signal on one asset
struct DurationGate<'a> {
    buffer: &'a TelemetryBuffer,
    asset_id: &'a str,
    signal: Signal,
    min_duration_sec: f64,
    window_sec: u64,
}

impl DurationGate<'_> {
    fn sustained(&self, threshold: f64, side: Side) -> bool {
        let dur = self.buffer.duration_above_threshold(
            self.asset_id,
            self.signal,
            threshold,
            side,
            Some(self.window_sec),
            None,
        );
        dur >= self.min_duration_sec
    }

    /// Critical tier: the rule's first critical limit must have been held
    fn allows_critical(&self, rule: &ThresholdRule) -> bool {
        rule.gating_critical()
            .map_or(true, |crit| self.sustained(crit, rule.gating_side()))
    }

    /// Warning tier: only values inside the open warning band are gated
    fn allows_warning(&self, rule: &ThresholdRule, value: f64) -> bool {
        let Some(warn) = rule.gating_warning() else {
            return true;
        };
        let side = rule.gating_side();
        let in_band = match side {
            Side::Low => {
                let crit = rule.gating_critical().unwrap_or(f64::NEG_INFINITY);
                warn >= value && value > crit
            }
            Side::High => {
                let crit = rule.gating_critical().unwrap_or(f64::INFINITY);
                warn <= value && value < crit
            }
        };
        !in_band || self.sustained(warn, side)
    }
}

// ============================================================================
// Detector
// ============================================================================

/// A threshold breach before gating and evidence enrichment
struct Candidate {
    severity: Severity,
    /// Evidence `side` label (`low`, `high`, `range`)
    label: &'static str,
    /// Side used for the duration-in-breach evidence
    side: Side,
    /// Limit for evidence; `None` when a fallback limit matched
    threshold: Option<f64>,
    range: Option<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct ThresholdDetector {
    thresholds: BTreeMap<Signal, ThresholdRule>,
    slopes: BTreeMap<Signal, SlopeRule>,
    window_sec: u64,
    min_durations: BTreeMap<Signal, f64>,
    valve_flow: ValveFlowRule,
}

impl Default for ThresholdDetector {
    fn default() -> Self {
        Self::new(&DetectorConfig::default())
    }
}

impl ThresholdDetector {
    /// Build from config: default tables with the configured overrides on top
    pub fn new(config: &DetectorConfig) -> Self {
        let min_durations = Signal::ALL
            .into_iter()
            .map(|s| (s, config.min_duration_for(s)))
            .collect();
        Self {
            thresholds: config.threshold_rules(),
            slopes: config.slope_rules(),
            window_sec: config.window_sec,
            min_durations,
            valve_flow: config.valve_flow,
        }
    }

    /// Build from the global config (defaults when it was never initialized)
    pub fn from_config() -> Self {
        Self::new(&crate::config::get().detector)
    }

    pub const fn window_sec(&self) -> u64 {
        self.window_sec
    }

    pub fn threshold_rule(&self, signal: Signal) -> Option<&ThresholdRule> {
        self.thresholds.get(&signal)
    }

    pub fn slope_rule(&self, signal: Signal) -> Option<&SlopeRule> {
        self.slopes.get(&signal)
    }

    pub fn min_duration_sec(&self, signal: Signal) -> f64 {
        self.min_durations.get(&signal).copied().unwrap_or(0.0)
    }

    /// Evaluate every rule against one sample.
    ///
    /// `buffer` should already contain `telemetry`; window queries are
    /// anchored on the newest buffered point.
    pub fn detect(
        &self,
        telemetry: &Telemetry,
        buffer: Option<&TelemetryBuffer>,
    ) -> Option<AlertEvent> {
        let mut alerts = Vec::new();

        for signal in Signal::ALL {
            let (Some(rule), Some(value)) =
                (self.thresholds.get(&signal), telemetry.signals.reading(signal))
            else {
                continue;
            };
            self.check_thresholds(telemetry, buffer, signal, rule, value, &mut alerts);
        }

        if let Some(buffer) = buffer {
            if let Some(alert) = self.check_valve_flow(telemetry, buffer) {
                alerts.push(alert);
            }
            for (&signal, rule) in &self.slopes {
                if let Some(alert) = self.check_slope(telemetry, buffer, signal, rule) {
                    alerts.push(alert);
                }
            }
        }

        let severity = alerts.iter().map(|a| a.severity).max()?;
        Some(AlertEvent {
            ts: telemetry.ts,
            plant_id: telemetry.plant_id.clone(),
            asset_id: telemetry.asset_id.clone(),
            severity,
            alerts,
        })
    }

    // ------------------------------------------------------------------------
    // Threshold rules
    // ------------------------------------------------------------------------

    fn threshold_candidates(rule: &ThresholdRule, value: f64) -> Vec<Candidate> {
        let mut out = Vec::new();

        // Low side
        if let Some(crit) = rule.critical_low {
            let warn = rule.warning_low.unwrap_or(crit * LOW_WARNING_FALLBACK);
            if let Some(severity) = Self::tier(Side::Low, value, crit, warn) {
                out.push(Candidate {
                    severity,
                    label: "low",
                    side: Side::Low,
                    threshold: Self::evidence_threshold(severity, crit, rule.warning_low),
                    range: None,
                });
            }
        }

        // Range (warning only)
        if let (Some(min), Some(max)) = (rule.min, rule.max) {
            let breach = if value < min {
                Some((Side::Low, min))
            } else if value > max {
                Some((Side::High, max))
            } else {
                None
            };
            if let Some((side, limit)) = breach {
                out.push(Candidate {
                    severity: Severity::Warning,
                    label: "range",
                    side,
                    threshold: Some(limit),
                    range: Some((min, max)),
                });
            }
        }

        // High side, `critical`/`warning` keys
        if let (Some(crit), None) = (rule.critical, rule.critical_high) {
            let warn = rule.warning.unwrap_or(crit * HIGH_WARNING_FALLBACK);
            if let Some(severity) = Self::tier(Side::High, value, crit, warn) {
                out.push(Candidate {
                    severity,
                    label: "high",
                    side: Side::High,
                    threshold: Self::evidence_threshold(severity, crit, rule.warning),
                    range: None,
                });
            }
        }

        // High side, `critical_high`/`warning_high` keys
        if let Some(crit) = rule.critical_high {
            let warn = rule.warning_high.unwrap_or(crit * HIGH_ALT_WARNING_FALLBACK);
            if let Some(severity) = Self::tier(Side::High, value, crit, warn) {
                out.push(Candidate {
                    severity,
                    label: "high",
                    side: Side::High,
                    threshold: Self::evidence_threshold(severity, crit, rule.warning_high),
                    range: None,
                });
            }
        }

        out
    }

    fn tier(side: Side, value: f64, critical: f64, warning: f64) -> Option<Severity> {
        if side.breached(value, critical) {
            Some(Severity::Critical)
        } else if side.breached(value, warning) {
            Some(Severity::Warning)
        } else {
            None
        }
    }

    const fn evidence_threshold(
        severity: Severity,
        critical: f64,
        explicit_warning: Option<f64>,
    ) -> Option<f64> {
        match severity {
            Severity::Critical => Some(critical),
            Severity::Warning => explicit_warning,
        }
    }

    fn check_thresholds(
        &self,
        telemetry: &Telemetry,
        buffer: Option<&TelemetryBuffer>,
        signal: Signal,
        rule: &ThresholdRule,
        value: f64,
        alerts: &mut Vec<AlertDetail>,
    ) {
        let candidates = Self::threshold_candidates(rule, value);
        if candidates.is_empty() {
            return;
        }

        let min_duration_sec = self.min_duration_sec(signal);
        let gate = buffer
            .filter(|_| min_duration_sec > 0.0)
            .map(|buffer| DurationGate {
                buffer,
                asset_id: &telemetry.asset_id,
                signal,
                min_duration_sec,
                window_sec: self.window_sec,
            });

        for candidate in candidates {
            if let Some(gate) = &gate {
                let allowed = match (candidate.range, candidate.severity) {
                    (Some(_), _) => candidate
                        .threshold
                        .map_or(true, |limit| gate.sustained(limit, candidate.side)),
                    (None, Severity::Critical) => gate.allows_critical(rule),
                    (None, Severity::Warning) => gate.allows_warning(rule, value),
                };
                if !allowed {
                    debug!(
                        asset_id = %telemetry.asset_id,
                        signal = %signal,
                        severity = %candidate.severity,
                        min_duration_sec,
                        "Breach not yet sustained, suppressed"
                    );
                    continue;
                }
            }

            let mut evidence = Evidence::new();
            evidence.insert("value".into(), json!(value));
            evidence.insert("side".into(), json!(candidate.label));
            evidence.insert("threshold".into(), threshold_json(candidate.threshold));
            if let Some(buffer) = buffer {
                self.add_window_evidence(
                    &mut evidence,
                    buffer,
                    &telemetry.asset_id,
                    signal,
                    candidate.side,
                    candidate.threshold,
                );
            }
            if let Some((min, max)) = candidate.range {
                evidence.insert("min_rpm".into(), json!(min));
                evidence.insert("max_rpm".into(), json!(max));
            }

            alerts.push(AlertDetail {
                signal: signal.as_str().to_string(),
                score: value,
                method: DetectionMethod::Threshold,
                window_sec: self.window_sec,
                severity: candidate.severity,
                evidence,
            });
        }
    }

    fn add_window_evidence(
        &self,
        evidence: &mut Evidence,
        buffer: &TelemetryBuffer,
        asset_id: &str,
        signal: Signal,
        side: Side,
        threshold: Option<f64>,
    ) {
        let window = Some(self.window_sec);
        if let Some(threshold) = threshold {
            let dur = buffer.duration_above_threshold(asset_id, signal, threshold, side, window, None);
            let key = match side {
                Side::High => "duration_above_threshold",
                Side::Low => "duration_below_threshold",
            };
            evidence.insert(key.into(), json!(round_to(dur, 1)));
        }
        evidence.insert("window_sec".into(), json!(self.window_sec));

        let stats = buffer.compute_stats(asset_id, signal, window, None);
        if let Some(mean) = stats.mean {
            evidence.insert("mean".into(), json!(round_to(mean, 3)));
        }
        if let Some(std) = stats.std {
            evidence.insert("std".into(), json!(round_to(std, 3)));
        }
        if let Some(slope) = stats.slope {
            evidence.insert("slope".into(), json!(round_to(slope, 5)));
        }
    }

    // ------------------------------------------------------------------------
    // Combination rule
    // ------------------------------------------------------------------------

    fn check_valve_flow(&self, telemetry: &Telemetry, buffer: &TelemetryBuffer) -> Option<AlertDetail> {
        let rule = &self.valve_flow;
        let valve = telemetry.signals.reading(Signal::ValveOpenPct)?;
        let flow = telemetry.signals.reading(Signal::FlowM3h)?;
        if valve < rule.valve_min_pct || flow > rule.flow_max_m3h {
            return None;
        }

        let dur = buffer.duration_valve_flow_mismatch(
            &telemetry.asset_id,
            rule.valve_min_pct,
            rule.flow_max_m3h,
            Some(rule.window_sec),
            None,
        );
        if dur < rule.min_duration_sec {
            return None;
        }

        let mut evidence = Evidence::new();
        evidence.insert("valve_open_pct".into(), json!(round_to(valve, 1)));
        evidence.insert("flow_m3h".into(), json!(round_to(flow, 2)));
        evidence.insert("duration_sec".into(), json!(round_to(dur, 1)));
        evidence.insert("valve_min_pct".into(), json!(rule.valve_min_pct));
        evidence.insert("flow_max_m3h".into(), json!(rule.flow_max_m3h));

        Some(AlertDetail {
            signal: VALVE_FLOW_MISMATCH.to_string(),
            score: flow,
            method: DetectionMethod::Combination,
            window_sec: rule.window_sec,
            severity: Severity::Warning,
            evidence,
        })
    }

    // ------------------------------------------------------------------------
    // Slope rules
    // ------------------------------------------------------------------------

    fn check_slope(
        &self,
        telemetry: &Telemetry,
        buffer: &TelemetryBuffer,
        signal: Signal,
        rule: &SlopeRule,
    ) -> Option<AlertDetail> {
        let window_sec = rule.window_sec.unwrap_or(self.window_sec);
        let stats = buffer.compute_stats(&telemetry.asset_id, signal, Some(window_sec), None);
        if stats.count < 2 {
            return None;
        }
        let slope = stats.slope?;

        let (severity, threshold) = match (rule.critical, rule.warning) {
            (Some(crit), _) if rule.side.breached(slope, crit) => (Severity::Critical, crit),
            (_, Some(warn)) if rule.side.breached(slope, warn) => (Severity::Warning, warn),
            _ => return None,
        };

        let mut evidence = Evidence::new();
        evidence.insert("slope".into(), json!(round_to(slope, 5)));
        evidence.insert("window_sec".into(), json!(window_sec));
        evidence.insert("unit_per_sec".into(), json!("trend"));
        evidence.insert("threshold".into(), json!(threshold));
        evidence.insert("side".into(), json!(rule.side.as_str()));

        Some(AlertDetail {
            signal: signal.as_str().to_string(),
            score: slope,
            method: DetectionMethod::Slope,
            window_sec,
            severity,
            evidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::types::SignalSet;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn healthy() -> SignalSet {
        SignalSet {
            pressure_bar: 5.0,
            flow_m3h: 100.0,
            temp_c: 30.0,
            bearing_temp_c: 55.0,
            vibration_rms: 2.0,
            rpm: 1500.0,
            motor_current_a: 30.0,
            valve_open_pct: 60.0,
        }
    }

    fn sample(sec: i64, f: impl FnOnce(&mut SignalSet)) -> Telemetry {
        let mut signals = healthy();
        f(&mut signals);
        Telemetry {
            ts: t0() + Duration::seconds(sec),
            plant_id: "plant01".to_string(),
            asset_id: "pump01".to_string(),
            signals,
            truth: Default::default(),
        }
    }

    /// Feed `secs` one-second samples; returns the detection for the last one
    fn run(
        detector: &ThresholdDetector,
        secs: i64,
        f: impl Fn(i64, &mut SignalSet),
    ) -> (TelemetryBuffer, Option<AlertEvent>) {
        let mut buffer = TelemetryBuffer::default();
        let mut last = None;
        for i in 0..secs {
            let t = sample(i, |s| f(i, s));
            buffer.push(&t);
            last = detector.detect(&t, Some(&buffer));
        }
        (buffer, last)
    }

    fn detail<'a>(event: &'a AlertEvent, signal: &str, method: DetectionMethod) -> &'a AlertDetail {
        event
            .alerts
            .iter()
            .find(|a| a.signal == signal && a.method == method)
            .unwrap_or_else(|| panic!("no {method:?} detail for {signal}: {event:?}"))
    }

    fn has(event: Option<&AlertEvent>, signal: &str, method: DetectionMethod) -> bool {
        event.is_some_and(|e| {
            e.alerts
                .iter()
                .any(|a| a.signal == signal && a.method == method)
        })
    }

    #[test]
    fn test_healthy_sample_is_quiet() {
        let detector = ThresholdDetector::default();
        assert!(detector.detect(&sample(0, |_| {}), None).is_none());
    }

    #[test]
    fn test_vibration_critical_and_warning() {
        let detector = ThresholdDetector::default();

        let event = detector
            .detect(&sample(0, |s| s.vibration_rms = 18.5), None)
            .unwrap();
        assert_eq!(event.severity, Severity::Critical);
        let d = detail(&event, "vibration_rms", DetectionMethod::Threshold);
        assert_eq!(d.score, 18.5);
        assert_eq!(d.window_sec, 60);
        assert_eq!(d.evidence["threshold"], json!(18.0));
        assert_eq!(d.evidence["side"], json!("high"));

        let event = detector
            .detect(&sample(0, |s| s.vibration_rms = 7.5), None)
            .unwrap();
        assert_eq!(event.severity, Severity::Warning);
        assert_eq!(
            detail(&event, "vibration_rms", DetectionMethod::Threshold).evidence["threshold"],
            json!(7.1)
        );
    }

    #[test]
    fn test_fallback_warning_has_null_threshold() {
        let mut detector = ThresholdDetector::default();
        detector.thresholds.insert(
            Signal::VibrationRms,
            ThresholdRule {
                critical: Some(10.0),
                ..ThresholdRule::default()
            },
        );

        let event = detector
            .detect(&sample(0, |s| s.vibration_rms = 5.5), None)
            .unwrap();
        let d = detail(&event, "vibration_rms", DetectionMethod::Threshold);
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.evidence["threshold"], Value::Null);

        assert!(detector
            .detect(&sample(0, |s| s.vibration_rms = 4.9), None)
            .is_none());
    }

    #[test]
    fn test_high_alt_keys_shadow_plain_high() {
        let mut detector = ThresholdDetector::default();
        detector.thresholds.insert(
            Signal::PressureBar,
            ThresholdRule {
                critical: Some(10.0),
                warning: Some(8.0),
                ..ThresholdRule::high_alt(18.0, 25.0)
            },
        );
        assert!(detector
            .detect(&sample(0, |s| s.pressure_bar = 12.0), None)
            .is_none());
    }

    #[test]
    fn test_range_breach_is_warning_with_bounds() {
        let detector = ThresholdDetector::default();
        let event = detector
            .detect(&sample(0, |s| s.rpm = 1700.0), None)
            .unwrap();
        assert_eq!(event.severity, Severity::Warning);
        let d = detail(&event, "rpm", DetectionMethod::Threshold);
        assert_eq!(d.evidence["side"], json!("range"));
        assert_eq!(d.evidence["threshold"], json!(1600.0));
        assert_eq!(d.evidence["min_rpm"], json!(1400.0));
        assert_eq!(d.evidence["max_rpm"], json!(1600.0));
    }

    #[test]
    fn test_low_flow_critical_needs_sustain() {
        let detector = ThresholdDetector::default();

        let (_, event) = run(&detector, 6, |i, s| {
            if i > 0 {
                s.flow_m3h = 40.0;
            }
        });
        assert!(!has(event.as_ref(), "flow_m3h", DetectionMethod::Threshold));

        let (_, event) = run(&detector, 25, |_, s| s.flow_m3h = 40.0);
        let event = event.unwrap();
        let d = detail(&event, "flow_m3h", DetectionMethod::Threshold);
        assert_eq!(d.severity, Severity::Critical);
        assert_eq!(d.evidence["side"], json!("low"));
        assert_eq!(d.evidence["duration_below_threshold"], json!(24.0));
        assert_eq!(d.evidence["mean"], json!(40.0));
        assert_eq!(d.evidence["std"], json!(0.0));
        assert_eq!(d.evidence["slope"], json!(0.0));
    }

    #[test]
    fn test_low_flow_warning_band_gated_on_its_own_duration() {
        let detector = ThresholdDetector::default();
        let (_, event) = run(&detector, 20, |_, s| s.flow_m3h = 70.0);
        let event = event.unwrap();
        let d = detail(&event, "flow_m3h", DetectionMethod::Threshold);
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.evidence["threshold"], json!(80.0));
    }

    #[test]
    fn test_warning_gate_without_critical_uses_infinite_bound() {
        let (buffer, _) = run(&ThresholdDetector::default(), 5, |_, s| {
            s.flow_m3h = 70.0;
            s.vibration_rms = 2.0;
        });
        let gate = |signal| DurationGate {
            buffer: &buffer,
            asset_id: "pump01",
            signal,
            min_duration_sec: 10.0,
            window_sec: 120,
        };

        let low = ThresholdRule {
            warning_low: Some(80.0),
            ..ThresholdRule::default()
        };
        let flow = gate(Signal::FlowM3h);
        // Nothing is below the band, so every value under the warning is held back
        assert!(!flow.allows_warning(&low, 70.0));
        assert!(!flow.allows_warning(&low, -1.0e9));
        assert!(flow.allows_warning(&low, 90.0));

        // With a critical bound, values past it leave the band
        let bounded = ThresholdRule {
            critical_low: Some(50.0),
            ..low
        };
        assert!(!flow.allows_warning(&bounded, 70.0));
        assert!(flow.allows_warning(&bounded, 40.0));

        let high = ThresholdRule {
            warning: Some(7.1),
            ..ThresholdRule::default()
        };
        let vibration = gate(Signal::VibrationRms);
        assert!(!vibration.allows_warning(&high, 1.0e9));
        assert!(vibration.allows_warning(&high, 2.0));

        // Sustained below the warning for long enough, the gate opens
        let sustained = DurationGate {
            min_duration_sec: 4.0,
            ..gate(Signal::FlowM3h)
        };
        assert!(sustained.allows_warning(&low, 70.0));
    }

    #[test]
    fn test_rpm_range_gated_by_duration() {
        let detector = ThresholdDetector::default();
        let (_, short) = run(&detector, 5, |_, s| s.rpm = 1700.0);
        assert!(short.map_or(true, |e| !e.mentions("rpm")));
        let (_, long) = run(&detector, 15, |_, s| s.rpm = 1700.0);
        assert!(long.unwrap().mentions("rpm"));
    }

    #[test]
    fn test_flow_drop_slope_warning() {
        let detector = ThresholdDetector::default();
        // 100 → 70 over the last 10 s: -3 m³/h per second
        let (_, event) = run(&detector, 11, |i, s| s.flow_m3h = 100.0 - 3.0 * i as f64);
        let event = event.unwrap();
        let d = detail(&event, "flow_m3h", DetectionMethod::Slope);
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.window_sec, 10);
        assert_eq!(d.evidence["slope"], json!(-3.0));
        assert_eq!(d.evidence["threshold"], json!(-2.0));
        assert_eq!(d.evidence["side"], json!("low"));
        assert_eq!(d.evidence["unit_per_sec"], json!("trend"));
    }

    #[test]
    fn test_slope_critical_wins() {
        let detector = ThresholdDetector::default();
        let (_, event) = run(&detector, 6, |i, s| s.motor_current_a = 30.0 + i as f64);
        let d = detail(&event.unwrap(), "motor_current_a", DetectionMethod::Slope).clone();
        assert_eq!(d.severity, Severity::Critical);
        assert_eq!(d.evidence["threshold"], json!(0.8));
    }

    #[test]
    fn test_valve_flow_mismatch_combination() {
        let mut config = DetectorConfig::default();
        // Silence the flow threshold so only the combination fires
        config
            .min_duration_overrides
            .insert("flow_m3h".to_string(), 1000.0);
        let detector = ThresholdDetector::new(&config);

        let (_, event) = run(&detector, 30, |_, s| {
            s.valve_open_pct = 90.0;
            s.flow_m3h = 40.0;
        });
        let event = event.unwrap();
        let d = detail(&event, VALVE_FLOW_MISMATCH, DetectionMethod::Combination);
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.score, 40.0);
        assert_eq!(d.window_sec, 60);
        assert_eq!(d.evidence["duration_sec"], json!(29.0));
        assert_eq!(d.evidence["valve_min_pct"], json!(80.0));
    }

    #[test]
    fn test_combination_needs_buffer() {
        let detector = ThresholdDetector::default();
        let t = sample(0, |s| {
            s.valve_open_pct = 90.0;
            s.flow_m3h = 40.0;
        });
        let event = detector.detect(&t, None).unwrap();
        assert!(!event.mentions(VALVE_FLOW_MISMATCH));
    }

    #[test]
    fn test_event_severity_is_max_over_details() {
        let detector = ThresholdDetector::default();
        let event = detector
            .detect(
                &sample(0, |s| {
                    s.vibration_rms = 8.0;
                    s.bearing_temp_c = 90.0;
                }),
                None,
            )
            .unwrap();
        assert_eq!(event.alerts.len(), 2);
        assert_eq!(event.severity, Severity::Critical);
        assert_eq!(event.ts, t0());
        assert_eq!(event.asset_id, "pump01");
    }

    #[test]
    fn test_unknown_override_signal_ignored() {
        let mut config = DetectorConfig::default();
        config
            .thresholds
            .insert("torque".to_string(), ThresholdRule::high(1.0, 2.0));
        let detector = ThresholdDetector::new(&config);
        assert_eq!(detector.thresholds.len(), 7);
    }
}
