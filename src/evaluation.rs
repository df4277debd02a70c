//! Detection scorecard: how well the detector caught an injected fault.
//!
//! Fed sample by sample alongside the detector. The ground-truth label on
//! each sample marks fault onset; alerts before onset count as false alarms,
//! the first alert at or after onset sets the detection latency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detector::round_to;
use crate::types::{AlertEvent, FaultKind, Severity, Telemetry};

/// Outcome of one scenario run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScorecardReport {
    /// First fault label seen in ground truth, `none` for a healthy run
    pub fault: FaultKind,
    pub samples: u64,
    pub onset_ts: Option<DateTime<Utc>>,
    pub first_alert_ts: Option<DateTime<Utc>>,
    /// An alert was raised at or after fault onset
    pub detected: bool,
    /// Seconds from onset to the first alert (2 decimals)
    pub latency_sec: Option<f64>,
    /// Alerts raised while ground truth was still healthy
    pub false_alerts: u64,
    pub total_alerts: u64,
    pub warning_alerts: u64,
    pub critical_alerts: u64,
}

#[derive(Debug, Clone, Default)]
pub struct DetectionScorecard {
    fault: FaultKind,
    samples: u64,
    onset_ts: Option<DateTime<Utc>>,
    first_alert_ts: Option<DateTime<Utc>>,
    false_alerts: u64,
    total_alerts: u64,
    warning_alerts: u64,
    critical_alerts: u64,
}

impl DetectionScorecard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample and the detector's verdict on it
    pub fn observe(&mut self, telemetry: &Telemetry, alert: Option<&AlertEvent>) {
        self.samples += 1;

        if self.onset_ts.is_none() && telemetry.truth.fault != FaultKind::None {
            self.onset_ts = Some(telemetry.ts);
            self.fault = telemetry.truth.fault;
        }

        let Some(alert) = alert else {
            return;
        };
        self.total_alerts += 1;
        match alert.severity {
            Severity::Warning => self.warning_alerts += 1,
            Severity::Critical => self.critical_alerts += 1,
        }

        match self.onset_ts {
            None => self.false_alerts += 1,
            Some(onset) if self.first_alert_ts.is_none() && alert.ts >= onset => {
                self.first_alert_ts = Some(alert.ts);
            }
            Some(_) => {}
        }
    }

    pub fn report(&self) -> ScorecardReport {
        let latency_sec = self
            .onset_ts
            .zip(self.first_alert_ts)
            .and_then(|(onset, first)| (first - onset).to_std().ok())
            .map(|d| round_to(d.as_secs_f64(), 2));

        ScorecardReport {
            fault: self.fault,
            samples: self.samples,
            onset_ts: self.onset_ts,
            first_alert_ts: self.first_alert_ts,
            detected: self.first_alert_ts.is_some(),
            latency_sec,
            false_alerts: self.false_alerts,
            total_alerts: self.total_alerts,
            warning_alerts: self.warning_alerts,
            critical_alerts: self.critical_alerts,
        }
    }
}

// ============================================================================
// Aggregate
// ============================================================================

/// Roll-up across several scenario runs
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvaluationSummary {
    pub scenario_runs: usize,
    /// Runs with an injected fault
    pub fault_runs: usize,
    pub detection_count: usize,
    /// `detection_count / fault_runs` (4 decimals), 0 without fault runs
    pub detection_rate: f64,
    pub avg_latency_sec: Option<f64>,
    pub false_alerts: u64,
}

impl EvaluationSummary {
    pub fn from_reports(reports: &[ScorecardReport]) -> Self {
        let fault_runs = reports.iter().filter(|r| r.fault != FaultKind::None).count();
        let detection_count = reports.iter().filter(|r| r.detected).count();
        let latencies: Vec<f64> = reports.iter().filter_map(|r| r.latency_sec).collect();

        #[allow(clippy::cast_precision_loss)]
        let detection_rate = if fault_runs == 0 {
            0.0
        } else {
            round_to(detection_count as f64 / fault_runs as f64, 4)
        };
        #[allow(clippy::cast_precision_loss)]
        let avg_latency_sec = (!latencies.is_empty())
            .then(|| round_to(latencies.iter().sum::<f64>() / latencies.len() as f64, 2));

        Self {
            scenario_runs: reports.len(),
            fault_runs,
            detection_count,
            detection_rate,
            avg_latency_sec,
            false_alerts: reports.iter().map(|r| r.false_alerts).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SignalSet, TelemetryTruth};
    use chrono::{Duration, TimeZone};

    fn origin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn sample(sec: i64, fault: FaultKind) -> Telemetry {
        Telemetry {
            ts: origin() + Duration::seconds(sec),
            plant_id: "plant01".to_string(),
            asset_id: "pump01".to_string(),
            signals: SignalSet::default(),
            truth: TelemetryTruth {
                fault,
                severity: if fault == FaultKind::None { 0.0 } else { 0.5 },
            },
        }
    }

    fn alert(t: &Telemetry, severity: Severity) -> AlertEvent {
        AlertEvent {
            ts: t.ts,
            plant_id: t.plant_id.clone(),
            asset_id: t.asset_id.clone(),
            severity,
            alerts: Vec::new(),
        }
    }

    #[test]
    fn test_latency_from_onset_to_first_alert() {
        let mut card = DetectionScorecard::new();
        for sec in 0..10 {
            card.observe(&sample(sec, FaultKind::None), None);
        }
        for sec in 10..20 {
            let t = sample(sec, FaultKind::BearingWear);
            let a = (sec >= 14).then(|| alert(&t, Severity::Warning));
            card.observe(&t, a.as_ref());
        }

        let report = card.report();
        assert_eq!(report.fault, FaultKind::BearingWear);
        assert!(report.detected);
        assert_eq!(report.latency_sec, Some(4.0));
        assert_eq!(report.false_alerts, 0);
        assert_eq!(report.total_alerts, 6);
        assert_eq!(report.warning_alerts, 6);
        assert_eq!(report.samples, 20);
    }

    #[test]
    fn test_alerts_before_onset_are_false() {
        let mut card = DetectionScorecard::new();
        let early = sample(2, FaultKind::None);
        card.observe(&early, Some(&alert(&early, Severity::Critical)));
        card.observe(&sample(5, FaultKind::Clogging), None);

        let report = card.report();
        assert_eq!(report.false_alerts, 1);
        assert_eq!(report.critical_alerts, 1);
        assert!(!report.detected);
        assert_eq!(report.latency_sec, None);
    }

    #[test]
    fn test_healthy_run_never_detects() {
        let mut card = DetectionScorecard::new();
        card.observe(&sample(0, FaultKind::None), None);
        let report = card.report();
        assert_eq!(report.fault, FaultKind::None);
        assert_eq!(report.onset_ts, None);
        assert!(!report.detected);
    }

    #[test]
    fn test_summary_rates() {
        let detected = ScorecardReport {
            fault: FaultKind::Clogging,
            samples: 100,
            onset_ts: Some(origin()),
            first_alert_ts: Some(origin() + Duration::seconds(3)),
            detected: true,
            latency_sec: Some(3.0),
            false_alerts: 0,
            total_alerts: 5,
            warning_alerts: 5,
            critical_alerts: 0,
        };
        let missed = ScorecardReport {
            fault: FaultKind::SensorDrift,
            detected: false,
            latency_sec: None,
            first_alert_ts: None,
            total_alerts: 0,
            warning_alerts: 0,
            ..detected.clone()
        };
        let healthy = ScorecardReport {
            fault: FaultKind::None,
            onset_ts: None,
            false_alerts: 2,
            ..missed.clone()
        };

        let summary = EvaluationSummary::from_reports(&[detected, missed, healthy]);
        assert_eq!(summary.scenario_runs, 3);
        assert_eq!(summary.fault_runs, 2);
        assert_eq!(summary.detection_count, 1);
        assert_eq!(summary.detection_rate, 0.5);
        assert_eq!(summary.avg_latency_sec, Some(3.0));
        assert_eq!(summary.false_alerts, 2);
    }
}
