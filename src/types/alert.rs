//! Alert events emitted by the threshold/trend detector

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity. Ordering is significant: `Critical > Warning`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which rule family produced an alert detail
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Instantaneous value against a static limit
    Threshold,
    /// Rate of change over a window
    Slope,
    /// Joint condition across two signals
    Combination,
}

/// Free-form evidence attached to an alert (values, thresholds, window stats)
pub type Evidence = serde_json::Map<String, serde_json::Value>;

/// A single rule breach
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertDetail {
    /// Signal name, or a synthetic name for combination rules
    pub signal: String,
    /// Breached value (threshold rules) or slope (trend rules)
    pub score: f64,
    pub method: DetectionMethod,
    pub window_sec: u64,
    /// Severity of this detail alone
    pub severity: Severity,
    #[serde(default)]
    pub evidence: Evidence,
}

/// Every breach found for one telemetry sample
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertEvent {
    pub ts: DateTime<Utc>,
    pub plant_id: String,
    pub asset_id: String,
    /// Highest severity among `alerts`
    pub severity: Severity,
    pub alerts: Vec<AlertDetail>,
}

impl AlertEvent {
    /// True when any detail came from the given signal
    pub fn mentions(&self, signal: &str) -> bool {
        self.alerts.iter().any(|a| a.signal == signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_outranks_warning() {
        assert!(Severity::Critical > Severity::Warning);
        assert_eq!(
            [Severity::Warning, Severity::Critical, Severity::Warning]
                .into_iter()
                .max(),
            Some(Severity::Critical)
        );
    }

    #[test]
    fn test_alert_serialises_snake_case() {
        let detail = AlertDetail {
            signal: "vibration_rms".to_string(),
            score: 18.5,
            method: DetectionMethod::Threshold,
            window_sec: 60,
            severity: Severity::Critical,
            evidence: Evidence::new(),
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["method"], "threshold");
        assert_eq!(json["severity"], "critical");
    }
}
