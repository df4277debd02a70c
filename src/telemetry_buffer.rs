//! Per-asset sliding window of recent telemetry
//!
//! Points are kept timestamp-sorted and evicted on every push, by age
//! (`window_sec` behind the newest point) and then by count
//! (`max_points_per_asset`, oldest first). Query windows are anchored on the
//! newest buffered timestamp unless `now` is supplied, so results are
//! reproducible against replayed data.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::types::{Side, Signal, SignalSet, Telemetry};

pub const DEFAULT_WINDOW_SEC: u64 = 120;
pub const DEFAULT_MAX_POINTS_PER_ASSET: usize = 200;

/// Buffer shared between the ingestion path (writer) and the detector (reader)
pub type SharedTelemetryBuffer = Arc<RwLock<TelemetryBuffer>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferedPoint {
    pub ts: DateTime<Utc>,
    pub signals: SignalSet,
}

/// Summary of one signal over a window. `mean`/`std`/`slope` are `None`
/// with fewer than two points.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct WindowStats {
    pub mean: Option<f64>,
    /// Population standard deviation
    pub std: Option<f64>,
    /// Secant slope first→last point (units per second)
    pub slope: Option<f64>,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct TelemetryBuffer {
    window_sec: u64,
    max_points_per_asset: usize,
    buffers: HashMap<String, VecDeque<BufferedPoint>>,
}

impl Default for TelemetryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SEC, DEFAULT_MAX_POINTS_PER_ASSET)
    }
}

#[allow(clippy::cast_precision_loss)]
fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier)
        .num_microseconds()
        .map_or(0.0, |us| us as f64 / 1_000_000.0)
}

/// Start of a window ending at `now`. `None` means the window is unbounded.
fn window_start(now: DateTime<Utc>, window_sec: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(window_sec).ok()?;
    now.checked_sub_signed(Duration::try_seconds(secs)?)
}

impl TelemetryBuffer {
    pub fn new(window_sec: u64, max_points_per_asset: usize) -> Self {
        Self {
            window_sec,
            max_points_per_asset: max_points_per_asset.max(1),
            buffers: HashMap::new(),
        }
    }

    pub fn shared(self) -> SharedTelemetryBuffer {
        Arc::new(RwLock::new(self))
    }

    pub const fn window_sec(&self) -> u64 {
        self.window_sec
    }

    pub const fn max_points_per_asset(&self) -> usize {
        self.max_points_per_asset
    }

    /// Append a sample to its asset's buffer, then evict
    pub fn push(&mut self, telemetry: &Telemetry) {
        let buf = self.buffers.entry(telemetry.asset_id.clone()).or_default();
        let point = BufferedPoint {
            ts: telemetry.ts,
            signals: telemetry.signals,
        };
        match buf.back() {
            Some(last) if point.ts < last.ts => {
                let idx = buf.partition_point(|p| p.ts <= point.ts);
                buf.insert(idx, point);
            }
            _ => buf.push_back(point),
        }
        Self::trim(buf, self.window_sec, self.max_points_per_asset);
    }

    fn trim(buf: &mut VecDeque<BufferedPoint>, window_sec: u64, max_points: usize) {
        let Some(newest) = buf.back().map(|p| p.ts) else {
            return;
        };
        if let Some(cutoff) = window_start(newest, window_sec) {
            while buf.front().is_some_and(|p| p.ts < cutoff) {
                buf.pop_front();
            }
        }
        while buf.len() > max_points {
            buf.pop_front();
        }
    }

    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    pub fn len(&self, asset_id: &str) -> usize {
        self.buffers.get(asset_id).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, asset_id: &str) -> bool {
        self.len(asset_id) == 0
    }

    pub fn clear(&mut self, asset_id: &str) {
        self.buffers.remove(asset_id);
    }

    pub fn latest_ts(&self, asset_id: &str) -> Option<DateTime<Utc>> {
        self.buffers.get(asset_id)?.back().map(|p| p.ts)
    }

    /// Points inside `[now - window, ∞)`; `now` defaults to the newest buffered ts.
    /// A window of `None` or `Some(0)` means the buffer's own window.
    fn points_in_window(
        &self,
        asset_id: &str,
        window_sec: Option<u64>,
        now: Option<DateTime<Utc>>,
    ) -> impl Iterator<Item = &BufferedPoint> {
        let buf = self.buffers.get(asset_id);
        let cutoff = buf.and_then(|b| {
            let now = now.or_else(|| b.back().map(|p| p.ts))?;
            window_start(now, window_sec.filter(|w| *w > 0).unwrap_or(self.window_sec))
        });
        buf.into_iter()
            .flatten()
            .filter(move |p| cutoff.map_or(true, |c| p.ts >= c))
    }

    /// `(ts, value)` pairs for one signal, ascending, with missing readings dropped.
    ///
    /// `window_sec` of `None` or `Some(0)` falls back to the configured window.
    pub fn get_window(
        &self,
        asset_id: &str,
        signal: Signal,
        window_sec: Option<u64>,
        now: Option<DateTime<Utc>>,
    ) -> Vec<(DateTime<Utc>, f64)> {
        self.points_in_window(asset_id, window_sec, now)
            .filter_map(|p| p.signals.reading(signal).map(|v| (p.ts, v)))
            .collect()
    }

    pub fn compute_stats(
        &self,
        asset_id: &str,
        signal: Signal,
        window_sec: Option<u64>,
        now: Option<DateTime<Utc>>,
    ) -> WindowStats {
        let points = self.get_window(asset_id, signal, window_sec, now);
        let count = points.len();
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return WindowStats::default();
        };
        if count < 2 {
            return WindowStats {
                count,
                ..WindowStats::default()
            };
        }

        let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
        let elapsed = seconds_between(first.0, last.0);
        let slope = if elapsed > 0.0 {
            (last.1 - first.1) / elapsed
        } else {
            0.0
        };

        WindowStats {
            mean: Some(values.iter().mean()),
            std: Some(values.iter().population_std_dev()),
            slope: Some(slope),
            count,
        }
    }

    /// Seconds the signal spent at or beyond `threshold` on `side`.
    ///
    /// Each point that satisfies the condition contributes the interval to its
    /// successor; the newest point contributes nothing.
    pub fn duration_above_threshold(
        &self,
        asset_id: &str,
        signal: Signal,
        threshold: f64,
        side: Side,
        window_sec: Option<u64>,
        now: Option<DateTime<Utc>>,
    ) -> f64 {
        self.get_window(asset_id, signal, window_sec, now)
            .windows(2)
            .filter(|pair| side.breached(pair[0].1, threshold))
            .map(|pair| seconds_between(pair[0].0, pair[1].0))
            .sum()
    }

    /// Seconds with `valve_open_pct >= valve_min_pct` and `flow_m3h <= flow_max_m3h` together
    pub fn duration_valve_flow_mismatch(
        &self,
        asset_id: &str,
        valve_min_pct: f64,
        flow_max_m3h: f64,
        window_sec: Option<u64>,
        now: Option<DateTime<Utc>>,
    ) -> f64 {
        let points: Vec<&BufferedPoint> = self.points_in_window(asset_id, window_sec, now).collect();
        points
            .windows(2)
            .filter(|pair| {
                let s = &pair[0].signals;
                match (s.reading(Signal::ValveOpenPct), s.reading(Signal::FlowM3h)) {
                    (Some(valve), Some(flow)) => valve >= valve_min_pct && flow <= flow_max_m3h,
                    _ => false,
                }
            })
            .map(|pair| seconds_between(pair[0].ts, pair[1].ts))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn sample(asset: &str, sec: i64, f: impl FnOnce(&mut SignalSet)) -> Telemetry {
        let mut signals = SignalSet {
            flow_m3h: 100.0,
            valve_open_pct: 60.0,
            vibration_rms: 2.0,
            ..SignalSet::default()
        };
        f(&mut signals);
        Telemetry {
            ts: t0() + Duration::seconds(sec),
            plant_id: "plant01".to_string(),
            asset_id: asset.to_string(),
            signals,
            truth: Default::default(),
        }
    }

    fn filled(values: &[f64]) -> TelemetryBuffer {
        let mut buf = TelemetryBuffer::default();
        for (i, v) in values.iter().enumerate() {
            let v = *v;
            buf.push(&sample("p1", i as i64, |s| s.flow_m3h = v));
        }
        buf
    }

    #[test]
    fn test_evicts_by_age() {
        let mut buf = TelemetryBuffer::new(10, 200);
        for i in 0..30 {
            buf.push(&sample("p1", i, |_| {}));
        }
        // newest = 29, cutoff = 19 => 19..=29 kept
        assert_eq!(buf.len("p1"), 11);
    }

    #[test]
    fn test_evicts_by_count() {
        let mut buf = TelemetryBuffer::new(1000, 5);
        for i in 0..12 {
            buf.push(&sample("p1", i, |_| {}));
        }
        assert_eq!(buf.len("p1"), 5);
        let w = buf.get_window("p1", Signal::FlowM3h, None, None);
        assert_eq!(w[0].0, t0() + Duration::seconds(7));
    }

    #[test]
    fn test_out_of_order_push_stays_sorted() {
        let mut buf = TelemetryBuffer::default();
        buf.push(&sample("p1", 0, |s| s.flow_m3h = 1.0));
        buf.push(&sample("p1", 2, |s| s.flow_m3h = 3.0));
        buf.push(&sample("p1", 1, |s| s.flow_m3h = 2.0));
        let vals: Vec<f64> = buf
            .get_window("p1", Signal::FlowM3h, None, None)
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        assert_eq!(vals, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_assets_are_isolated() {
        let mut buf = TelemetryBuffer::default();
        buf.push(&sample("p1", 0, |_| {}));
        buf.push(&sample("p2", 0, |_| {}));
        buf.push(&sample("p2", 1, |_| {}));
        assert_eq!(buf.len("p1"), 1);
        assert_eq!(buf.len("p2"), 2);
        assert_eq!(buf.len("nope"), 0);
        buf.clear("p2");
        assert!(buf.is_empty("p2"));
    }

    #[test]
    fn test_zero_window_uses_configured_window() {
        let buf = filled(&[100.0; 20]);
        let zero = buf.get_window("p1", Signal::FlowM3h, Some(0), None);
        assert_eq!(zero.len(), 20);
        assert_eq!(zero, buf.get_window("p1", Signal::FlowM3h, None, None));
        assert_eq!(buf.get_window("p1", Signal::FlowM3h, Some(5), None).len(), 6);
    }

    #[test]
    fn test_window_anchors_on_latest_and_drops_missing() {
        let mut buf = TelemetryBuffer::default();
        for i in 0..20 {
            buf.push(&sample("p1", i, |s| {
                if i == 15 {
                    s.vibration_rms = f64::NAN;
                }
            }));
        }
        // newest = 19, 5 s window => 14..=19, minus the NaN at 15
        let w = buf.get_window("p1", Signal::VibrationRms, Some(5), None);
        assert_eq!(w.len(), 5);
        assert!(w.windows(2).all(|p| p[0].0 < p[1].0));

        let earlier = buf.get_window("p1", Signal::VibrationRms, Some(5), Some(t0() + Duration::seconds(10)));
        assert_eq!(earlier.first().map(|p| p.0), Some(t0() + Duration::seconds(5)));
    }

    #[test]
    fn test_stats_need_two_points() {
        let buf = filled(&[42.0]);
        let stats = buf.compute_stats("p1", Signal::FlowM3h, None, None);
        assert_eq!(stats.count, 1);
        assert!(stats.mean.is_none() && stats.std.is_none() && stats.slope.is_none());

        let empty = TelemetryBuffer::default();
        assert_eq!(empty.compute_stats("p1", Signal::FlowM3h, None, None).count, 0);
    }

    #[test]
    fn test_stats_mean_std_slope() {
        let buf = filled(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let stats = buf.compute_stats("p1", Signal::FlowM3h, None, None);
        assert_eq!(stats.count, 8);
        assert!((stats.mean.unwrap() - 5.0).abs() < 1e-12);
        assert!((stats.std.unwrap() - 2.0).abs() < 1e-12, "population std");
        // (9 - 2) / 7 s
        assert!((stats.slope.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_slope_is_secant_not_regression() {
        let buf = filled(&[0.0, 10.0, 10.0, 10.0, 0.0]);
        let stats = buf.compute_stats("p1", Signal::FlowM3h, None, None);
        assert_eq!(stats.slope, Some(0.0));
    }

    #[test]
    fn test_flow_drop_slope() {
        // 100 -> 70 over 10 s
        let values: Vec<f64> = (0..=10).map(|i| 100.0 - 3.0 * f64::from(i)).collect();
        let buf = filled(&values);
        let stats = buf.compute_stats("p1", Signal::FlowM3h, Some(10), None);
        assert!((stats.slope.unwrap() + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_duration_zero_when_never_breached() {
        let buf = filled(&[10.0, 11.0, 12.0]);
        assert_eq!(
            buf.duration_above_threshold("p1", Signal::FlowM3h, 50.0, Side::High, None, None),
            0.0
        );
    }

    #[test]
    fn test_duration_counts_earlier_point_only() {
        // breaches at t=1,2 (high, >= 50); last point t=4 also breaches but adds nothing
        let buf = filled(&[10.0, 50.0, 60.0, 10.0, 70.0]);
        let d = buf.duration_above_threshold("p1", Signal::FlowM3h, 50.0, Side::High, None, None);
        assert!((d - 2.0).abs() < 1e-12);

        let low = buf.duration_above_threshold("p1", Signal::FlowM3h, 10.0, Side::Low, None, None);
        assert!((low - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_valve_flow_mismatch_duration() {
        let mut buf = TelemetryBuffer::default();
        for i in 0..10 {
            buf.push(&sample("p1", i, |s| {
                s.valve_open_pct = 90.0;
                s.flow_m3h = if i >= 4 { 30.0 } else { 95.0 };
            }));
        }
        // points 4..=8 each contribute 1 s
        let d = buf.duration_valve_flow_mismatch("p1", 80.0, 50.0, Some(60), None);
        assert!((d - 5.0).abs() < 1e-12);
        assert_eq!(buf.duration_valve_flow_mismatch("other", 80.0, 50.0, None, None), 0.0);
    }
}
