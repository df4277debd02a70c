//! Monitor loop: telemetry in, alerts out.
//!
//! Each sample is pushed into the shared sliding-window buffer and run
//! through the detector under one write guard, so no other producer can
//! slip a point in between the push and the window queries.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::sink::EventSink;
use super::source::{TelemetryEvent, TelemetrySource};
use crate::detector::ThresholdDetector;
use crate::telemetry_buffer::{SharedTelemetryBuffer, TelemetryBuffer};
use crate::types::{AlertEvent, Severity, Telemetry};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorStats {
    pub messages_processed: u64,
    pub alerts_generated: u64,
    pub critical_alerts: u64,
    pub assets_monitored: usize,
}

pub struct MonitorLoop {
    buffer: SharedTelemetryBuffer,
    detector: Arc<ThresholdDetector>,
    assets: HashSet<String>,
    stats: MonitorStats,
}

fn write_buffer(buffer: &SharedTelemetryBuffer) -> RwLockWriteGuard<'_, TelemetryBuffer> {
    buffer.write().unwrap_or_else(|e: PoisonError<_>| {
        warn!("Telemetry buffer lock poisoned, recovering");
        e.into_inner()
    })
}

impl MonitorLoop {
    pub fn new(buffer: SharedTelemetryBuffer, detector: Arc<ThresholdDetector>) -> Self {
        Self {
            buffer,
            detector,
            assets: HashSet::new(),
            stats: MonitorStats::default(),
        }
    }

    /// Monitor with a private buffer sized from `window_sec`/`max_points`
    pub fn with_buffer_size(
        window_sec: u64,
        max_points_per_asset: usize,
        detector: Arc<ThresholdDetector>,
    ) -> Self {
        Self::new(
            TelemetryBuffer::new(window_sec, max_points_per_asset).shared(),
            detector,
        )
    }

    pub const fn stats(&self) -> MonitorStats {
        self.stats
    }

    pub fn buffer(&self) -> &SharedTelemetryBuffer {
        &self.buffer
    }

    /// Ingest one sample and run detection on it
    pub fn process(&mut self, telemetry: &Telemetry) -> Option<AlertEvent> {
        let event = {
            let mut buffer = write_buffer(&self.buffer);
            buffer.push(telemetry);
            self.detector.detect(telemetry, Some(&*buffer))
        };

        self.stats.messages_processed += 1;
        if !self.assets.contains(&telemetry.asset_id) {
            info!(asset_id = %telemetry.asset_id, plant_id = %telemetry.plant_id, "Monitoring new asset");
            self.assets.insert(telemetry.asset_id.clone());
            self.stats.assets_monitored = self.assets.len();
        }

        let event = event?;

        self.stats.alerts_generated += 1;
        if event.severity == Severity::Critical {
            self.stats.critical_alerts += 1;
        }
        debug!(
            asset_id = %event.asset_id,
            severity = %event.severity,
            details = event.alerts.len(),
            "Alert raised"
        );
        Some(event)
    }

    /// Run until the source is exhausted or cancellation. Returns final stats.
    pub async fn run<S, K>(
        &mut self,
        source: &mut S,
        sink: &K,
        cancel_token: CancellationToken,
    ) -> MonitorStats
    where
        S: TelemetrySource + ?Sized,
        K: EventSink<AlertEvent> + ?Sized,
    {
        let source_name = source.source_name().to_string();
        info!(source = %source_name, sink = sink.sink_name(), "Monitor started");

        loop {
            let event = tokio::select! {
                () = cancel_token.cancelled() => {
                    info!("Monitor shutdown signal received");
                    break;
                }
                result = source.next_sample() => match result {
                    Ok(ev) => ev,
                    Err(e) => {
                        warn!(source = %source_name, "Source error: {}", e);
                        break;
                    }
                }
            };

            let telemetry = match event {
                TelemetryEvent::Sample(t) => t,
                TelemetryEvent::Eof => {
                    info!(
                        messages = self.stats.messages_processed,
                        "Source reached end"
                    );
                    break;
                }
            };

            if let Some(alert) = self.process(&telemetry) {
                if let Err(e) = sink.emit(&alert).await {
                    warn!(asset_id = %alert.asset_id, sink = sink.sink_name(), "Failed to emit alert: {}", e);
                }
            }
        }

        let stats = self.stats;
        info!(
            messages_processed = stats.messages_processed,
            alerts_generated = stats.alerts_generated,
            critical_alerts = stats.critical_alerts,
            assets_monitored = stats.assets_monitored,
            "Monitor stopped"
        );
        stats
    }
}
