//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Identification
// ============================================================================

/// Plant id stamped on telemetry when nothing else is configured
pub const DEFAULT_PLANT_ID: &str = "plant01";

/// Asset id used for a scenario loaded without an explicit id
pub const DEFAULT_ASSET_ID: &str = "pump01";

// ============================================================================
// Simulator
// ============================================================================

/// Tick rate (Hz). 1 Hz = one telemetry sample per simulated second.
pub const DEFAULT_FREQUENCY_HZ: f64 = 1.0;

/// Wall-clock speed-up applied to the tick period.
pub const DEFAULT_SPEED: f64 = 1.0;

/// Bounded channel between asset workers and the monitor (samples).
///
/// 1 024 = ~17 minutes of backlog for a single 1 Hz asset.
pub const TELEMETRY_CHANNEL_CAPACITY: usize = 1_024;

// ============================================================================
// Detector
// ============================================================================

/// Look-back window for threshold evidence and duration gating (seconds).
pub const DETECTOR_WINDOW_SEC: u64 = 60;
