//! Telemetry Pipeline
//!
//! ```text
//! SimulationRegistry ──(worker per asset)──► EventSink<Telemetry>
//!                                                  │ (channel / stdin / replay)
//!                                                  ▼
//!                   TelemetrySource ──► MonitorLoop ──► EventSink<AlertEvent>
//!                                        │
//!                                        ├─ TelemetryBuffer (write: push)
//!                                        └─ ThresholdDetector (read: detect)
//! ```

pub mod monitor;
pub mod registry;
pub mod sink;
pub mod source;

pub use monitor::{MonitorLoop, MonitorStats};
pub use registry::{RegistryError, SimulationRegistry};
pub use sink::{ChannelSink, EventSink, FanoutSink, JsonLinesSink, NullSink};
pub use source::{
    ChannelSource, JsonLinesSource, ReplaySource, StdinSource, TelemetryEvent, TelemetrySource,
};
