//! Telemetry source abstraction.
//!
//! Provides a unified trait for reading telemetry from different places:
//! an in-process channel (simulator workers), stdin (JSON lines), and
//! recorded JSONL files (replay).

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use crate::types::Telemetry;

/// Events produced by a telemetry source.
pub enum TelemetryEvent {
    /// A valid telemetry sample was read.
    Sample(Telemetry),
    /// Source reached end of data.
    Eof,
}

/// Trait abstracting where telemetry comes from.
///
/// The monitor loop calls [`next_sample`](TelemetrySource::next_sample) in a
/// `select!` with cancellation.
#[async_trait]
pub trait TelemetrySource: Send + 'static {
    /// Read the next sample.
    ///
    /// Returns `TelemetryEvent::Eof` when no more data is available and
    /// `Err` on unrecoverable I/O errors.
    async fn next_sample(&mut self) -> Result<TelemetryEvent>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

// ============================================================================
// Channel Source (in-process simulator workers)
// ============================================================================

/// Receives telemetry from simulator workers. Ends once every sender is dropped.
pub struct ChannelSource {
    rx: mpsc::Receiver<Telemetry>,
}

impl ChannelSource {
    pub const fn new(rx: mpsc::Receiver<Telemetry>) -> Self {
        Self { rx }
    }
}

#[async_trait]
impl TelemetrySource for ChannelSource {
    async fn next_sample(&mut self) -> Result<TelemetryEvent> {
        Ok(self
            .rx
            .recv()
            .await
            .map_or(TelemetryEvent::Eof, TelemetryEvent::Sample))
    }

    fn source_name(&self) -> &str {
        "channel"
    }
}

// ============================================================================
// JSON Lines Sources (stdin / file replay)
// ============================================================================

/// Reads one JSON telemetry object per line. Blank lines are ignored and
/// malformed lines are skipped with a warning.
pub struct JsonLinesSource<R> {
    reader: R,
    line_buffer: String,
    name: String,
    line_no: u64,
}

impl<R: AsyncBufRead + Unpin + Send + 'static> JsonLinesSource<R> {
    pub fn from_reader(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            line_buffer: String::with_capacity(1024),
            name: name.into(),
            line_no: 0,
        }
    }
}

/// Telemetry piped in on stdin, e.g. `pump-sim scenario.json | pumpguard --stdin`
pub type StdinSource = JsonLinesSource<BufReader<tokio::io::Stdin>>;

/// Recorded telemetry replayed from a JSONL file
pub type ReplaySource = JsonLinesSource<BufReader<tokio::fs::File>>;

impl StdinSource {
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()), "stdin")
    }
}

impl ReplaySource {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open replay file {}", path.display()))?;
        Ok(Self::from_reader(
            BufReader::new(file),
            format!("replay:{}", path.display()),
        ))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send + 'static> TelemetrySource for JsonLinesSource<R> {
    async fn next_sample(&mut self) -> Result<TelemetryEvent> {
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(TelemetryEvent::Eof);
            }
            self.line_no += 1;
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Telemetry>(line) {
                Ok(sample) => return Ok(TelemetryEvent::Sample(sample)),
                Err(e) => {
                    warn!(source = %self.name, line = self.line_no, "Skipping malformed telemetry: {}", e);
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalSet;
    use chrono::Utc;

    fn telemetry() -> Telemetry {
        Telemetry {
            ts: Utc::now(),
            plant_id: "plant01".to_string(),
            asset_id: "pump01".to_string(),
            signals: SignalSet::default(),
            truth: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_json_lines_skips_garbage() {
        let good = serde_json::to_string(&telemetry()).unwrap();
        let input = format!("\n{{broken\n{good}\n");
        let mut source = JsonLinesSource::from_reader(std::io::Cursor::new(input.into_bytes()), "test");

        assert!(matches!(
            source.next_sample().await.unwrap(),
            TelemetryEvent::Sample(t) if t.asset_id == "pump01"
        ));
        assert!(matches!(source.next_sample().await.unwrap(), TelemetryEvent::Eof));
    }

    #[tokio::test]
    async fn test_channel_source_ends_when_senders_drop() {
        let (tx, rx) = mpsc::channel(4);
        let mut source = ChannelSource::new(rx);
        tx.send(telemetry()).await.unwrap();
        drop(tx);
        assert!(matches!(source.next_sample().await.unwrap(), TelemetryEvent::Sample(_)));
        assert!(matches!(source.next_sample().await.unwrap(), TelemetryEvent::Eof));
    }

    #[tokio::test]
    async fn test_replay_missing_file() {
        assert!(ReplaySource::open(Path::new("/nonexistent/telemetry.jsonl"))
            .await
            .is_err());
    }
}
