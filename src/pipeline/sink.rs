//! Event sinks: where telemetry and alerts go once produced.
//!
//! Sinks are best-effort. An `Err` from [`EventSink::emit`] is logged by the
//! caller and never stops a simulation worker or the monitor loop.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};

#[async_trait]
pub trait EventSink<E>: Send + Sync {
    async fn emit(&self, event: &E) -> Result<()>;

    /// Human-readable name for logging.
    fn sink_name(&self) -> &str;
}

#[async_trait]
impl<E: Sync, S: EventSink<E> + ?Sized> EventSink<E> for Arc<S> {
    async fn emit(&self, event: &E) -> Result<()> {
        (**self).emit(event).await
    }

    fn sink_name(&self) -> &str {
        (**self).sink_name()
    }
}

// ============================================================================
// Channel Sink
// ============================================================================

/// Forwards events into a bounded channel without waiting; a full or closed
/// channel is reported as an error.
pub struct ChannelSink<E> {
    tx: mpsc::Sender<E>,
}

impl<E> ChannelSink<E> {
    pub const fn new(tx: mpsc::Sender<E>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl<E: Clone + Send + Sync> EventSink<E> for ChannelSink<E> {
    async fn emit(&self, event: &E) -> Result<()> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => anyhow!("channel full, event dropped"),
            mpsc::error::TrySendError::Closed(_) => anyhow!("channel closed"),
        })
    }

    fn sink_name(&self) -> &str {
        "channel"
    }
}

// ============================================================================
// JSON Lines Sink
// ============================================================================

/// Writes each event as one JSON object per line, flushing after every line
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
    name: String,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    pub fn new(writer: W, name: impl Into<String>) -> Self {
        Self {
            writer: Mutex::new(writer),
            name: name.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonLinesSink<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout(), "stdout")
    }
}

#[async_trait]
impl<E, W> EventSink<E> for JsonLinesSink<W>
where
    E: Serialize + Sync,
    W: AsyncWrite + Unpin + Send,
{
    async fn emit(&self, event: &E) -> Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    fn sink_name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Fan-out / Null
// ============================================================================

/// Emits to every inner sink; reports the first failure after trying them all
pub struct FanoutSink<E> {
    sinks: Vec<Arc<dyn EventSink<E>>>,
}

impl<E: Sync> FanoutSink<E> {
    pub const fn new(sinks: Vec<Arc<dyn EventSink<E>>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl<E: Sync> EventSink<E> for FanoutSink<E> {
    async fn emit(&self, event: &E) -> Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event).await {
                if first_err.is_none() {
                    first_err = Some(e.context(format!("sink '{}'", sink.sink_name())));
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn sink_name(&self) -> &str {
        "fanout"
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl<E: Sync> EventSink<E> for NullSink {
    async fn emit(&self, _event: &E) -> Result<()> {
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "null"
    }
}
