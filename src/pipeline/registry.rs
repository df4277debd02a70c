//! Simulation registry: one scenario executor and one worker task per asset.
//!
//! Control operations (`load`, `start`, `stop`, `reset`, `status`,
//! `set_setpoint`, `list`, `shutdown`) serialise on the registry lock. A
//! running worker only ever takes its own executor's lock, for the duration
//! of one `step`. Every worker token is a child of the registry's root token,
//! so `shutdown` is terminal.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::sink::EventSink;
use crate::config::{PlantConfig, SimulatorConfig};
use crate::faults::FaultError;
use crate::scenario::{ExecutorStatus, Scenario, ScenarioError, ScenarioExecutor};
use crate::types::Telemetry;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No scenario loaded for asset {0}")]
    NotLoaded(String),

    #[error("Simulation already running for asset {0}")]
    AlreadyRunning(String),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error(transparent)]
    Fault(#[from] FaultError),
}

type SharedExecutor = Arc<Mutex<ScenarioExecutor>>;

fn lock_executor(executor: &SharedExecutor) -> MutexGuard<'_, ScenarioExecutor> {
    executor.lock().unwrap_or_else(|e| {
        warn!("Executor lock poisoned, recovering");
        e.into_inner()
    })
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<u64>,
}

struct AssetSlot {
    executor: SharedExecutor,
    worker: Option<Worker>,
}

impl AssetSlot {
    fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.handle.is_finished())
    }

    /// Cancel and join the worker, if any. Returns whether one was running.
    async fn stop_worker(&mut self, asset_id: &str) -> bool {
        let Some(worker) = self.worker.take() else {
            return false;
        };
        let was_running = !worker.handle.is_finished();
        worker.cancel.cancel();
        match worker.handle.await {
            Ok(ticks) => debug!(asset_id, ticks, "Worker joined"),
            Err(e) => warn!(asset_id, "Worker task failed: {}", e),
        }
        was_running
    }
}

pub struct SimulationRegistry {
    slots: tokio::sync::Mutex<HashMap<String, AssetSlot>>,
    sink: Arc<dyn EventSink<Telemetry>>,
    config: PlantConfig,
    root: CancellationToken,
}

impl SimulationRegistry {
    pub fn new(config: PlantConfig, sink: Arc<dyn EventSink<Telemetry>>) -> Self {
        Self {
            slots: tokio::sync::Mutex::new(HashMap::new()),
            sink,
            config,
            root: CancellationToken::new(),
        }
    }

    pub const fn config(&self) -> &PlantConfig {
        &self.config
    }

    /// Build a fresh executor for `asset_id`, replacing any idle one.
    pub async fn load(&self, asset_id: &str, scenario: Scenario) -> Result<(), RegistryError> {
        let mut slots = self.slots.lock().await;
        if slots.get(asset_id).is_some_and(AssetSlot::is_running) {
            return Err(RegistryError::AlreadyRunning(asset_id.to_string()));
        }

        let name = scenario.name.clone();
        let executor = ScenarioExecutor::new(scenario, self.config.plant_models())?
            .with_ids(self.config.plant.plant_id.clone(), asset_id);
        slots.insert(
            asset_id.to_string(),
            AssetSlot {
                executor: Arc::new(Mutex::new(executor)),
                worker: None,
            },
        );
        info!(asset_id, scenario = %name, "Scenario loaded");
        Ok(())
    }

    /// Read, validate and load a scenario file
    pub async fn load_file(&self, asset_id: &str, path: &Path) -> Result<(), RegistryError> {
        let scenario = Scenario::load_from_file(path)?;
        self.load(asset_id, scenario).await
    }

    /// Rewind the executor and spawn its tick worker
    pub async fn start(&self, asset_id: &str) -> Result<(), RegistryError> {
        let mut slots = self.slots.lock().await;
        let slot = slots
            .get_mut(asset_id)
            .ok_or_else(|| RegistryError::NotLoaded(asset_id.to_string()))?;
        if slot.is_running() {
            return Err(RegistryError::AlreadyRunning(asset_id.to_string()));
        }
        // Reap a worker that finished on its own
        slot.stop_worker(asset_id).await;

        lock_executor(&slot.executor).start()?;

        let cancel = self.root.child_token();
        let handle = tokio::spawn(run_worker(
            Arc::clone(&slot.executor),
            Arc::clone(&self.sink),
            self.config.simulator,
            cancel.clone(),
        ));
        slot.worker = Some(Worker { cancel, handle });
        info!(asset_id, "Simulation started");
        Ok(())
    }

    /// Cancel the worker. `Ok(false)` when nothing was running.
    pub async fn stop(&self, asset_id: &str) -> Result<bool, RegistryError> {
        let mut slots = self.slots.lock().await;
        let slot = slots
            .get_mut(asset_id)
            .ok_or_else(|| RegistryError::NotLoaded(asset_id.to_string()))?;
        let was_running = slot.stop_worker(asset_id).await;
        lock_executor(&slot.executor).stop();
        if was_running {
            info!(asset_id, "Simulation stopped");
        }
        Ok(was_running)
    }

    /// Stop and rewind to t = 0 without restarting
    pub async fn reset(&self, asset_id: &str) -> Result<(), RegistryError> {
        let mut slots = self.slots.lock().await;
        let slot = slots
            .get_mut(asset_id)
            .ok_or_else(|| RegistryError::NotLoaded(asset_id.to_string()))?;
        slot.stop_worker(asset_id).await;
        lock_executor(&slot.executor).reset()?;
        info!(asset_id, "Simulation reset");
        Ok(())
    }

    pub async fn status(&self, asset_id: &str) -> Result<ExecutorStatus, RegistryError> {
        let slots = self.slots.lock().await;
        let slot = slots
            .get(asset_id)
            .ok_or_else(|| RegistryError::NotLoaded(asset_id.to_string()))?;
        let status = lock_executor(&slot.executor).get_status();
        Ok(status)
    }

    pub async fn set_setpoint(
        &self,
        asset_id: &str,
        rpm: Option<f64>,
        valve_open_pct: Option<f64>,
    ) -> Result<(), RegistryError> {
        let slots = self.slots.lock().await;
        let slot = slots
            .get(asset_id)
            .ok_or_else(|| RegistryError::NotLoaded(asset_id.to_string()))?;
        lock_executor(&slot.executor).set_setpoint(rpm, valve_open_pct);
        Ok(())
    }

    /// Status of every loaded asset, sorted by asset id
    pub async fn list(&self) -> Vec<ExecutorStatus> {
        let slots = self.slots.lock().await;
        let mut all: Vec<ExecutorStatus> = slots
            .values()
            .map(|slot| lock_executor(&slot.executor).get_status())
            .collect();
        all.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));
        all
    }

    /// Wait until every worker has finished on its own (scenario end)
    pub async fn wait_all(&self) {
        let workers: Vec<(String, Worker)> = {
            let mut slots = self.slots.lock().await;
            slots
                .iter_mut()
                .filter_map(|(id, slot)| slot.worker.take().map(|w| (id.clone(), w)))
                .collect()
        };
        for (asset_id, worker) in workers {
            match worker.handle.await {
                Ok(ticks) => debug!(asset_id = %asset_id, ticks, "Worker finished"),
                Err(e) => warn!(asset_id = %asset_id, "Worker task failed: {}", e),
            }
        }
    }

    /// Cancel and join every worker. Workers started afterwards exit at once.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let mut slots = self.slots.lock().await;
        for (asset_id, slot) in slots.iter_mut() {
            slot.stop_worker(asset_id).await;
            lock_executor(&slot.executor).stop();
        }
        info!(assets = slots.len(), "Simulation registry shut down");
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Tick one executor until its scenario ends or the token is cancelled.
/// Returns the number of samples produced.
async fn run_worker(
    executor: SharedExecutor,
    sink: Arc<dyn EventSink<Telemetry>>,
    simulator: SimulatorConfig,
    cancel: CancellationToken,
) -> u64 {
    let dt = simulator.dt_sec();
    let mut interval = simulator.tick_period().map(|period| {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval
    });
    let mut ticks = 0u64;

    loop {
        match interval.as_mut() {
            Some(interval) => {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
            }
            None => {
                if cancel.is_cancelled() {
                    break;
                }
                tokio::task::yield_now().await;
            }
        }

        let next = lock_executor(&executor).step(dt);
        let Some(telemetry) = next else {
            debug!("Scenario finished");
            break;
        };
        ticks += 1;

        if let Err(e) = sink.emit(&telemetry).await {
            warn!(asset_id = %telemetry.asset_id, sink = sink.sink_name(), "Failed to emit telemetry: {}", e);
        }
    }

    ticks
}
