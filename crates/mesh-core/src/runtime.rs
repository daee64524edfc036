//! Tick Driver
//!
//! Shared access to one simulation from the periodic tick task and from
//! request handlers. Every operation, ticks included, runs under the same
//! async mutex, so an external call never observes a half-finished tick.

use std::sync::Arc;
use std::time::Duration;

use mesh_events::TickSummary;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::simulation::MeshSimulation;

/// Cloneable handle to a simulation behind one async mutex
#[derive(Clone)]
pub struct SharedSimulation {
    inner: Arc<Mutex<MeshSimulation>>,
}

impl SharedSimulation {
    pub fn new(simulation: MeshSimulation) -> Self {
        Self {
            inner: Arc::new(Mutex::new(simulation)),
        }
    }

    /// Run `f` with exclusive access to the simulation.
    pub async fn with<R>(&self, f: impl FnOnce(&mut MeshSimulation) -> R) -> R {
        let mut guard = self.inner.lock().await;
        f(&mut guard)
    }

    pub async fn advance_tick(&self) -> TickSummary {
        self.with(|sim| sim.advance_tick()).await
    }
}

/// Background task advancing the simulation on a fixed period
pub struct TickDriver {
    stop: watch::Sender<bool>,
    handle: JoinHandle<u64>,
}

impl TickDriver {
    /// Start ticking `shared` every `period`. Missed periods are skipped, not
    /// replayed in a burst. Must be called inside a tokio runtime.
    pub fn start(shared: SharedSimulation, period: Duration) -> Self {
        let (stop, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of an interval completes immediately
            interval.tick().await;

            let mut ticks = 0u64;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let summary = shared.advance_tick().await;
                        ticks += 1;
                        debug!(tick = summary.tick, delivered = summary.delivered, "driver tick");
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            ticks
        });

        info!(period_ms = period.as_millis() as u64, "tick driver started");
        Self { stop, handle }
    }

    /// Signal the task and wait for it. A tick already in progress finishes
    /// first. Returns the number of ticks the driver ran.
    pub async fn stop(self) -> u64 {
        let _ = self.stop.send(true);
        match self.handle.await {
            Ok(ticks) => {
                info!(ticks, "tick driver stopped");
                ticks
            }
            Err(e) => {
                warn!("tick driver task failed: {}", e);
                0
            }
        }
    }
}
