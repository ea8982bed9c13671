use crate::health::HealthTracker;
use crate::store::{clamp_metrics, EntityStore, SharedStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::{self, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// One drift step: symmetric random walk on every running process.
/// Non-running processes only change through injection or healing.
/// Returns how many processes moved.
pub fn drift_tick<R: Rng + ?Sized>(store: &mut EntityStore, rng: &mut R) -> usize {
    let now = OffsetDateTime::now_utc();
    let (cfg, processes, _) = store.parts_mut();
    let cpu_step = cfg.drift.cpu_step;
    let memory_step = cfg.drift.memory_step;

    let mut moved = 0;
    for process in processes.iter_mut().filter(|p| p.is_running()) {
        if cpu_step > 0.0 {
            process.cpu += rng.gen_range(-cpu_step..=cpu_step);
        }
        if memory_step > 0.0 {
            process.memory_mb += rng.gen_range(-memory_step..=memory_step);
        }
        clamp_metrics(cfg, process);
        process.last_heartbeat = now;
        moved += 1;
    }
    moved
}

/// Owns the recurring drift task; the task is aborted when the handle is
/// stopped or dropped.
pub struct DriftHandle {
    task: JoinHandle<()>,
}

impl DriftHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(self) {
        // Drop aborts
    }
}

impl Drop for DriftHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Starts the background drift simulator. Must be called inside a tokio runtime.
pub fn spawn_drift_simulator(store: SharedStore, period: Duration, tracker: HealthTracker) -> DriftHandle {
    let task = task::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let moved = drift_tick(&mut store.lock(), &mut rng);
            tracker.record_drift_tick();
            debug!("[drift] tick applied to {} running processes", moved);
        }
    });
    DriftHandle { task }
}
