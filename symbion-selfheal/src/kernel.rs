/**
 * SELFHEAL KERNEL - Lifecycle and operations of the simulation engine
 *
 * ROLE: Single owner of the entity store. Construct -> initialize once ->
 * background drift registered -> shutdown stops drift.
 *
 * CONCURRENCY: every operation takes the store lock exactly once and
 * finishes its mutation before releasing it, so no caller ever observes a
 * half-applied injection, heal or drift tick.
 */

use crate::config::KernelConfig;
use crate::drift::{spawn_drift_simulator, DriftHandle};
use crate::error::KernelError;
use crate::health::{assess, HealthTracker, KernelHealth};
use crate::models::{
    DashboardSnapshot, Fault, FaultKind, FileEntry, FilePatch, HealResult, LogEntry, NewLogEntry, Process,
    ProcessPatch, SystemHealth,
};
use crate::store::{EntityStore, SharedStore};
use crate::{healer, injector};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct Kernel {
    store: SharedStore,
    config: KernelConfig,
    tracker: HealthTracker,
    drift: Mutex<Option<DriftHandle>>,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(EntityStore::new(config.simulation.clone()))),
            config,
            tracker: HealthTracker::new(),
            drift: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Seeds the world and starts drift. Only the first call does anything;
    /// returns whether this call performed the initialization.
    pub fn initialize(&self) -> bool {
        let seeded = self.store.lock().seed(&mut rand::thread_rng());
        if !seeded {
            return false;
        }

        let (processes, files) = {
            let store = self.store.lock();
            (store.processes().len(), store.files().len())
        };
        info!("[kernel] initialized with {} processes and {} files", processes, files);
        self.start_drift();
        true
    }

    fn start_drift(&self) {
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("[kernel] no tokio runtime, background drift disabled");
            return;
        }
        let period = Duration::from_millis(self.config.simulation.drift.interval_ms);
        let handle = spawn_drift_simulator(self.store.clone(), period, self.tracker.clone());
        *self.drift.lock() = Some(handle);
        info!("[drift] started (every {}ms)", self.config.simulation.drift.interval_ms);
    }

    /// Stops the drift task. Entities are kept.
    pub fn shutdown(&self) {
        if let Some(handle) = self.drift.lock().take() {
            handle.stop();
            info!("[drift] stopped");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.store.lock().is_initialized()
    }

    pub fn drift_running(&self) -> bool {
        self.drift.lock().as_ref().is_some_and(|h| h.is_running())
    }

    pub fn processes(&self) -> Vec<Process> {
        self.store.lock().processes().to_vec()
    }

    pub fn process(&self, id: u32) -> Result<Process, KernelError> {
        self.store.lock().process(id).cloned().ok_or(KernelError::ProcessNotFound(id))
    }

    pub fn files(&self) -> Vec<FileEntry> {
        self.store.lock().files().to_vec()
    }

    pub fn file(&self, id: &str) -> Result<FileEntry, KernelError> {
        self.store
            .lock()
            .file(id)
            .cloned()
            .ok_or_else(|| KernelError::FileNotFound(id.to_string()))
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.store.lock().recent_logs()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let store = self.store.lock();
        DashboardSnapshot {
            processes: store.processes().to_vec(),
            files: store.files().to_vec(),
            logs: store.recent_logs(),
            health: assess(store.processes(), store.files(), store.config().memory_scale),
        }
    }

    pub fn health(&self) -> SystemHealth {
        let store = self.store.lock();
        assess(store.processes(), store.files(), store.config().memory_scale)
    }

    pub fn kernel_health(&self) -> KernelHealth {
        self.tracker.get_health(self.is_initialized(), self.drift_running())
    }

    pub fn update_process(&self, id: u32, patch: &ProcessPatch) -> Result<Process, KernelError> {
        self.store.lock().update_process(id, patch)
    }

    pub fn update_file(&self, id: &str, patch: &FilePatch) -> Result<FileEntry, KernelError> {
        self.store.lock().update_file(id, patch)
    }

    pub fn append_log(&self, entry: NewLogEntry) -> Result<LogEntry, KernelError> {
        if entry.event.trim().is_empty() {
            return Err(KernelError::InvalidInput("event must not be empty".into()));
        }
        Ok(self.store.lock().append_log(entry.level, entry.event, entry.description))
    }

    pub fn inject_faults(&self) -> Vec<Fault> {
        let faults = injector::inject_faults(&mut self.store.lock(), &mut rand::thread_rng());
        self.tracker.record_faults(faults.len());
        if faults.is_empty() {
            info!("[injector] no eligible target, nothing injected");
        }
        for fault in &faults {
            info!("[injector] {} on {} ({})", fault.kind, fault.target_name, fault.target_id);
        }
        faults
    }

    pub fn inject_fault(&self, kind: FaultKind) -> Option<Fault> {
        let fault = injector::apply_fault(&mut self.store.lock(), kind, &mut rand::thread_rng());
        match &fault {
            Some(f) => {
                self.tracker.record_faults(1);
                info!("[injector] forced {} on {} ({})", kind, f.target_name, f.target_id);
            }
            None => warn!("[injector] forced {} found no eligible target", kind),
        }
        fault
    }

    pub fn heal_all(&self) -> Vec<HealResult> {
        let results = healer::heal_all(&mut self.store.lock(), &mut rand::thread_rng());
        self.tracker.record_repairs(results.len());
        info!("[healer] repaired {} entities", results.len());
        results
    }

    pub fn repair_file(&self, id: &str) -> HealResult {
        let result = healer::repair_file(&mut self.store.lock(), id, &mut rand::thread_rng());
        if result.success {
            self.tracker.record_repairs(1);
        }
        info!("[healer] repair file {}: {}", id, result.message);
        result
    }

    pub fn repair_process(&self, id: u32) -> HealResult {
        let result = healer::repair_process(&mut self.store.lock(), id, &mut rand::thread_rng());
        if result.success {
            self.tracker.record_repairs(1);
        }
        info!("[healer] repair process {}: {}", id, result.message);
        result
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        self.shutdown();
    }
}
