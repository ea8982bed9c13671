use crate::models::{FileEntry, HealthStatus, Process, SystemHealth};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;

pub const CRITICAL_FAULTY: usize = 2;
pub const CRITICAL_CORRUPTED: usize = 2;
pub const CRITICAL_CPU: f64 = 80.0;
pub const WARNING_CPU: f64 = 60.0;

/// Classification, first match wins.
pub fn classify(faulty: usize, corrupted: usize, cpu: f64) -> HealthStatus {
    if faulty > CRITICAL_FAULTY || corrupted > CRITICAL_CORRUPTED || cpu > CRITICAL_CPU {
        HealthStatus::Critical
    } else if faulty > 0 || corrupted > 0 || cpu > WARNING_CPU {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}

/// Derives the system verdict from current entity state. Never cached.
pub fn assess(processes: &[Process], files: &[FileEntry], memory_scale: f64) -> SystemHealth {
    let total = processes.len();
    let healthy = processes.iter().filter(|p| p.is_running()).count();
    let faulty = total - healthy;
    let corrupted = files.iter().filter(|f| f.corrupted).count();

    let (cpu, memory) = if total == 0 {
        (0.0, 0.0)
    } else {
        let n = total as f64;
        let avg_cpu = processes.iter().map(|p| p.cpu).sum::<f64>() / n;
        let avg_mem = processes.iter().map(|p| p.memory_mb).sum::<f64>() / n;
        (avg_cpu, (avg_mem / memory_scale).min(100.0))
    };

    SystemHealth {
        cpu_usage: cpu,
        memory_usage: memory,
        total_processes: total,
        healthy_processes: healthy,
        faulty_processes: faulty,
        total_files: files.len(),
        corrupted_files: corrupted,
        status: classify(faulty, corrupted, cpu),
        timestamp: OffsetDateTime::now_utc(),
    }
}

/// Operational counters of the kernel itself (not of the simulated OS).
#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub initialized: bool,
    pub drift_running: bool,
    pub drift_ticks: u64,
    pub faults_injected: u64,
    pub repairs_performed: u64,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    drift_ticks: Arc<AtomicU64>,
    faults_injected: Arc<AtomicU64>,
    repairs_performed: Arc<AtomicU64>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            drift_ticks: Arc::new(AtomicU64::new(0)),
            faults_injected: Arc::new(AtomicU64::new(0)),
            repairs_performed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_drift_tick(&self) {
        self.drift_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_faults(&self, count: usize) {
        self.faults_injected.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_repairs(&self, count: usize) {
        self.repairs_performed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn drift_ticks(&self) -> u64 {
        self.drift_ticks.load(Ordering::Relaxed)
    }

    pub fn get_health(&self, initialized: bool, drift_running: bool) -> KernelHealth {
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            initialized,
            drift_running,
            drift_ticks: self.drift_ticks(),
            faults_injected: self.faults_injected.load(Ordering::Relaxed),
            repairs_performed: self.repairs_performed.load(Ordering::Relaxed),
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProcessStatus;

    fn make_process(id: u32, status: ProcessStatus, cpu: f64, memory_mb: f64) -> Process {
        Process {
            id,
            name: format!("p{id}"),
            memory_mb,
            cpu,
            last_heartbeat: OffsetDateTime::now_utc(),
            status,
        }
    }

    fn file(corrupted: bool) -> FileEntry {
        FileEntry {
            id: uuid::Uuid::new_v4().to_string(),
            name: "f".into(),
            path: "/tmp/f".into(),
            size_bytes: 1,
            checksum: "0".repeat(32),
            corrupted,
            last_modified: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_all_faulty_is_critical() {
        let procs: Vec<Process> = (0..3).map(|i| make_process(i, ProcessStatus::Crashed, 0.0, 100.0)).collect();
        let health = assess(&procs, &[], 10.0);
        assert_eq!(health.faulty_processes, 3);
        assert_eq!(health.healthy_processes, 0);
        assert_eq!(health.status, HealthStatus::Critical);
    }

    #[test]
    fn test_corruption_and_cpu_thresholds() {
        let procs = vec![make_process(1, ProcessStatus::Running, 10.0, 100.0)];
        let files: Vec<FileEntry> = (0..3).map(|_| file(true)).collect();
        assert_eq!(assess(&procs, &files, 10.0).status, HealthStatus::Critical);

        let two: Vec<FileEntry> = (0..2).map(|_| file(true)).collect();
        assert_eq!(assess(&procs, &two, 10.0).status, HealthStatus::Warning);

        let hot = vec![make_process(1, ProcessStatus::Running, 80.5, 100.0)];
        assert_eq!(assess(&hot, &[], 10.0).status, HealthStatus::Critical);

        let edge = vec![make_process(1, ProcessStatus::Running, 80.0, 100.0)];
        assert_eq!(assess(&edge, &[], 10.0).status, HealthStatus::Warning);
    }

    #[test]
    fn test_single_fault_is_warning() {
        let procs = vec![
            make_process(1, ProcessStatus::Running, 20.0, 100.0),
            make_process(2, ProcessStatus::Frozen, 30.0, 100.0),
            make_process(3, ProcessStatus::Running, 10.0, 100.0),
        ];
        let health = assess(&procs, &[file(false)], 10.0);
        assert_eq!(health.faulty_processes, 1);
        assert_eq!(health.status, HealthStatus::Warning);
    }

    #[test]
    fn test_nominal_is_healthy() {
        let procs = vec![
            make_process(1, ProcessStatus::Running, 60.0, 200.0),
            make_process(2, ProcessStatus::Running, 60.0, 400.0),
        ];
        let health = assess(&procs, &[file(false), file(false)], 10.0);
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.cpu_usage, 60.0);
        assert_eq!(health.memory_usage, 30.0);
        assert_eq!(health.corrupted_files, 0);
    }

    #[test]
    fn test_memory_is_capped_and_empty_is_zero() {
        let procs = vec![make_process(1, ProcessStatus::Running, 5.0, 5000.0)];
        assert_eq!(assess(&procs, &[], 10.0).memory_usage, 100.0);

        let empty = assess(&[], &[], 10.0);
        assert_eq!(empty.cpu_usage, 0.0);
        assert_eq!(empty.memory_usage, 0.0);
        assert_eq!(empty.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_tracker_counters() {
        let tracker = HealthTracker::new();
        tracker.record_drift_tick();
        tracker.record_faults(3);
        tracker.record_repairs(2);
        let h = tracker.get_health(true, false);
        assert_eq!(h.drift_ticks, 1);
        assert_eq!(h.faults_injected, 3);
        assert_eq!(h.repairs_performed, 2);
        assert!(h.initialized);
    }
}
