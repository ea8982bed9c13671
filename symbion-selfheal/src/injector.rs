/**
 * FAULT INJECTOR - Random chaos for the simulated OS
 *
 * ROLE: Applies 1 to 3 random faults per call across processes and files.
 *
 * SELECTION: each round draws a single roll in [0, 1):
 *   [0.00, 0.30) crash      (running process)
 *   [0.30, 0.50) freeze     (running process)
 *   [0.50, 0.70) high_load  (running process)
 *   [0.70, 1.00) corruption (healthy file)
 * When no process is running every roll lands on corruption. A round whose
 * pool is empty contributes nothing.
 */

use crate::models::{Fault, FaultKind, LogLevel, ProcessStatus, Severity};
use crate::store::{clamp_metrics, corrupted_checksum, EntityStore};
use rand::Rng;
use time::{Duration, OffsetDateTime};

pub const CRASH_THRESHOLD: f64 = 0.30;
pub const FREEZE_THRESHOLD: f64 = 0.50;
pub const HIGH_LOAD_THRESHOLD: f64 = 0.70;
pub const MAX_FAULTS_PER_CALL: usize = 3;

pub fn category_for(roll: f64, running_available: bool) -> FaultKind {
    if !running_available {
        return FaultKind::Corruption;
    }
    if roll < CRASH_THRESHOLD {
        FaultKind::Crash
    } else if roll < FREEZE_THRESHOLD {
        FaultKind::Freeze
    } else if roll < HIGH_LOAD_THRESHOLD {
        FaultKind::HighLoad
    } else {
        FaultKind::Corruption
    }
}

/// Runs 1..=MAX_FAULTS_PER_CALL selection rounds and returns the faults applied.
pub fn inject_faults<R: Rng + ?Sized>(store: &mut EntityStore, rng: &mut R) -> Vec<Fault> {
    let requested = rng.gen_range(1..=MAX_FAULTS_PER_CALL);
    let mut faults = Vec::with_capacity(requested);

    for _ in 0..requested {
        let roll: f64 = rng.gen();
        let running_available = store.processes().iter().any(|p| p.is_running());
        if let Some(fault) = apply_fault(store, category_for(roll, running_available), rng) {
            faults.push(fault);
        }
    }

    if faults.is_empty() {
        store.append_log(
            LogLevel::Info,
            "Fault Injection Skipped",
            "No eligible process or file available for fault injection",
        );
    }
    faults
}

/// Applies one fault of the given kind to a uniformly drawn eligible target.
/// Returns None when nothing is eligible.
pub fn apply_fault<R: Rng + ?Sized>(store: &mut EntityStore, kind: FaultKind, rng: &mut R) -> Option<Fault> {
    match kind {
        FaultKind::Crash | FaultKind::Freeze | FaultKind::HighLoad => fault_process(store, kind, rng),
        FaultKind::Corruption => corrupt_file(store, rng),
    }
}

fn fault_process<R: Rng + ?Sized>(store: &mut EntityStore, kind: FaultKind, rng: &mut R) -> Option<Fault> {
    let now = OffsetDateTime::now_utc();
    let (cfg, processes, _) = store.parts_mut();

    let running: Vec<usize> = processes
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_running())
        .map(|(i, _)| i)
        .collect();
    if running.is_empty() {
        return None;
    }
    let process = &mut processes[running[rng.gen_range(0..running.len())]];

    let (severity, level, event, description) = match kind {
        FaultKind::Crash => {
            process.status = ProcessStatus::Crashed;
            process.cpu = 0.0;
            (
                Severity::High,
                LogLevel::Error,
                "Process Crashed",
                format!("Process {} (PID {}) terminated unexpectedly", process.name, process.id),
            )
        }
        FaultKind::Freeze => {
            process.status = ProcessStatus::Frozen;
            process.last_heartbeat = now - Duration::seconds(cfg.freeze_backdate_secs);
            (
                Severity::Medium,
                LogLevel::Warning,
                "Process Frozen",
                format!("Process {} (PID {}) stopped responding to heartbeats", process.name, process.id),
            )
        }
        _ => {
            process.status = ProcessStatus::HighLoad;
            process.cpu = cfg.high_load_cpu.sample(rng);
            process.memory_mb = cfg.high_load_memory.sample(rng);
            (
                Severity::Medium,
                LogLevel::Warning,
                "High Resource Usage",
                format!(
                    "Process {} (PID {}) spiked to {:.1}% CPU and {:.0} MB",
                    process.name, process.id, process.cpu, process.memory_mb
                ),
            )
        }
    };
    clamp_metrics(cfg, process);

    let fault = Fault {
        kind,
        target_id: process.id.to_string(),
        target_name: process.name.clone(),
        severity,
        description,
    };
    store.append_log(level, event, fault.description.clone());
    Some(fault)
}

fn corrupt_file<R: Rng + ?Sized>(store: &mut EntityStore, rng: &mut R) -> Option<Fault> {
    let (_, _, files) = store.parts_mut();

    let healthy: Vec<usize> = files
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.corrupted)
        .map(|(i, _)| i)
        .collect();
    if healthy.is_empty() {
        return None;
    }
    let file = &mut files[healthy[rng.gen_range(0..healthy.len())]];

    file.corrupted = true;
    file.checksum = corrupted_checksum(rng);
    let fault = Fault {
        kind: FaultKind::Corruption,
        target_id: file.id.clone(),
        target_name: file.name.clone(),
        severity: Severity::High,
        description: format!("File {} ({}) failed checksum verification", file.name, file.path),
    };
    store.append_log(LogLevel::Error, "File Corrupted", fault.description.clone());
    Some(fault)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConf;
    use crate::models::ProcessPatch;
    use crate::store::tests::seeded_store;
    use crate::store::CORRUPTION_MARKER;

    #[test]
    fn test_category_partition() {
        assert_eq!(category_for(0.0, true), FaultKind::Crash);
        assert_eq!(category_for(0.29, true), FaultKind::Crash);
        assert_eq!(category_for(0.30, true), FaultKind::Freeze);
        assert_eq!(category_for(0.55, true), FaultKind::HighLoad);
        assert_eq!(category_for(0.70, true), FaultKind::Corruption);
        assert_eq!(category_for(0.99, true), FaultKind::Corruption);
        assert_eq!(category_for(0.10, false), FaultKind::Corruption);
    }

    #[test]
    fn test_crash_effects_and_log() {
        let (mut store, mut rng) = seeded_store(21);
        let fault = apply_fault(&mut store, FaultKind::Crash, &mut rng).unwrap();
        assert_eq!(fault.severity, Severity::High);

        let id: u32 = fault.target_id.parse().unwrap();
        let p = store.process(id).unwrap();
        assert_eq!(p.status, ProcessStatus::Crashed);
        assert_eq!(p.cpu, 0.0);

        let log = &store.recent_logs()[0];
        assert_eq!(log.level, LogLevel::Error);
        assert!(log.description.contains(&p.name));
        assert!(log.description.contains(&fault.target_id));
    }

    #[test]
    fn test_freeze_backdates_heartbeat() {
        let (mut store, mut rng) = seeded_store(22);
        let before = OffsetDateTime::now_utc();
        let fault = apply_fault(&mut store, FaultKind::Freeze, &mut rng).unwrap();
        assert_eq!(fault.severity, Severity::Medium);

        let p = store.process(fault.target_id.parse().unwrap()).unwrap();
        assert_eq!(p.status, ProcessStatus::Frozen);
        assert!(p.last_heartbeat <= before - Duration::seconds(29));
    }

    #[test]
    fn test_high_load_ranges() {
        let (mut store, mut rng) = seeded_store(23);
        let cfg = SimulationConf::default();
        let fault = apply_fault(&mut store, FaultKind::HighLoad, &mut rng).unwrap();

        let p = store.process(fault.target_id.parse().unwrap()).unwrap();
        assert_eq!(p.status, ProcessStatus::HighLoad);
        assert!(cfg.high_load_cpu.contains(p.cpu));
        assert!(cfg.high_load_memory.contains(p.memory_mb));
    }

    #[test]
    fn test_corruption_marks_file() {
        let (mut store, mut rng) = seeded_store(24);
        let fault = apply_fault(&mut store, FaultKind::Corruption, &mut rng).unwrap();

        let f = store.file(&fault.target_id).unwrap();
        assert!(f.corrupted);
        assert!(f.checksum.starts_with(CORRUPTION_MARKER));
        assert_eq!(store.recent_logs()[0].event, "File Corrupted");
    }

    #[test]
    fn test_process_faults_need_running_pool() {
        let (mut store, mut rng) = seeded_store(25);
        let ids: Vec<u32> = store.processes().iter().map(|p| p.id).collect();
        for id in ids {
            let patch = ProcessPatch { status: Some(ProcessStatus::Crashed), ..Default::default() };
            store.update_process(id, &patch).unwrap();
        }
        assert!(apply_fault(&mut store, FaultKind::Crash, &mut rng).is_none());
        assert!(apply_fault(&mut store, FaultKind::Freeze, &mut rng).is_none());

        // all rounds fall back to corruption
        let faults = inject_faults(&mut store, &mut rng);
        assert!(!faults.is_empty());
        assert!(faults.iter().all(|f| f.kind == FaultKind::Corruption));
    }

    #[test]
    fn test_nothing_eligible_logs_skip() {
        let (mut store, mut rng) = seeded_store(26);
        let ids: Vec<u32> = store.processes().iter().map(|p| p.id).collect();
        for id in ids {
            let patch = ProcessPatch { status: Some(ProcessStatus::Frozen), ..Default::default() };
            store.update_process(id, &patch).unwrap();
        }
        while apply_fault(&mut store, FaultKind::Corruption, &mut rng).is_some() {}
        let logs_before = store.log_len();

        let faults = inject_faults(&mut store, &mut rng);
        assert!(faults.is_empty());
        assert_eq!(store.log_len(), logs_before + 1);
        assert_eq!(store.recent_logs()[0].event, "Fault Injection Skipped");
    }

    #[test]
    fn test_metrics_stay_in_bounds_across_rounds() {
        let cfg = SimulationConf::default();
        for seed in 0..200 {
            let (mut store, mut rng) = seeded_store(1_000 + seed);
            for _ in 0..5 {
                inject_faults(&mut store, &mut rng);
                crate::drift::drift_tick(&mut store, &mut rng);
                for p in store.processes() {
                    assert!(cfg.cpu_limits.contains(p.cpu), "seed {seed}: cpu {} out of bounds", p.cpu);
                    assert!(
                        cfg.memory_limits.contains(p.memory_mb),
                        "seed {seed}: memory {} out of bounds",
                        p.memory_mb
                    );
                }
            }
        }
    }

    #[test]
    fn test_inject_count_and_logs() {
        for seed in 0..40 {
            let (mut store, mut rng) = seeded_store(100 + seed);
            let logs_before = store.log_len();
            let faults = inject_faults(&mut store, &mut rng);

            assert!((1..=MAX_FAULTS_PER_CALL).contains(&faults.len()));
            assert_eq!(store.log_len(), logs_before + faults.len());
        }
    }
}
