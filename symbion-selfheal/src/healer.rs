/**
 * HEALER - Automated recovery of the simulated OS
 *
 * ROLE: Scans every entity and repairs whatever is faulted, in four passes:
 *   1. crashed   -> restart   (running, nominal metrics, fresh heartbeat)
 *   2. frozen    -> unfreeze  (running, fresh heartbeat, metrics untouched)
 *   3. high_load -> optimize  (running, nominal metrics)
 *   4. corrupted -> restore   (checksum regenerated, last_modified refreshed)
 *
 * Healing always succeeds for an entity in a repairable state. Targeted
 * repairs report "not found" / "not corrupted" as failed results, not errors.
 */

use crate::config::SimulationConf;
use crate::models::{FileEntry, HealAction, HealResult, LogLevel, Process, ProcessStatus};
use crate::store::{clamp_metrics, generate_checksum, EntityStore};
use rand::Rng;
use time::OffsetDateTime;

fn event_for(action: HealAction) -> &'static str {
    match action {
        HealAction::Restart => "Process Restarted",
        HealAction::Unfreeze => "Process Unfrozen",
        HealAction::Optimize => "Process Optimized",
        HealAction::Restore => "File Restored",
        HealAction::Repair => "File Repaired",
    }
}

fn failed(action: HealAction, target_id: String, target_name: String, message: String) -> HealResult {
    HealResult { success: false, action, target_id, target_name, message }
}

/// Brings a faulted process back to running. Returns the action taken.
fn recover_process<R: Rng + ?Sized>(
    cfg: &SimulationConf,
    process: &mut Process,
    rng: &mut R,
    now: OffsetDateTime,
) -> Option<HealResult> {
    let (action, message) = match process.status {
        ProcessStatus::Running => return None,
        ProcessStatus::Crashed => {
            process.cpu = cfg.nominal_cpu.sample(rng);
            process.memory_mb = cfg.nominal_memory.sample(rng);
            process.last_heartbeat = now;
            (HealAction::Restart, format!("Restarted crashed process {} (PID {})", process.name, process.id))
        }
        ProcessStatus::Frozen => {
            process.last_heartbeat = now;
            (HealAction::Unfreeze, format!("Unfroze process {} (PID {})", process.name, process.id))
        }
        ProcessStatus::HighLoad => {
            process.cpu = cfg.nominal_cpu.sample(rng);
            process.memory_mb = cfg.nominal_memory.sample(rng);
            (
                HealAction::Optimize,
                format!("Optimized resource usage of {} (PID {})", process.name, process.id),
            )
        }
    };
    process.status = ProcessStatus::Running;
    clamp_metrics(cfg, process);

    Some(HealResult {
        success: true,
        action,
        target_id: process.id.to_string(),
        target_name: process.name.clone(),
        message,
    })
}

fn restore_file<R: Rng + ?Sized>(file: &mut FileEntry, action: HealAction, rng: &mut R, now: OffsetDateTime) -> HealResult {
    file.corrupted = false;
    file.checksum = generate_checksum(rng);
    file.last_modified = now;
    HealResult {
        success: true,
        action,
        target_id: file.id.clone(),
        target_name: file.name.clone(),
        message: format!("Restored {} from backup, checksum verified", file.path),
    }
}

fn log_results(store: &mut EntityStore, results: &[HealResult]) {
    for result in results {
        store.append_log(LogLevel::Success, event_for(result.action), result.message.clone());
    }
}

/// Repairs every faulted entity. Logs a single "System Check" entry when
/// nothing needed repair.
pub fn heal_all<R: Rng + ?Sized>(store: &mut EntityStore, rng: &mut R) -> Vec<HealResult> {
    let now = OffsetDateTime::now_utc();
    let mut results = Vec::new();
    {
        let (cfg, processes, files) = store.parts_mut();
        for status in [ProcessStatus::Crashed, ProcessStatus::Frozen, ProcessStatus::HighLoad] {
            for process in processes.iter_mut().filter(|p| p.status == status) {
                results.extend(recover_process(cfg, process, rng, now));
            }
        }
        for file in files.iter_mut().filter(|f| f.corrupted) {
            results.push(restore_file(file, HealAction::Restore, rng, now));
        }
    }

    if results.is_empty() {
        store.append_log(LogLevel::Info, "System Check", "All processes and files are healthy, nothing to heal");
    } else {
        log_results(store, &results);
    }
    results
}

pub fn repair_file<R: Rng + ?Sized>(store: &mut EntityStore, id: &str, rng: &mut R) -> HealResult {
    let now = OffsetDateTime::now_utc();
    let (_, _, files) = store.parts_mut();

    let Some(file) = files.iter_mut().find(|f| f.id == id) else {
        return failed(HealAction::Repair, id.to_string(), String::new(), format!("File {id} not found"));
    };
    if !file.corrupted {
        return failed(
            HealAction::Repair,
            file.id.clone(),
            file.name.clone(),
            format!("File {} is not corrupted", file.name),
        );
    }

    let result = restore_file(file, HealAction::Repair, rng, now);
    log_results(store, std::slice::from_ref(&result));
    result
}

pub fn repair_process<R: Rng + ?Sized>(store: &mut EntityStore, id: u32, rng: &mut R) -> HealResult {
    let now = OffsetDateTime::now_utc();
    let (cfg, processes, _) = store.parts_mut();

    let Some(process) = processes.iter_mut().find(|p| p.id == id) else {
        return failed(HealAction::Restart, id.to_string(), String::new(), format!("Process {id} not found"));
    };
    let Some(result) = recover_process(cfg, process, rng, now) else {
        return failed(
            HealAction::Restart,
            process.id.to_string(),
            process.name.clone(),
            format!("Process {} (PID {}) is not faulted", process.name, process.id),
        );
    };

    log_results(store, std::slice::from_ref(&result));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::{apply_fault, inject_faults};
    use crate::models::FaultKind;
    use crate::store::tests::seeded_store;

    #[test]
    fn test_heal_restores_every_category() {
        let (mut store, mut rng) = seeded_store(31);
        let cfg = SimulationConf::default();
        for kind in [FaultKind::Crash, FaultKind::Freeze, FaultKind::HighLoad, FaultKind::Corruption] {
            apply_fault(&mut store, kind, &mut rng).unwrap();
        }

        let results = heal_all(&mut store, &mut rng);
        let actions: Vec<HealAction> = results.iter().map(|r| r.action).collect();
        assert_eq!(
            actions,
            vec![HealAction::Restart, HealAction::Unfreeze, HealAction::Optimize, HealAction::Restore]
        );
        assert!(results.iter().all(|r| r.success));

        for p in store.processes() {
            assert_eq!(p.status, ProcessStatus::Running);
            assert!(cfg.cpu_limits.contains(p.cpu));
            assert!(cfg.memory_limits.contains(p.memory_mb));
        }
        assert!(store.files().iter().all(|f| !f.corrupted));
        let logs = store.recent_logs();
        assert!(logs[..4].iter().all(|l| l.level == LogLevel::Success));
    }

    #[test]
    fn test_unfreeze_keeps_metrics() {
        let (mut store, mut rng) = seeded_store(32);
        let fault = apply_fault(&mut store, FaultKind::Freeze, &mut rng).unwrap();
        let id: u32 = fault.target_id.parse().unwrap();
        let frozen = store.process(id).unwrap().clone();

        heal_all(&mut store, &mut rng);
        let healed = store.process(id).unwrap();
        assert_eq!(healed.status, ProcessStatus::Running);
        assert_eq!(healed.cpu, frozen.cpu);
        assert_eq!(healed.memory_mb, frozen.memory_mb);
        assert!(healed.last_heartbeat > frozen.last_heartbeat);
    }

    #[test]
    fn test_second_heal_is_a_system_check() {
        let (mut store, mut rng) = seeded_store(33);
        inject_faults(&mut store, &mut rng);
        assert!(!heal_all(&mut store, &mut rng).is_empty());

        let logs_before = store.log_len();
        let second = heal_all(&mut store, &mut rng);
        assert!(second.is_empty());
        assert_eq!(store.log_len(), logs_before + 1);
        let last = &store.recent_logs()[0];
        assert_eq!(last.level, LogLevel::Info);
        assert_eq!(last.event, "System Check");
    }

    #[test]
    fn test_repair_file_outcomes() {
        let (mut store, mut rng) = seeded_store(34);

        let missing = repair_file(&mut store, "does-not-exist", &mut rng);
        assert!(!missing.success);
        assert!(missing.message.contains("not found"));

        let healthy = store.files()[2].clone();
        let logs_before = store.log_len();
        let res = repair_file(&mut store, &healthy.id, &mut rng);
        assert!(!res.success);
        assert!(res.message.contains("not corrupted"));
        let after = store.file(&healthy.id).unwrap();
        assert_eq!(after.checksum, healthy.checksum);
        assert_eq!(after.last_modified, healthy.last_modified);
        assert_eq!(store.log_len(), logs_before);

        let fault = apply_fault(&mut store, FaultKind::Corruption, &mut rng).unwrap();
        let res = repair_file(&mut store, &fault.target_id, &mut rng);
        assert!(res.success);
        assert_eq!(res.action, HealAction::Repair);
        let repaired = store.file(&fault.target_id).unwrap();
        assert!(!repaired.corrupted);
        assert!(!repaired.checksum.starts_with(crate::store::CORRUPTION_MARKER));
        assert_eq!(store.recent_logs()[0].level, LogLevel::Success);
    }

    #[test]
    fn test_repair_process_outcomes() {
        let (mut store, mut rng) = seeded_store(35);
        assert!(!repair_process(&mut store, 9999, &mut rng).success);
        assert!(repair_process(&mut store, 1000, &mut rng).message.contains("not faulted"));

        let fault = apply_fault(&mut store, FaultKind::Crash, &mut rng).unwrap();
        let id: u32 = fault.target_id.parse().unwrap();
        let res = repair_process(&mut store, id, &mut rng);
        assert!(res.success);
        assert_eq!(res.action, HealAction::Restart);
        assert!(store.process(id).unwrap().is_running());
    }

    #[test]
    fn test_inject_then_heal_end_to_end() {
        for seed in 0..25 {
            let (mut store, mut rng) = seeded_store(500 + seed);
            let faults = inject_faults(&mut store, &mut rng);
            assert!((1..=3).contains(&faults.len()));

            for fault in &faults {
                match fault.kind {
                    FaultKind::Corruption => assert!(store.file(&fault.target_id).unwrap().corrupted),
                    kind => {
                        let p = store.process(fault.target_id.parse().unwrap()).unwrap();
                        let expected = match kind {
                            FaultKind::Crash => ProcessStatus::Crashed,
                            FaultKind::Freeze => ProcessStatus::Frozen,
                            _ => ProcessStatus::HighLoad,
                        };
                        assert_eq!(p.status, expected);
                    }
                }
            }

            let results = heal_all(&mut store, &mut rng);
            assert_eq!(results.len(), faults.len());
            assert!(store.processes().iter().all(|p| p.is_running()));
            assert!(store.files().iter().all(|f| !f.corrupted));
        }
    }
}
