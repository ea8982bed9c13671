/**
 * ENTITY STORE - Authoritative in-memory state of the simulated OS
 *
 * ROLE:
 * Owns the fixed pool of synthetic processes, the fixed set of files and the
 * bounded event log shown on the dashboard. Drift, injection and healing all
 * write through this store.
 *
 * RULES:
 * - Entities are created once by `seed` and never removed
 * - cpu / memory are clamped to the configured limits on every mutation
 * - The log keeps at most LOG_RETENTION entries (oldest evicted first),
 *   reads return at most LOG_VIEW_LIMIT, newest first
 */

use crate::config::SimulationConf;
use crate::error::KernelError;
use crate::models::{FileEntry, FilePatch, LogEntry, LogLevel, Process, ProcessPatch, ProcessStatus};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

pub type SharedStore = Arc<Mutex<EntityStore>>;

pub const LOG_RETENTION: usize = 100;
pub const LOG_VIEW_LIMIT: usize = 50;
pub const CHECKSUM_LEN: usize = 32;
pub const CORRUPTION_MARKER: &str = "CORRUPTED_";

const PROCESS_NAMES: &[&str] = &[
    "systemd", "kernel_task", "sshd", "nginx", "postgres", "redis-server", "dockerd", "cron",
];

// (name, path, size in bytes)
const FILE_TEMPLATES: &[(&str, &str, u64)] = &[
    ("passwd", "/etc/passwd", 2_847),
    ("hosts", "/etc/hosts", 412),
    ("nginx.conf", "/etc/nginx/nginx.conf", 5_231),
    ("syslog", "/var/log/syslog", 1_048_576),
    ("bash", "/usr/bin/bash", 1_183_448),
    ("libc.so.6", "/usr/lib/x86_64-linux-gnu/libc.so.6", 2_220_400),
    ("vmlinuz", "/boot/vmlinuz", 11_534_336),
    ("postgresql.conf", "/etc/postgresql/postgresql.conf", 29_872),
];

const HEX: &[u8; 16] = b"0123456789abcdef";

pub fn random_hex<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| HEX[rng.gen_range(0..HEX.len())] as char).collect()
}

pub fn generate_checksum<R: Rng + ?Sized>(rng: &mut R) -> String {
    random_hex(rng, CHECKSUM_LEN)
}

/// Checksum written on corruption: marker prefix, same length as a healthy one.
pub fn corrupted_checksum<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{CORRUPTION_MARKER}{}", random_hex(rng, CHECKSUM_LEN - CORRUPTION_MARKER.len()))
}

pub(crate) fn clamp_metrics(cfg: &SimulationConf, process: &mut Process) {
    process.cpu = cfg.cpu_limits.clamp(process.cpu);
    process.memory_mb = cfg.memory_limits.clamp(process.memory_mb);
}

pub struct EntityStore {
    config: SimulationConf,
    processes: Vec<Process>,
    files: Vec<FileEntry>,
    logs: VecDeque<LogEntry>,
    initialized: bool,
}

impl EntityStore {
    pub fn new(config: SimulationConf) -> Self {
        Self {
            config,
            processes: Vec::new(),
            files: Vec::new(),
            logs: VecDeque::with_capacity(LOG_RETENTION),
            initialized: false,
        }
    }

    pub fn config(&self) -> &SimulationConf {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Populates processes, files and the startup log entry.
    /// Returns false (and changes nothing) when the store was already seeded.
    pub fn seed<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.initialized {
            return false;
        }

        let now = OffsetDateTime::now_utc();
        for i in 0..self.config.process_count {
            // validate() rules this out for loaded configs
            let Some(id) = u32::try_from(i).ok().and_then(|i| self.config.process_id_base.checked_add(i)) else {
                break;
            };
            let name = PROCESS_NAMES[rng.gen_range(0..PROCESS_NAMES.len())];
            let cpu = self.config.cpu_limits.clamp(self.config.nominal_cpu.sample(rng));
            let memory = self.config.memory_limits.clamp(self.config.nominal_memory.sample(rng));
            self.processes.push(Process {
                id,
                name: name.to_string(),
                memory_mb: memory,
                cpu,
                last_heartbeat: now,
                status: ProcessStatus::Running,
            });
        }

        for (name, path, size) in FILE_TEMPLATES {
            let age = Duration::seconds(rng.gen_range(0..86_400));
            self.files.push(FileEntry {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                path: path.to_string(),
                size_bytes: *size,
                checksum: generate_checksum(rng),
                corrupted: false,
                last_modified: now - age,
            });
        }

        let description = format!(
            "Self-healing OS online with {} processes and {} monitored files",
            self.processes.len(),
            self.files.len()
        );
        self.append_log(LogLevel::Info, "System Initialized", description);
        self.initialized = true;
        true
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn process(&self, id: u32) -> Option<&Process> {
        self.processes.iter().find(|p| p.id == id)
    }

    pub fn file(&self, id: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn log_len(&self) -> usize {
        self.logs.len()
    }

    /// Most recent LOG_VIEW_LIMIT entries, newest first.
    pub fn recent_logs(&self) -> Vec<LogEntry> {
        self.logs.iter().rev().take(LOG_VIEW_LIMIT).cloned().collect()
    }

    pub fn append_log(&mut self, level: LogLevel, event: impl Into<String>, description: impl Into<String>) -> LogEntry {
        let mut timestamp = OffsetDateTime::now_utc();
        // wall clock may step back; keep the buffer ordered
        if let Some(last) = self.logs.back() {
            timestamp = timestamp.max(last.timestamp);
        }

        let entry = LogEntry {
            id: Uuid::new_v4().to_string(),
            timestamp,
            level,
            event: event.into(),
            description: description.into(),
        };
        self.logs.push_back(entry.clone());
        while self.logs.len() > LOG_RETENTION {
            self.logs.pop_front();
        }
        entry
    }

    /// Split borrow for mutators that read limits while writing entities.
    pub(crate) fn parts_mut(&mut self) -> (&SimulationConf, &mut [Process], &mut [FileEntry]) {
        (&self.config, &mut self.processes, &mut self.files)
    }

    /// Overlays the recognised fields of `patch` onto a process, then clamps.
    /// Validation happens before anything is written.
    pub fn update_process(&mut self, id: u32, patch: &ProcessPatch) -> Result<Process, KernelError> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(KernelError::InvalidInput("name must not be empty".into()));
            }
        }
        for (field, value) in [("cpu", patch.cpu), ("memory_mb", patch.memory_mb)] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(KernelError::InvalidInput(format!("{field} must be a finite number")));
            }
        }

        let cpu_limits = self.config.cpu_limits;
        let memory_limits = self.config.memory_limits;
        let process = self
            .processes
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(KernelError::ProcessNotFound(id))?;

        if let Some(name) = &patch.name {
            process.name = name.clone();
        }
        if let Some(cpu) = patch.cpu {
            process.cpu = cpu_limits.clamp(cpu);
        }
        if let Some(memory) = patch.memory_mb {
            process.memory_mb = memory_limits.clamp(memory);
        }
        if let Some(status) = patch.status {
            process.status = status;
        }
        Ok(process.clone())
    }

    pub fn update_file(&mut self, id: &str, patch: &FilePatch) -> Result<FileEntry, KernelError> {
        for (field, value) in [("name", &patch.name), ("path", &patch.path)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(KernelError::InvalidInput(format!("{field} must not be empty")));
            }
        }
        if let Some(checksum) = &patch.checksum {
            if checksum.chars().count() != CHECKSUM_LEN {
                return Err(KernelError::InvalidInput(format!("checksum must be {CHECKSUM_LEN} characters")));
            }
        }

        let file = self
            .files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| KernelError::FileNotFound(id.to_string()))?;

        let mut changed = false;
        if let Some(name) = &patch.name {
            changed |= file.name != *name;
            file.name = name.clone();
        }
        if let Some(path) = &patch.path {
            changed |= file.path != *path;
            file.path = path.clone();
        }
        if let Some(checksum) = &patch.checksum {
            changed |= file.checksum != *checksum;
            file.checksum = checksum.clone();
        }
        if let Some(corrupted) = patch.corrupted {
            changed |= file.corrupted != corrupted;
            file.corrupted = corrupted;
        }
        if changed {
            file.last_modified = OffsetDateTime::now_utc();
        }
        Ok(file.clone())
    }
}
