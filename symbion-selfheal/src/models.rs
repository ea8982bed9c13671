/**
 * MODELS - Entities and transient records of the simulated OS
 *
 * ROLE: Typed shape of everything the dashboard sees: processes, files,
 * event log entries, injected faults, heal results and the derived health.
 *
 * All timestamps are UTC `OffsetDateTime`, serialized as RFC 3339.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Running,
    Crashed,
    Frozen,
    HighLoad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    pub id: u32,
    pub name: String,
    pub memory_mb: f64,
    pub cpu: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub last_heartbeat: OffsetDateTime,
    pub status: ProcessStatus,
}

impl Process {
    pub fn is_running(&self) -> bool {
        self.status == ProcessStatus::Running
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    pub path: String,
    pub size_bytes: u64,
    pub checksum: String,
    pub corrupted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub level: LogLevel,
    pub event: String,
    pub description: String,
}

/// Log payload supplied by a caller; id and timestamp are assigned by the store.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewLogEntry {
    pub level: LogLevel,
    pub event: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Crash,
    Freeze,
    HighLoad,
    Corruption,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Crash => "crash",
            FaultKind::Freeze => "freeze",
            FaultKind::HighLoad => "high_load",
            FaultKind::Corruption => "corruption",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crash" => Ok(FaultKind::Crash),
            "freeze" => Ok(FaultKind::Freeze),
            "high_load" | "high-load" => Ok(FaultKind::HighLoad),
            "corruption" => Ok(FaultKind::Corruption),
            other => Err(format!("unknown fault kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub target_id: String,
    pub target_name: String,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealAction {
    Restart,
    Unfreeze,
    Optimize,
    Restore,
    Repair,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealResult {
    pub success: bool,
    pub action: HealAction,
    pub target_id: String,
    pub target_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub total_processes: usize,
    pub healthy_processes: usize,
    pub faulty_processes: usize,
    pub total_files: usize,
    pub corrupted_files: usize,
    pub status: HealthStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Everything the dashboard renders, read under a single store lock.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub processes: Vec<Process>,
    pub files: Vec<FileEntry>,
    pub logs: Vec<LogEntry>,
    pub health: SystemHealth,
}

/// Partial update of a process. Only these fields can be overlaid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessPatch {
    pub name: Option<String>,
    pub memory_mb: Option<f64>,
    pub cpu: Option<f64>,
    pub status: Option<ProcessStatus>,
}

/// Partial update of a file. `size_bytes` is fixed at creation and not patchable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilePatch {
    pub name: Option<String>,
    pub path: Option<String>,
    pub checksum: Option<String>,
    pub corrupted: Option<bool>,
}
