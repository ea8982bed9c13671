use crate::error::KernelError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::warn;

/// Upper bound for `freeze_backdate_secs` (one day).
pub const MAX_FREEZE_BACKDATE_SECS: i64 = 86_400;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct KernelConfig {
    pub http: HttpConf,
    pub simulation: SimulationConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConf {
    pub bind: String, // ex: "0.0.0.0:8080"
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8080".into() }
    }
}

/// Closed interval used both as a clamp and as a sampling range.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.gen_range(self.min..=self.max)
    }

    fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    fn within(&self, outer: &Bounds) -> bool {
        self.min >= outer.min && self.max <= outer.max
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DriftConf {
    pub interval_ms: u64,
    pub cpu_step: f64,
    pub memory_step: f64,
}

impl Default for DriftConf {
    fn default() -> Self {
        Self { interval_ms: 3000, cpu_step: 5.0, memory_step: 10.0 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationConf {
    pub process_count: usize,
    pub process_id_base: u32,
    /// Hard floor/ceiling applied on every cpu mutation.
    pub cpu_limits: Bounds,
    /// Hard floor/ceiling applied on every memory mutation.
    pub memory_limits: Bounds,
    pub nominal_cpu: Bounds,
    pub nominal_memory: Bounds,
    pub high_load_cpu: Bounds,
    pub high_load_memory: Bounds,
    pub drift: DriftConf,
    pub freeze_backdate_secs: i64,
    /// Divisor turning mean memory (MB) into the dashboard's memory percentage.
    pub memory_scale: f64,
}

impl Default for SimulationConf {
    fn default() -> Self {
        Self {
            process_count: 6,
            process_id_base: 1000,
            cpu_limits: Bounds::new(0.0, 100.0),
            memory_limits: Bounds::new(10.0, 1024.0),
            nominal_cpu: Bounds::new(5.0, 30.0),
            nominal_memory: Bounds::new(50.0, 300.0),
            high_load_cpu: Bounds::new(85.0, 99.0),
            high_load_memory: Bounds::new(600.0, 950.0),
            drift: DriftConf::default(),
            freeze_backdate_secs: 30,
            memory_scale: 10.0,
        }
    }
}

impl KernelConfig {
    pub fn validate(&self) -> Result<(), KernelError> {
        let sim = &self.simulation;
        let named = [
            ("cpu_limits", sim.cpu_limits),
            ("memory_limits", sim.memory_limits),
            ("nominal_cpu", sim.nominal_cpu),
            ("nominal_memory", sim.nominal_memory),
            ("high_load_cpu", sim.high_load_cpu),
            ("high_load_memory", sim.high_load_memory),
        ];
        for (name, bounds) in named {
            if !bounds.is_valid() {
                return Err(KernelError::Config(format!("{name}: min must be <= max and finite")));
            }
        }
        if !sim.nominal_cpu.within(&sim.cpu_limits) || !sim.high_load_cpu.within(&sim.cpu_limits) {
            return Err(KernelError::Config("cpu ranges must lie inside cpu_limits".into()));
        }
        if !sim.nominal_memory.within(&sim.memory_limits) || !sim.high_load_memory.within(&sim.memory_limits) {
            return Err(KernelError::Config("memory ranges must lie inside memory_limits".into()));
        }
        if sim.drift.interval_ms == 0 {
            return Err(KernelError::Config("drift.interval_ms must be > 0".into()));
        }
        for (name, step) in [("drift.cpu_step", sim.drift.cpu_step), ("drift.memory_step", sim.drift.memory_step)] {
            if !(step.is_finite() && step >= 0.0) {
                return Err(KernelError::Config(format!("{name} must be finite and >= 0")));
            }
        }
        if !(sim.memory_scale.is_finite() && sim.memory_scale > 0.0) {
            return Err(KernelError::Config("memory_scale must be finite and > 0".into()));
        }
        if !(0..=MAX_FREEZE_BACKDATE_SECS).contains(&sim.freeze_backdate_secs) {
            return Err(KernelError::Config(format!(
                "freeze_backdate_secs must be between 0 and {MAX_FREEZE_BACKDATE_SECS}"
            )));
        }
        let last_offset = u32::try_from(sim.process_count.saturating_sub(1)).ok();
        if last_offset.and_then(|off| sim.process_id_base.checked_add(off)).is_none() {
            return Err(KernelError::Config("process_id_base + process_count overflows u32".into()));
        }
        Ok(())
    }
}

pub fn parse_config(txt: &str) -> Result<KernelConfig, KernelError> {
    if txt.trim().is_empty() {
        return Ok(KernelConfig::default());
    }
    let cfg: KernelConfig = serde_yaml::from_str(txt).map_err(|e| KernelError::Config(e.to_string()))?;
    cfg.validate()?;
    Ok(cfg)
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("SELFHEAL_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    let mut cfg = if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        parse_config(&txt).unwrap_or_else(|e| {
            warn!("[config] invalid {path}: {e}, using defaults");
            KernelConfig::default()
        })
    } else {
        warn!("[config] no {path}, using default configuration");
        KernelConfig::default()
    };

    if let Ok(bind) = std::env::var("SELFHEAL_BIND") {
        cfg.http.bind = bind;
    }
    cfg
}
