//! Symbion SelfHeal - simulated self-healing OS behind the monitoring dashboard.
//!
//! The kernel owns a fixed world of synthetic processes and files, drifts
//! their metrics in the background, injects random faults on demand and heals
//! them back to a nominal state. Health is derived from entity state on every
//! read.

pub mod config;
pub mod drift;
pub mod error;
pub mod healer;
pub mod health;
pub mod http;
pub mod injector;
pub mod kernel;
pub mod models;
pub mod store;

pub use error::KernelError;
pub use kernel::Kernel;
