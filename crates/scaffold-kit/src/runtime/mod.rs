//! Runtime detection and installation
//!
//! This module provides:
//! - Host probing (OS family, package manager, runtime version)
//! - Installation strategies as data, and the engine that runs them
//! - The process runner used by the engine

pub mod probe;
pub mod remediate;
pub mod runner;

pub use probe::{
    CapabilityRecord, HostEnv, OsFamily, PackageManager, Prober, RuntimeRequirement, SystemHost,
};
pub use remediate::{
    select_strategy, Policy, RemediationEngine, RemediationError, RemediationStrategy, Step,
    StepPolicy,
};
pub use runner::{CommandError, CommandRunner, CommandSpec, SystemRunner};
