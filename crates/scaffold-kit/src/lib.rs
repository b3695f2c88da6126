//! Scaffold Kit - bootstrap library for project scaffolding CLIs
//!
//! This library makes sure the host has the runtime a generated project
//! needs, installs it when it does not, and then writes the project tree from
//! a template bundle. Binaries plug in their product through [`ProductConfig`].
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Layer 1: Core Operations** - Host probing, installation strategies, template loading and materialization
//! - **Layer 2: Workflow Orchestration** - [`Orchestrator`] drives one run against injected host, runner, confirmer and reporter
//! - **Layer 3: CLI/TUI Interface** - Optional cliclack-based front end (feature-gated)
//!
//! # Feature Flags
//!
//! - `tui` (default): Enables the cliclack-based `tui` module
//!
//! # Example Usage (without TUI)
//!
//! ```ignore
//! use scaffold_kit::{confirm, runtime, templates, Orchestrator, RunPlan};
//!
//! let prober = runtime::Prober::new(runtime::SystemHost, config.runtime());
//! let runner = runtime::SystemRunner;
//! let confirmer = confirm::AutoConfirm;
//! let mut orchestrator = Orchestrator::new(prober, &runner, &confirmer, &my_reporter);
//! let summary = orchestrator.run(&plan).await?;
//! ```

pub mod confirm;
pub mod orchestrator;
pub mod product;
pub mod report;
pub mod runtime;
pub mod templates;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export main types for convenience
pub use confirm::{AssumeDefault, AutoConfirm, Confirmer, LineConfirmer};
pub use orchestrator::{Orchestrator, RunError, RunPlan, RunSummary, Stage};
pub use product::ProductConfig;
pub use report::Reporter;
pub use runtime::{CapabilityRecord, OsFamily, Policy, Prober, RemediationStrategy};
pub use templates::{LoadedTemplate, ManifestEntry, RenderContext, TemplateFetcher, TemplateSource};

#[cfg(feature = "tui")]
pub use tui::{run, CreateArgs};

/// CLI version - used for template compatibility checking
/// Each binary should define its own version, but this provides a fallback
pub const DEFAULT_CLI_VERSION: &str = "0.1.0";
