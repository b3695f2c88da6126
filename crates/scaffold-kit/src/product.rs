//! Product configuration trait for CLI binaries
//!
//! Each binary built on this library implements the trait to describe what it
//! scaffolds and which runtime that project needs.

use crate::runtime::probe::RuntimeRequirement;
use crate::templates::fetcher::EmbeddedFiles;
use std::path::Path;

/// Configuration trait for scaffolding products
///
/// Each product defines:
/// - Product identity (name, display name)
/// - The template bundle compiled into the binary, and how to override it
/// - The runtime the generated project needs
/// - Documentation links and post-setup instructions
pub trait ProductConfig: Clone + Send + Sync + 'static {
    /// Internal product name (used for CLI command, env vars)
    fn name(&self) -> &'static str;

    /// Human-readable display name
    fn display_name(&self) -> &'static str;

    /// Name of the template bundle (remote zips are `<name>.zip`)
    fn template_name(&self) -> &'static str;

    /// Bundle files embedded at build time
    fn embedded_templates(&self) -> EmbeddedFiles;

    /// Environment variable name for loading templates from a URL instead
    fn template_url_env(&self) -> &'static str;

    /// Project directory created when none is given
    fn default_project_dir(&self) -> &'static str;

    /// Runtime the generated project needs, and its default minimum version
    fn runtime(&self) -> RuntimeRequirement;

    /// URL for product documentation
    fn docs_url(&self) -> &'static str;

    /// Generate the "next steps" instructions after project creation
    fn next_steps(&self, dir: &Path) -> Vec<String>;

    /// Upgrade/install command shown in version warnings
    fn upgrade_command(&self) -> &'static str;

    /// User agent string for HTTP requests
    fn user_agent(&self) -> &'static str {
        self.name()
    }
}
