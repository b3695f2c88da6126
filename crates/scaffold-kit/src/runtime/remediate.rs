//! Runtime installation strategies and the engine that runs them

use crate::report::Reporter;
use crate::runtime::probe::{CapabilityRecord, HostEnv, OsFamily, PackageManager, Prober};
use crate::runtime::runner::{CommandError, CommandRunner, CommandSpec};
use std::ffi::OsString;
use std::fmt;
use std::io;
use thiserror::Error;

/// Pinned nvm release used by the version-manager strategy
pub const NVM_VERSION: &str = "v0.39.7";

/// Sourcing prelude for nvm, which only exists as a shell function
const NVM_PRELUDE: &str =
    r#"export NVM_DIR="${NVM_DIR:-$HOME/.nvm}"; [ -s "$NVM_DIR/nvm.sh" ] && . "$NVM_DIR/nvm.sh""#;

/// Re-reads the user's shell profile and prints the resulting PATH
const RELOAD_PROFILE_SCRIPT: &str = r#"for f in "$HOME/.profile" "$HOME/.bash_profile" "$HOME/.bashrc"; do [ -f "$f" ] && . "$f" >/dev/null 2>&1; done; export NVM_DIR="${NVM_DIR:-$HOME/.nvm}"; [ -s "$NVM_DIR/nvm.sh" ] && . "$NVM_DIR/nvm.sh" >/dev/null 2>&1; printf '%s' "$PATH""#;

/// Minimum runtime version the project needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub minimum_major_version: u64,
}

impl Policy {
    pub fn new(minimum_major_version: u64) -> Self {
        Self {
            minimum_major_version,
        }
    }

    /// A missing or unparseable version never satisfies the policy
    pub fn is_satisfied_by(&self, capability: &CapabilityRecord) -> bool {
        capability
            .runtime_major_version
            .is_some_and(|major| major >= self.minimum_major_version)
    }
}

/// How the runtime gets installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationStrategy {
    /// Vendor package repository through the system package manager
    PackageRepositoryInstall {
        os_family: OsFamily,
        manager: PackageManager,
    },
    /// User-space install through nvm
    VersionManagerInstall,
}

impl fmt::Display for RemediationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemediationStrategy::PackageRepositoryInstall {
                manager: PackageManager::Homebrew,
                ..
            } => write!(f, "Homebrew"),
            RemediationStrategy::PackageRepositoryInstall { manager, .. } => {
                write!(f, "NodeSource packages ({})", manager.program())
            }
            RemediationStrategy::VersionManagerInstall => write!(f, "nvm {}", NVM_VERSION),
        }
    }
}

/// Pick the strategy for a host; purely a function of the capability record
///
/// Hosts whose preferred package manager is missing fall back to nvm.
pub fn select_strategy(capability: &CapabilityRecord) -> RemediationStrategy {
    match (capability.os_family, capability.package_manager) {
        (OsFamily::Debian, Some(manager @ PackageManager::Apt))
        | (OsFamily::RedHat, Some(manager @ (PackageManager::Dnf | PackageManager::Yum)))
        | (OsFamily::MacOs, Some(manager @ PackageManager::Homebrew)) => {
            RemediationStrategy::PackageRepositoryInstall {
                os_family: capability.os_family,
                manager,
            }
        }
        _ => RemediationStrategy::VersionManagerInstall,
    }
}

/// Whether a failing step aborts the strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    Required,
    /// Cleanup or refresh; failure is reported and ignored
    BestEffort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub label: String,
    pub command: CommandSpec,
    pub policy: StepPolicy,
}

impl Step {
    fn required(label: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            label: label.into(),
            command,
            policy: StepPolicy::Required,
        }
    }

    fn best_effort(label: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            label: label.into(),
            command,
            policy: StepPolicy::BestEffort,
        }
    }
}

/// Prefix with sudo when it is available (root shells in containers lack it)
fn privileged(use_sudo: bool, program: &str, args: &[&str]) -> CommandSpec {
    if use_sudo {
        let mut full = vec![program];
        full.extend_from_slice(args);
        CommandSpec::new("sudo", &full)
    } else {
        CommandSpec::new(program, args)
    }
}

impl RemediationStrategy {
    /// The ordered command list for installing major version `major`
    pub fn steps(&self, major: u64, use_sudo: bool) -> Vec<Step> {
        // NodeSource setup scripts need the caller's proxy variables
        let sudo_env_prefix = if use_sudo { "sudo -E " } else { "" };

        match *self {
            RemediationStrategy::PackageRepositoryInstall {
                manager: PackageManager::Apt,
                ..
            } => vec![
                Step::best_effort(
                    "Refresh package index",
                    privileged(use_sudo, "apt-get", &["update"]),
                ),
                Step::best_effort(
                    "Remove existing nodejs package",
                    privileged(use_sudo, "apt-get", &["remove", "-y", "nodejs"]),
                ),
                Step::required(
                    format!("Add NodeSource {}.x repository", major),
                    CommandSpec::sh(format!(
                        "curl -fsSL https://deb.nodesource.com/setup_{}.x | {}bash -",
                        major, sudo_env_prefix
                    )),
                ),
                Step::required(
                    "Install nodejs",
                    privileged(use_sudo, "apt-get", &["install", "-y", "nodejs"]),
                ),
            ],
            RemediationStrategy::PackageRepositoryInstall {
                manager: manager @ (PackageManager::Dnf | PackageManager::Yum),
                ..
            } => vec![
                Step::best_effort(
                    "Remove existing nodejs package",
                    privileged(use_sudo, manager.program(), &["remove", "-y", "nodejs"]),
                ),
                Step::required(
                    format!("Add NodeSource {}.x repository", major),
                    CommandSpec::sh(format!(
                        "curl -fsSL https://rpm.nodesource.com/setup_{}.x | {}bash -",
                        major, sudo_env_prefix
                    )),
                ),
                Step::required(
                    "Install nodejs",
                    privileged(use_sudo, manager.program(), &["install", "-y", "nodejs"]),
                ),
            ],
            RemediationStrategy::PackageRepositoryInstall {
                manager: PackageManager::Homebrew,
                ..
            } => {
                let formula = format!("node@{}", major);
                vec![
                    Step::best_effort("Update Homebrew", CommandSpec::new("brew", &["update"])),
                    Step::best_effort(
                        "Unlink existing node",
                        CommandSpec::new("brew", &["unlink", "node"]),
                    ),
                    Step::required(
                        format!("Install {}", formula),
                        CommandSpec::new("brew", &["install", &formula]),
                    ),
                    Step::required(
                        format!("Link {}", formula),
                        CommandSpec::new("brew", &["link", "--overwrite", "--force", &formula]),
                    ),
                ]
            }
            RemediationStrategy::VersionManagerInstall => vec![
                Step::required(
                    format!("Install nvm {}", NVM_VERSION),
                    CommandSpec::sh(format!(
                        "curl -o- https://raw.githubusercontent.com/nvm-sh/nvm/{}/install.sh | bash",
                        NVM_VERSION
                    )),
                ),
                Step::required(
                    format!("Install Node.js {} with nvm", major),
                    CommandSpec::bash(format!(
                        "{} && nvm install {} && nvm alias default {}",
                        NVM_PRELUDE, major, major
                    )),
                ),
            ],
        }
    }
}

#[derive(Debug, Error)]
pub enum RemediationError {
    #[error("{step} failed ({status})\ntip: run `{command}` manually to see the full error, then re-run")]
    StepFailed {
        step: String,
        command: String,
        status: String,
    },

    #[error("could not start '{step}': {source}\ntip: make sure `{program}` is installed and on your PATH")]
    Spawn {
        step: String,
        program: String,
        source: io::Error,
    },

    #[error("{runtime} {found} is still active after installation, but {required}+ is required\ntip: reload your shell (or open a new terminal) and re-run")]
    PolicyStillUnmet {
        runtime: String,
        found: String,
        required: u64,
    },

    #[error("{runtime} was not found after installation\ntip: reload your shell (or open a new terminal) and re-run, or install {runtime} {required}+ manually")]
    RuntimeMissing { runtime: String, required: u64 },

    #[error(transparent)]
    Terminal(#[from] io::Error),
}

/// Runs a strategy, reloads the profile and re-probes
pub struct RemediationEngine<'a, H: HostEnv, R: CommandRunner, P: Reporter> {
    prober: &'a mut Prober<H>,
    runner: &'a R,
    reporter: &'a P,
    policy: Policy,
}

impl<'a, H: HostEnv, R: CommandRunner, P: Reporter> RemediationEngine<'a, H, R, P> {
    pub fn new(prober: &'a mut Prober<H>, runner: &'a R, reporter: &'a P, policy: Policy) -> Self {
        Self {
            prober,
            runner,
            reporter,
            policy,
        }
    }

    /// Install the runtime and confirm the result; never retries
    pub async fn remediate(
        &mut self,
        strategy: &RemediationStrategy,
    ) -> Result<CapabilityRecord, RemediationError> {
        let runtime = self.prober.runtime().display_name;
        let use_sudo = self.prober.host().find_executable("sudo", None).is_some();
        let steps = strategy.steps(self.policy.minimum_major_version, use_sudo);

        self.reporter.info(&format!(
            "Installing {} {} via {}",
            runtime, self.policy.minimum_major_version, strategy
        ))?;

        for step in &steps {
            self.reporter.step(&step.label)?;
            match self.runner.run(&step.command).await {
                Ok(()) => {}
                Err(e) if step.policy == StepPolicy::BestEffort => {
                    self.reporter
                        .warning(&format!("{} failed ({}), continuing", step.label, e))?;
                }
                Err(CommandError::Spawn(source)) => {
                    return Err(RemediationError::Spawn {
                        step: step.label.clone(),
                        program: step.command.program.clone(),
                        source,
                    });
                }
                Err(CommandError::Exit { status }) => {
                    return Err(RemediationError::StepFailed {
                        step: step.label.clone(),
                        command: step.command.to_string(),
                        status,
                    });
                }
            }
        }

        if let Some(path) = self.reload_profile().await? {
            self.prober.set_search_path(path);
        }

        let record = self.prober.probe();
        if !record.runtime_present {
            return Err(RemediationError::RuntimeMissing {
                runtime: runtime.to_string(),
                required: self.policy.minimum_major_version,
            });
        }
        if !self.policy.is_satisfied_by(&record) {
            return Err(RemediationError::PolicyStillUnmet {
                runtime: runtime.to_string(),
                found: record.runtime_summary(),
                required: self.policy.minimum_major_version,
            });
        }

        Ok(record)
    }

    /// Best-effort: a missing profile or shell just keeps the current PATH
    async fn reload_profile(&self) -> Result<Option<OsString>, RemediationError> {
        let path = self
            .runner
            .capture(&CommandSpec::bash(RELOAD_PROFILE_SCRIPT))
            .await
            .filter(|p| !p.is_empty());
        if path.is_none() {
            self.reporter
                .info("Could not reload shell profile, keeping current PATH")?;
        }
        Ok(path.map(OsString::from))
    }
}
