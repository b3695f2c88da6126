//! The bootstrap run: probe, remediate if needed, confirm, materialize
//!
//! ```text
//! Start -> Probing -> PolicyMet ------------------> Materializing -> Done
//!                  \-> Remediating -> PolicyMet -/               \-> Failed
//! ```
//!
//! Any declined confirmation or error ends the run in `Failed`.

use crate::confirm::Confirmer;
use crate::report::Reporter;
use crate::runtime::probe::{CapabilityRecord, HostEnv, Prober};
use crate::runtime::remediate::{
    select_strategy, Policy, RemediationEngine, RemediationError, RemediationStrategy,
};
use crate::runtime::runner::CommandRunner;
use crate::templates::manifest::ManifestEntry;
use crate::templates::materialize::{
    check_replaceable, existing_items, materialize, resolve_root, MaterializeError,
    MaterializeReport,
};
use crate::templates::render::RenderContext;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Probing,
    PolicyMet,
    Remediating,
    Materializing,
    Done,
    Failed,
}

#[derive(Debug, Error)]
pub enum RunError {
    /// The user said no; not a system fault
    #[error("{action} was declined\ntip: {hint}")]
    UserDeclined { action: String, hint: String },

    #[error(transparent)]
    Remediation(#[from] RemediationError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error("terminal I/O failed: {0}")]
    Terminal(#[from] io::Error),
}

/// Everything one run needs, decided up front
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub policy: Policy,
    pub root: PathBuf,
    pub entries: Vec<ManifestEntry>,
    pub context: RenderContext,
    pub skip_runtime_check: bool,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    /// `None` when the runtime check was skipped
    pub capability: Option<CapabilityRecord>,
    pub remediated_with: Option<RemediationStrategy>,
    pub report: MaterializeReport,
}

pub struct Orchestrator<'a, H: HostEnv, R: CommandRunner, C: Confirmer, P: Reporter> {
    prober: Prober<H>,
    runner: &'a R,
    confirmer: &'a C,
    reporter: &'a P,
    trace: Vec<Stage>,
}

impl<'a, H: HostEnv, R: CommandRunner, C: Confirmer, P: Reporter> Orchestrator<'a, H, R, C, P> {
    pub fn new(prober: Prober<H>, runner: &'a R, confirmer: &'a C, reporter: &'a P) -> Self {
        Self {
            prober,
            runner,
            confirmer,
            reporter,
            trace: Vec::new(),
        }
    }

    /// Stages entered so far, in order
    pub fn trace(&self) -> &[Stage] {
        &self.trace
    }

    fn enter(&mut self, stage: Stage) {
        self.trace.push(stage);
    }

    pub async fn run(&mut self, plan: &RunPlan) -> Result<RunSummary, RunError> {
        self.enter(Stage::Start);
        let result = self.drive(plan).await;
        match &result {
            Ok(_) => self.enter(Stage::Done),
            Err(e) => {
                self.enter(Stage::Failed);
                let _ = self.reporter.error(&e.to_string());
            }
        }
        result
    }

    async fn drive(&mut self, plan: &RunPlan) -> Result<RunSummary, RunError> {
        let (capability, remediated_with) = if plan.skip_runtime_check {
            self.reporter.info("Skipping runtime check")?;
            self.enter(Stage::PolicyMet);
            (None, None)
        } else {
            let (capability, strategy) = self.ensure_runtime(plan.policy).await?;
            (Some(capability), strategy)
        };

        let root = resolve_root(&plan.root)?;
        let overwrite_confirmed = self.confirm_replace(&root)?;

        self.enter(Stage::Materializing);
        self.reporter
            .step(&format!("Writing project to {}", root.display()))?;
        let report = materialize(&root, &plan.entries, overwrite_confirmed, &plan.context).await?;
        self.reporter.success(&format!(
            "Created {} files and {} directories in {}",
            report.files,
            report.directories,
            report.root.display()
        ))?;

        Ok(RunSummary {
            capability,
            remediated_with,
            report,
        })
    }

    async fn ensure_runtime(
        &mut self,
        policy: Policy,
    ) -> Result<(CapabilityRecord, Option<RemediationStrategy>), RunError> {
        self.enter(Stage::Probing);
        let runtime = self.prober.runtime().clone();
        self.reporter
            .step(&format!("Checking {}", runtime.display_name))?;

        let capability = self.prober.probe();
        self.reporter.info(&format!(
            "Detected {} with {} {}",
            capability.os_family,
            runtime.display_name,
            capability.runtime_summary()
        ))?;

        if policy.is_satisfied_by(&capability) {
            self.reporter.success(&format!(
                "{} {} satisfies the {}+ requirement",
                runtime.display_name,
                capability.runtime_summary(),
                policy.minimum_major_version
            ))?;
            self.enter(Stage::PolicyMet);
            return Ok((capability, None));
        }

        self.reporter.warning(&format!(
            "{} {}+ is required",
            runtime.display_name, policy.minimum_major_version
        ))?;

        let strategy = select_strategy(&capability);
        let prompt = format!(
            "Install {} {} using {}?",
            runtime.display_name, policy.minimum_major_version, strategy
        );
        if !self.confirmer.confirm(&prompt, true)? {
            return Err(RunError::UserDeclined {
                action: format!("Installing {}", runtime.display_name),
                hint: format!(
                    "manual action required: install {} {}+ yourself, then re-run",
                    runtime.display_name, policy.minimum_major_version
                ),
            });
        }

        self.enter(Stage::Remediating);
        let record = {
            let mut engine =
                RemediationEngine::new(&mut self.prober, self.runner, self.reporter, policy);
            engine.remediate(&strategy).await?
        };
        self.reporter.success(&format!(
            "{} {} installed",
            runtime.display_name,
            record.runtime_summary()
        ))?;
        self.enter(Stage::PolicyMet);

        Ok((record, Some(strategy)))
    }

    /// Ask before replacing a non-empty target; declining ends the run
    fn confirm_replace(&self, root: &Path) -> Result<bool, RunError> {
        let existing = existing_items(root).map_err(|source| MaterializeError::Io {
            action: "inspect",
            path: root.to_path_buf(),
            source,
        })?;

        match existing {
            Some(count) if count > 0 => {
                let cwd = std::env::current_dir().map_err(|source| MaterializeError::Io {
                    action: "read working directory of",
                    path: root.to_path_buf(),
                    source,
                })?;
                check_replaceable(root, &cwd)?;

                self.reporter.warning(&format!(
                    "{} already has {} existing items; it will be deleted and recreated",
                    root.display(),
                    count
                ))?;
                if self
                    .confirmer
                    .confirm(&format!("Replace {}?", root.display()), false)?
                {
                    Ok(true)
                } else {
                    Err(RunError::UserDeclined {
                        action: format!("Replacing {}", root.display()),
                        hint: "pass --directory to pick another location, or move the existing one aside"
                            .to_string(),
                    })
                }
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::tests::ScriptedConfirmer;
    use crate::report::tests::{Level, RecordingReporter};
    use crate::runtime::probe::tests::{node, FakeHost};
    use crate::runtime::probe::{OsFamily, PackageManager};
    use crate::runtime::remediate::tests::FakeRunner;
    use crate::templates::manifest::EntryContent;
    use crate::templates::materialize::tests::snapshot;
    use tempfile::tempdir;

    fn plan(root: PathBuf) -> RunPlan {
        RunPlan {
            policy: Policy::new(18),
            root,
            entries: vec![
                ManifestEntry::directory("server"),
                ManifestEntry::file(
                    "server/index.js",
                    EntryContent::Literal(b"require('./app');\n".to_vec()),
                ),
                ManifestEntry::file(
                    "README.md",
                    EntryContent::Template("# {{ project_name }}\n".to_string()),
                ),
            ],
            context: RenderContext::new().with("project_name", "desk"),
            skip_runtime_check: false,
        }
    }

    fn debian_host(versions: &[&str]) -> FakeHost {
        FakeHost::linux()
            .with_file("/etc/debian_version", "12")
            .with_executable("apt-get")
            .with_executable("sudo")
            .with_executable("node")
            .with_versions(versions)
    }

    #[tokio::test]
    async fn test_satisfied_runtime_never_remediates() {
        let tmp = tempdir().unwrap();
        let runner = FakeRunner::default();
        let confirmer = ScriptedConfirmer::new(&[]);
        let reporter = RecordingReporter::default();
        let prober = Prober::new(debian_host(&["v20.11.1"]), node());

        let mut orchestrator = Orchestrator::new(prober, &runner, &confirmer, &reporter);
        let summary = orchestrator.run(&plan(tmp.path().join("desk"))).await.unwrap();

        assert_eq!(
            orchestrator.trace(),
            &[
                Stage::Start,
                Stage::Probing,
                Stage::PolicyMet,
                Stage::Materializing,
                Stage::Done
            ]
        );
        assert!(runner.ran.borrow().is_empty());
        assert!(confirmer.prompts.borrow().is_empty());
        assert_eq!(summary.remediated_with, None);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("desk/README.md")).unwrap(),
            "# desk\n"
        );
    }

    #[tokio::test]
    async fn test_outdated_runtime_remediated_then_materialized() {
        let tmp = tempdir().unwrap();
        let runner = FakeRunner::default();
        let confirmer = ScriptedConfirmer::new(&[true]);
        let reporter = RecordingReporter::default();
        let prober = Prober::new(debian_host(&["v16.20.2", "v18.19.0"]), node());

        let mut orchestrator = Orchestrator::new(prober, &runner, &confirmer, &reporter);
        let summary = orchestrator.run(&plan(tmp.path().join("desk"))).await.unwrap();

        assert_eq!(
            orchestrator.trace(),
            &[
                Stage::Start,
                Stage::Probing,
                Stage::Remediating,
                Stage::PolicyMet,
                Stage::Materializing,
                Stage::Done
            ]
        );
        assert_eq!(
            summary.remediated_with,
            Some(RemediationStrategy::PackageRepositoryInstall {
                os_family: OsFamily::Debian,
                manager: PackageManager::Apt
            })
        );
        assert_eq!(summary.capability.unwrap().runtime_major_version, Some(18));
        assert!(runner.ran_text().iter().all(|c| !c.contains("nvm")));
        assert!(tmp.path().join("desk/server/index.js").is_file());
    }

    #[tokio::test]
    async fn test_remediation_that_does_not_take_fails_the_run() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("desk");
        let runner = FakeRunner::default();
        let confirmer = ScriptedConfirmer::new(&[true]);
        let reporter = RecordingReporter::default();
        let prober = Prober::new(debian_host(&["v16.20.2"]), node());

        let mut orchestrator = Orchestrator::new(prober, &runner, &confirmer, &reporter);
        let err = orchestrator.run(&plan(root.clone())).await.unwrap_err();

        assert!(matches!(
            err,
            RunError::Remediation(RemediationError::PolicyStillUnmet { .. })
        ));
        assert_eq!(orchestrator.trace().last(), Some(&Stage::Failed));
        assert!(!orchestrator.trace().contains(&Stage::Materializing));
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_declined_remediation_needs_manual_action() {
        let tmp = tempdir().unwrap();
        let runner = FakeRunner::default();
        let confirmer = ScriptedConfirmer::new(&[false]);
        let reporter = RecordingReporter::default();
        let prober = Prober::new(debian_host(&["v14.21.3"]), node());

        let mut orchestrator = Orchestrator::new(prober, &runner, &confirmer, &reporter);
        let err = orchestrator
            .run(&plan(tmp.path().join("desk")))
            .await
            .unwrap_err();

        match &err {
            RunError::UserDeclined { hint, .. } => assert!(hint.contains("manual action required")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!orchestrator.trace().contains(&Stage::Remediating));
        assert!(runner.ran.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_os_uses_version_manager_only() {
        let tmp = tempdir().unwrap();
        let runner = FakeRunner::default();
        let confirmer = ScriptedConfirmer::new(&[true]);
        let reporter = RecordingReporter::default();
        let host = FakeHost::linux()
            .with_file("/etc/os-release", "ID=void\n")
            .with_executable("node")
            .with_versions(&["garbage", "v18.0.0"]);
        let prober = Prober::new(host, node());

        let mut orchestrator = Orchestrator::new(prober, &runner, &confirmer, &reporter);
        let summary = orchestrator.run(&plan(tmp.path().join("desk"))).await.unwrap();

        assert_eq!(
            summary.remediated_with,
            Some(RemediationStrategy::VersionManagerInstall)
        );
        let ran = runner.ran_text();
        assert_eq!(ran.len(), 2);
        assert!(ran.iter().all(|c| !c.contains("apt-get") && !c.contains("brew")));
    }

    #[tokio::test]
    async fn test_working_directory_is_never_offered_for_replacement() {
        let runner = FakeRunner::default();
        let confirmer = ScriptedConfirmer::new(&[]);
        let reporter = RecordingReporter::default();
        let prober = Prober::new(debian_host(&["v20.0.0"]), node());

        let mut run_plan = plan(PathBuf::from("."));
        run_plan.skip_runtime_check = true;

        let mut orchestrator = Orchestrator::new(prober, &runner, &confirmer, &reporter);
        let err = orchestrator.run(&run_plan).await.unwrap_err();

        assert!(matches!(
            err,
            RunError::Materialize(MaterializeError::ContainsWorkingDir { .. })
        ));
        assert!(confirmer.prompts.borrow().is_empty());
        assert!(!orchestrator.trace().contains(&Stage::Materializing));
    }

    #[tokio::test]
    async fn test_declined_overwrite_leaves_existing_tree() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("project");
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/app.js"), "my work").unwrap();
        let before = snapshot(&root);

        let runner = FakeRunner::default();
        let confirmer = ScriptedConfirmer::new(&[false]);
        let reporter = RecordingReporter::default();
        let prober = Prober::new(debian_host(&["v20.0.0"]), node());

        let mut orchestrator = Orchestrator::new(prober, &runner, &confirmer, &reporter);
        let err = orchestrator.run(&plan(root.clone())).await.unwrap_err();

        assert!(matches!(err, RunError::UserDeclined { .. }));
        assert!(reporter.contains(Level::Error, "declined"));
        assert_eq!(orchestrator.trace().last(), Some(&Stage::Failed));
        assert!(!orchestrator.trace().contains(&Stage::Materializing));
        assert_eq!(snapshot(&root), before);
        assert!(confirmer.prompts.borrow()[0].starts_with("Replace"));
    }

    #[tokio::test]
    async fn test_confirmed_overwrite_replaces_tree() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("project");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("old.txt"), "old").unwrap();

        let runner = FakeRunner::default();
        let confirmer = ScriptedConfirmer::new(&[true]);
        let reporter = RecordingReporter::default();
        let prober = Prober::new(debian_host(&["v20.0.0"]), node());

        let mut orchestrator = Orchestrator::new(prober, &runner, &confirmer, &reporter);
        let summary = orchestrator.run(&plan(root.clone())).await.unwrap();

        assert!(summary.report.replaced_existing);
        assert!(!root.join("old.txt").exists());
        assert!(root.join("README.md").is_file());
    }

    #[tokio::test]
    async fn test_skip_runtime_check() {
        let tmp = tempdir().unwrap();
        let runner = FakeRunner::default();
        let confirmer = ScriptedConfirmer::new(&[]);
        let reporter = RecordingReporter::default();
        let prober = Prober::new(FakeHost::linux(), node());

        let mut run_plan = plan(tmp.path().join("desk"));
        run_plan.skip_runtime_check = true;

        let mut orchestrator = Orchestrator::new(prober, &runner, &confirmer, &reporter);
        let summary = orchestrator.run(&run_plan).await.unwrap();

        assert!(summary.capability.is_none());
        assert!(!orchestrator.trace().contains(&Stage::Probing));
    }
}
