//! Charm-style CLI front end using cliclack

use crate::confirm::{self, AssumeDefault, AutoConfirm, Confirmer, LineConfirmer};
use crate::orchestrator::{Orchestrator, RunPlan, RunSummary};
use crate::product::ProductConfig;
use crate::report::Reporter;
use crate::runtime::{Policy, Prober, SystemHost, SystemRunner};
use crate::templates::fetcher::{LoadedTemplate, TemplateFetcher, TemplateSource};
use crate::templates::materialize::normalize_root;
use crate::templates::render::RenderContext;
use crate::templates::version;
use anyhow::Result;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

/// CLI arguments for the create command
#[derive(Debug, Clone, Default)]
pub struct CreateArgs {
    /// Project directory to create
    pub directory: Option<PathBuf>,

    /// Local directory to use for templates instead of the built-in bundle
    pub template_dir: Option<PathBuf>,

    /// Base URL serving `<template>.zip`
    pub template_url: Option<String>,

    /// Answer yes to every prompt
    pub yes: bool,

    /// Take each prompt's default answer
    pub non_interactive: bool,

    /// Override the minimum runtime major version
    pub min_node: Option<u64>,

    /// Skip runtime detection and installation
    pub skip_runtime_check: bool,
}

impl CreateArgs {
    fn prompts_allowed(&self) -> bool {
        !self.yes && !self.non_interactive
    }
}

/// Progress output through `cliclack::log`
#[derive(Debug, Clone, Copy, Default)]
pub struct ClackReporter;

impl Reporter for ClackReporter {
    fn info(&self, message: &str) -> io::Result<()> {
        cliclack::log::info(message)
    }

    fn success(&self, message: &str) -> io::Result<()> {
        cliclack::log::success(message)
    }

    fn warning(&self, message: &str) -> io::Result<()> {
        cliclack::log::warning(message)
    }

    fn error(&self, message: &str) -> io::Result<()> {
        cliclack::log::error(message)
    }

    fn step(&self, message: &str) -> io::Result<()> {
        cliclack::log::step(message)
    }
}

/// Inline yes/no prompt; Esc or Ctrl+C counts as "no"
#[derive(Debug, Clone, Copy, Default)]
pub struct ClackConfirmer;

impl Confirmer for ClackConfirmer {
    fn confirm(&self, prompt: &str, default_choice: bool) -> io::Result<bool> {
        match cliclack::confirm(prompt)
            .initial_value(default_choice)
            .interact()
        {
            Ok(answer) => Ok(answer),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// The confirmer picked from the flags and whether stdin is a terminal
pub enum TerminalConfirmer {
    Auto(AutoConfirm),
    Defaults(AssumeDefault),
    Clack(ClackConfirmer),
    Line(LineConfirmer<io::StdinLock<'static>, io::Stderr>),
}

impl TerminalConfirmer {
    pub fn for_args(args: &CreateArgs) -> Self {
        if args.yes {
            TerminalConfirmer::Auto(AutoConfirm)
        } else if args.non_interactive {
            TerminalConfirmer::Defaults(AssumeDefault)
        } else if io::stdin().is_terminal() {
            TerminalConfirmer::Clack(ClackConfirmer)
        } else {
            TerminalConfirmer::Line(confirm::terminal())
        }
    }
}

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, prompt: &str, default_choice: bool) -> io::Result<bool> {
        match self {
            TerminalConfirmer::Auto(c) => c.confirm(prompt, default_choice),
            TerminalConfirmer::Defaults(c) => c.confirm(prompt, default_choice),
            TerminalConfirmer::Clack(c) => c.confirm(prompt, default_choice),
            TerminalConfirmer::Line(c) => c.confirm(prompt, default_choice),
        }
    }
}

/// Run the create flow with interactive prompts
pub async fn run<C: ProductConfig>(
    config: &C,
    args: CreateArgs,
    cli_version: &str,
) -> Result<RunSummary> {
    cliclack::intro(config.display_name())?;

    // Step 1: Load the template bundle
    let loaded = load_template(config, &args).await?;

    if let Some(warning) =
        version::check_compatibility(cli_version, &loaded.manifest.version, config.upgrade_command())
    {
        cliclack::log::warning(format!(
            "Version warning: {}",
            warning.lines().nth(1).unwrap_or(&warning)
        ))?;
    }

    // Step 2: Resolve the target directory
    let project_dir = select_directory(config, &args)?;

    // Step 3: Probe, remediate, confirm and write the tree
    let runtime = config.runtime();
    let policy = Policy::new(args.min_node.unwrap_or(runtime.default_minimum_major));
    let context = render_context(config, &project_dir, policy);

    let plan = RunPlan {
        policy,
        root: project_dir,
        entries: loaded.entries,
        context,
        skip_runtime_check: args.skip_runtime_check,
    };

    let confirmer = TerminalConfirmer::for_args(&args);
    let runner = SystemRunner;
    let reporter = ClackReporter;
    let prober = Prober::new(SystemHost, runtime);

    let mut orchestrator = Orchestrator::new(prober, &runner, &confirmer, &reporter);
    let summary = orchestrator.run(&plan).await?;

    // Step 4: Show next steps
    print_next_steps(config, &summary.report.root)?;

    Ok(summary)
}

async fn load_template<C: ProductConfig>(config: &C, args: &CreateArgs) -> Result<LoadedTemplate> {
    let source =
        TemplateSource::from_config(config, args.template_dir.clone(), args.template_url.clone())?;
    cliclack::log::info(format!("Using {}", source.describe()))?;

    let mut fetcher = TemplateFetcher::new(source, config.template_name(), config.user_agent());

    let spinner = cliclack::spinner();
    spinner.start("Loading template...");

    match fetcher.load().await {
        Ok(loaded) => {
            spinner.stop(format!(
                "Template: {} - {}",
                loaded.manifest.name, loaded.manifest.description
            ));
            Ok(loaded)
        }
        Err(e) => {
            spinner.stop("Failed to load template");
            Err(e)
        }
    }
}

fn select_directory<C: ProductConfig>(config: &C, args: &CreateArgs) -> Result<PathBuf> {
    let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let default_dir = format!("./{}", config.default_project_dir());

    let chosen = match &args.directory {
        Some(dir) => dir.clone(),
        None if args.prompts_allowed() && io::stdin().is_terminal() => {
            let input: String = cliclack::input("Project directory")
                .placeholder(&default_dir)
                .default_input(&default_dir)
                .interact()?;
            PathBuf::from(input.trim())
        }
        None => PathBuf::from(&default_dir),
    };

    let path = normalize_root(&chosen, &current_dir);
    cliclack::log::info(format!("Using directory: {}", path.display()))?;

    Ok(path)
}

/// Values for `{{ key }}` placeholders in rendered entries
fn render_context<C: ProductConfig>(config: &C, project_dir: &Path, policy: Policy) -> RenderContext {
    let project_name = project_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.default_project_dir().to_string());

    RenderContext::new()
        .with("project_name", project_name)
        .with("product_name", config.display_name())
        .with("node_major", policy.minimum_major_version.to_string())
}

fn print_next_steps<C: ProductConfig>(config: &C, project_dir: &Path) -> Result<()> {
    let steps = config.next_steps(project_dir);

    println!();
    println!("  Next steps");
    println!();

    for (i, step) in steps.iter().enumerate() {
        println!("  {}.  {}", i + 1, step);
    }

    println!();
    println!("  Docs: {}", config.docs_url());

    cliclack::outro("Happy supporting!")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmer_follows_flags() {
        let yes = CreateArgs {
            yes: true,
            ..Default::default()
        };
        assert!(matches!(
            TerminalConfirmer::for_args(&yes),
            TerminalConfirmer::Auto(_)
        ));
        assert!(TerminalConfirmer::for_args(&yes)
            .confirm("Replace?", false)
            .unwrap());

        let unattended = CreateArgs {
            non_interactive: true,
            ..Default::default()
        };
        let confirmer = TerminalConfirmer::for_args(&unattended);
        assert!(matches!(confirmer, TerminalConfirmer::Defaults(_)));
        assert!(confirmer.confirm("Install Node.js?", true).unwrap());
        assert!(!confirmer.confirm("Replace?", false).unwrap());
    }

    #[test]
    fn test_prompts_only_without_flags() {
        assert!(CreateArgs::default().prompts_allowed());
        assert!(!CreateArgs {
            yes: true,
            ..Default::default()
        }
        .prompts_allowed());
        assert!(!CreateArgs {
            non_interactive: true,
            ..Default::default()
        }
        .prompts_allowed());
    }
}
