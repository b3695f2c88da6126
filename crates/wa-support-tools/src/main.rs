//! wa-support-tools - Bootstrap WhatsApp customer-service desk projects

mod bundle;

use clap::{Parser, Subcommand};
use scaffold_kit::runtime::RuntimeRequirement;
use scaffold_kit::templates::EmbeddedFiles;
use scaffold_kit::tui::CreateArgs;
use scaffold_kit::{ProductConfig, RunError};
use std::path::{Path, PathBuf};

/// CLI version
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// WhatsApp support desk product configuration
#[derive(Clone)]
pub struct WaSupportConfig;

impl ProductConfig for WaSupportConfig {
    fn name(&self) -> &'static str {
        "wa-support"
    }

    fn display_name(&self) -> &'static str {
        "WhatsApp Support Desk"
    }

    fn template_name(&self) -> &'static str {
        "wa-support"
    }

    fn embedded_templates(&self) -> EmbeddedFiles {
        bundle::WA_SUPPORT
    }

    fn template_url_env(&self) -> &'static str {
        "WA_SUPPORT_TEMPLATE_URL"
    }

    fn default_project_dir(&self) -> &'static str {
        "whatsapp-support-desk"
    }

    fn runtime(&self) -> RuntimeRequirement {
        RuntimeRequirement {
            executable: "node",
            display_name: "Node.js",
            default_minimum_major: 18,
        }
    }

    fn docs_url(&self) -> &'static str {
        "https://wwebjs.dev/guide/"
    }

    fn upgrade_command(&self) -> &'static str {
        "cargo install wa-support-tools --force"
    }

    fn user_agent(&self) -> &'static str {
        concat!("wa-support-tools/", env!("CARGO_PKG_VERSION"))
    }

    fn next_steps(&self, dir: &Path) -> Vec<String> {
        let mut steps = Vec::new();
        let current = std::env::current_dir().ok();

        if current.as_deref() != Some(dir) {
            steps.push(format!("cd {}", dir.display()));
        }

        steps.push("cp .env.example .env".to_string());
        steps.push("./scripts/dev.sh  (or: docker compose up --build)".to_string());
        steps.push("Scan the pairing code at http://localhost:3000".to_string());

        steps
    }
}

#[derive(Parser, Debug)]
#[command(name = "wa-support-tools")]
#[command(about = "CLI for bootstrapping WhatsApp customer-service desk projects")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new support desk project
    Create(CliCreateArgs),
    /// Zip a template folder into a bundle for --template-url (for development use)
    Bundle(BundleArgs),
}

#[derive(Parser, Debug)]
pub struct CliCreateArgs {
    /// Project directory to create
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Local directory to use for templates instead of the built-in bundle (for development use)
    #[arg(long = "template-dir", conflicts_with = "template_url")]
    pub template_dir: Option<PathBuf>,

    /// Base URL serving wa-support.zip (also read from WA_SUPPORT_TEMPLATE_URL)
    #[arg(long = "template-url")]
    pub template_url: Option<String>,

    /// Answer yes to every prompt
    #[arg(short, long, conflicts_with = "non_interactive")]
    pub yes: bool,

    /// Take each prompt's default answer instead of asking
    #[arg(long = "non-interactive")]
    pub non_interactive: bool,

    /// Minimum Node.js major version
    #[arg(long = "min-node", value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub min_node: Option<u64>,

    /// Skip Node.js detection and installation
    #[arg(long = "skip-runtime-check")]
    pub skip_runtime_check: bool,
}

impl From<CliCreateArgs> for CreateArgs {
    fn from(args: CliCreateArgs) -> Self {
        CreateArgs {
            directory: args.directory,
            template_dir: args.template_dir,
            template_url: args.template_url,
            yes: args.yes,
            non_interactive: args.non_interactive,
            min_node: args.min_node,
            skip_runtime_check: args.skip_runtime_check,
        }
    }
}

#[derive(Parser, Debug)]
pub struct BundleArgs {
    /// Template folder containing template.yaml
    #[arg(long = "template-dir")]
    pub template_dir: PathBuf,

    /// Output zip (defaults to <template-dir>/../wa-support.zip)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

async fn create(config: &WaSupportConfig, args: CreateArgs) -> i32 {
    let result = scaffold_kit::run(config, args, CLI_VERSION).await;

    // Ensure cursor is visible on normal exit
    let _ = console::Term::stderr().show_cursor();

    match result {
        Ok(_) => 0,
        Err(e) => {
            // Run errors were already reported by the orchestrator
            let outro = match e.downcast_ref::<RunError>() {
                Some(RunError::UserDeclined { .. }) => "Setup cancelled.",
                Some(_) => "Setup failed.",
                None => {
                    let _ = cliclack::log::error(format!("{:#}", e));
                    "Setup failed."
                }
            };
            let _ = cliclack::outro_cancel(outro);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    // Ensure terminal cursor is restored on panic
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = console::Term::stderr().show_cursor();
        default_panic(info);
    }));

    // Handle Ctrl+C gracefully
    ctrlc::set_handler(move || {
        let _ = console::Term::stderr().show_cursor();
        std::process::exit(130);
    })
    .ok();

    let args = Args::parse();
    let config = WaSupportConfig;

    let code = match args.command {
        Some(Command::Create(create_args)) => create(&config, create_args.into()).await,
        Some(Command::Bundle(bundle_args)) => {
            match scaffold_kit::templates::build_bundle(
                &config,
                &bundle_args.template_dir,
                bundle_args.out,
            )
            .await
            {
                Ok(_) => 0,
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    1
                }
            }
        }
        // No subcommand provided, default to create behavior (interactive mode)
        None => create(&config, CreateArgs::default()).await,
    };

    std::process::exit(code);
}
