mod config;
mod plan_cmds;
mod render;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use config::{FmfplanConfig, OutputFormat};

#[derive(Parser)]
#[command(name = "fmfplan", version, about = "Evaluate fmf/tmt style test plan trees")]
struct Cli {
    /// Context dimension as NAME=VALUE[,VALUE...] (repeatable; overrides FMFPLAN_CONTEXT)
    #[arg(short = 'c', long = "context", global = true, value_name = "NAME=VALUE")]
    context: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write an fmfplan config file (default context from --context)
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// List plans enabled in the context
    Ls {
        /// Plan document or fmf tree directory
        tree: PathBuf,
        /// Include disabled plans
        #[arg(long)]
        all: bool,
        /// Output format (overrides FMFPLAN_FORMAT)
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Show a plan resolved against the context
    Show {
        /// Plan document or fmf tree directory
        tree: PathBuf,
        /// Plan name (e.g. /distro/sanity)
        plan: String,
        /// Output format (overrides FMFPLAN_FORMAT)
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
        /// List prepare steps whose `when` guard did not hold
        #[arg(long)]
        show_skipped: bool,
    },
    /// Export every resolved plan as JSON
    Export {
        /// Plan document or fmf tree directory
        tree: PathBuf,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List the tests a plan selects from a test tree
    Discover {
        /// Plan document or fmf tree directory
        tree: PathBuf,
        /// Plan name
        plan: String,
        /// Test metadata document or fmf tree directory
        #[arg(long)]
        tests: PathBuf,
        /// Output format (overrides FMFPLAN_FORMAT)
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Load and validate a plan tree
    Check {
        /// Plan document or fmf tree directory
        tree: PathBuf,
    },
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Execute the `fmfplan init` command: write config file.
fn cmd_init(context_specs: &[String], force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let context = fmfplan_core::Context::from_specs(context_specs)?;
    let cfg = config::ConfigFile {
        context: context
            .iter()
            .map(|(name, values)| {
                let value = match values {
                    [single] => config::ContextValue::One(single.clone()),
                    many => config::ContextValue::Many(many.to_vec()),
                };
                (name.to_string(), value)
            })
            .collect(),
        output: config::OutputSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    if context.is_empty() {
        println!("  context: (empty)");
    } else {
        println!("  context: {context}");
    }
    println!("  output.format = text");

    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init { force } => cmd_init(&cli.context, force),
        Commands::Ls { tree, all, format } => {
            let resolved = FmfplanConfig::resolve(&cli.context, format)?;
            plan_cmds::cmd_ls(&tree, &resolved.context, all, resolved.format)
        }
        Commands::Show {
            tree,
            plan,
            format,
            show_skipped,
        } => {
            let resolved = FmfplanConfig::resolve(&cli.context, format)?;
            plan_cmds::cmd_show(&tree, &plan, &resolved.context, resolved.format, show_skipped)
        }
        Commands::Export { tree, output } => {
            let resolved = FmfplanConfig::resolve(&cli.context, None)?;
            plan_cmds::cmd_export(&tree, &resolved.context, output.as_deref())
        }
        Commands::Discover {
            tree,
            plan,
            tests,
            format,
        } => {
            let resolved = FmfplanConfig::resolve(&cli.context, format)?;
            plan_cmds::cmd_discover(&tree, &plan, &tests, &resolved.context, resolved.format)
        }
        Commands::Check { tree } => plan_cmds::cmd_check(&tree),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "fmfplan", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
