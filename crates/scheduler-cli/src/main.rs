mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, run::RunExit, runs::RunsSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "scheduler",
    about = "Periodic start/stop scheduler for database and compute instances",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .scheduler/)
    #[arg(long, global = true, env = "SCHEDULER_ROOT")]
    root: Option<PathBuf>,

    /// Config file (default: <root>/.scheduler/config.yaml)
    #[arg(long, global = true, env = "SCHEDULER_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold .scheduler/config.yaml in the current project
    Init,

    /// Execute one workflow run now with the configured input
    Run,

    /// Fire runs on the configured schedule until interrupted
    Daemon,

    /// Inspect recorded runs
    Runs {
        #[command(subcommand)]
        subcommand: RunsSubcommand,
    },

    /// Validate the configuration or preview the schedule
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Daemon => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Run => cmd::run::run(&root, config, cli.json),
        Commands::Daemon => cmd::daemon::run(&root, config),
        Commands::Runs { subcommand } => cmd::runs::run(&root, config, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, config, subcommand, cli.json),
    };

    if let Err(e) = result {
        if let Some(exit) = e.downcast_ref::<RunExit>() {
            eprintln!("error: {exit}");
            std::process::exit(exit.exit_code());
        }
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
