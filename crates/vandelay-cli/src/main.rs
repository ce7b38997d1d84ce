mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "vandelay",
    about = "Compose the art ingestion workload into a deterministic resource plan",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: nearest vandelay.yaml walking up from cwd)
    #[arg(long, global = true, env = "VANDELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter vandelay.yaml
    Init {
        /// Workload mode: scheduled_serverless or persistent_accelerated
        #[arg(long, default_value = "scheduled_serverless")]
        mode: String,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Compose the stack and show the resource plan
    Plan {
        /// Write the rendered plan to this file
        #[arg(long)]
        out: Option<PathBuf>,

        /// Write the plan to vandelay.plan.json next to the config
        #[arg(long, conflicts_with = "out")]
        save: bool,

        /// Render format: json or yaml (takes precedence over --json)
        #[arg(long)]
        format: Option<String>,
    },

    /// Print the ad-hoc invocation command for each workload
    Command,

    /// Check the config and run a dry composition
    Validate,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let explicit = cli.config.as_deref();

    let result = match cli.command {
        Commands::Init { mode, force } => {
            cmd::init::run(&root::init_target(explicit), &mode, force, cli.json)
        }
        Commands::Plan { out, save, format } => cmd::plan::run(
            &root::resolve_config(explicit),
            out.as_deref(),
            save,
            format.as_deref(),
            cli.json,
        ),
        Commands::Command => cmd::command::run(&root::resolve_config(explicit), cli.json),
        Commands::Validate => cmd::validate::run(&root::resolve_config(explicit), cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
