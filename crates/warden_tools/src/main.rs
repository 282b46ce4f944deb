//! Warden - Development Tools

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_core::config::SimConfig;
use warden_tools::{inspect, replay, validate};

#[derive(Parser)]
#[command(name = "warden-tools")]
#[command(about = "Development tools for the Warden authority server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a content file
    Validate {
        /// Path to content RON
        #[arg(default_value = "assets/content.ron")]
        path: PathBuf,
    },
    /// Summarize a snapshot file
    Inspect {
        /// Path to an encoded snapshot
        path: PathBuf,
        /// Also check the snapshot against this content file
        #[arg(long)]
        content: Option<PathBuf>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Play a replay file and check it ends on the recorded hash
    Replay {
        /// Path to an encoded replay
        path: PathBuf,
        /// Content the replay was recorded with
        #[arg(long, default_value = "assets/content.ron")]
        content: PathBuf,
        /// Simulation config the replay was recorded with
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn run(command: Commands) -> warden_tools::Result<()> {
    match command {
        Commands::Validate { path } => {
            tracing::info!("Validating content file: {}", path.display());
            let content = validate::validate_content_file(&path)?;
            tracing::info!("Validation passed: {}", content.summary());
        }
        Commands::Inspect {
            path,
            content,
            json,
        } => {
            let content = content
                .map(|p| validate::validate_content_file(&p))
                .transpose()?;
            let summary = inspect::inspect_snapshot_file(&path, content.as_ref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{summary}");
            }
        }
        Commands::Replay {
            path,
            content,
            config,
        } => {
            let content = Arc::new(validate::validate_content_file(&content)?);
            let config = match config {
                Some(p) => validate::load_sim_config(&p)?,
                None => SimConfig::default(),
            };
            let summary = replay::verify_replay_file(&path, content, config)?;
            tracing::info!(
                start = summary.start_tick,
                end = summary.final_tick,
                commands = summary.commands,
                "Replay verified"
            );
        }
    }
    Ok(())
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
