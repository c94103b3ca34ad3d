//! Reelgen CLI - Text-to-video generation with local multi-GPU rendering and remote fallback.
//!
//! Prompts are rendered on local GPUs when the renderer is installed; otherwise
//! (or when it fails) they go to the remote video service.
//!
//! # Usage
//!
//! ```bash
//! # Generate a single video
//! reelgen generate "a paper boat drifting down a gutter" --output boat.mp4
//!
//! # Generate a batch, spread across all local GPUs
//! reelgen batch --file prompts.txt --format jsonl --save-dir ./videos
//!
//! # Show which providers are available
//! reelgen status
//!
//! # View configuration
//! reelgen config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Reelgen - Text-to-video generation with local multi-GPU rendering and remote fallback.
#[derive(Parser, Debug)]
#[command(name = "reelgen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a single video from a prompt
    Generate(cli::generate::GenerateArgs),

    /// Generate one video per prompt, distributed across local GPUs
    Batch(cli::batch::BatchArgs),

    /// Show provider availability and local GPU count
    Status,

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match reelgen_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `reelgen config path`."
            );
            reelgen_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Reelgen v{}", reelgen_core::VERSION);

    match cli.command {
        Commands::Generate(args) => cli::generate::execute(args, &config).await,
        Commands::Batch(args) => cli::batch::execute(args, &config).await,
        Commands::Status => cli::status::execute(&config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
