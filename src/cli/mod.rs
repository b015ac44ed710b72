//! Command-line interface.

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "access-check")]
#[command(about = "Assess home accessibility from interior and exterior photos")]
#[command(version)]
pub struct Cli {
    /// Config file (default: discover access-checker.{toml,yaml,json})
    #[arg(short, long, global = true, env = "ACCESS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one or more photos of a home
    Analyze {
        /// Image files to analyze
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Per-image strategy: vision or labels
        #[arg(short, long)]
        strategy: Option<String>,
        /// Record provider failures instead of substituting placeholders
        #[arg(long)]
        strict: bool,
        /// Skip the whole-set synthesis call
        #[arg(long)]
        no_whole_set: bool,
        /// Maximum concurrent provider calls
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which providers are configured and available
    Providers,

    /// Print the effective configuration
    Config,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Analyze {
            files,
            strategy,
            strict,
            no_whole_set,
            concurrency,
            json,
        } => {
            let options = commands::AnalyzeOptions {
                strategy,
                strict,
                no_whole_set,
                concurrency,
                json,
            };
            commands::cmd_analyze(config, &files, options).await
        }
        Commands::Providers => commands::cmd_providers(&config),
        Commands::Config => commands::cmd_config(&config),
    }
}
