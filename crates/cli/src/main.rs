//! taskloom CLI — the main entry point.
//!
//! Commands:
//! - `run`   — Execute one task and print its result
//! - `tools` — List local and discovered tools

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "taskloom",
    about = "taskloom — an LLM agent task execution engine",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task to completion
    Run {
        /// The natural-language instruction
        instruction: String,

        /// Print the rollout trace after the result
        #[arg(short, long)]
        rollout: bool,
    },

    /// List the tools the agent would carry
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            instruction,
            rollout,
        } => commands::run::execute(instruction, rollout).await,
        Commands::Tools => commands::tools::execute().await,
    }
}
