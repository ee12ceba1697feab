//! SGR Research CLI: the main entry point.
//!
//! Commands:
//! - `research`: Run a research task and stream its progress
//! - `onboard`: Write a default configuration file
//! - `log`: Summarize a persisted agent log

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "sgr-research",
    about = "SGR Research: schema-guided reasoning research agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.sgr-research/config.toml
    #[arg(short, long, global = true, env = "SGR_RESEARCH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a question and write a report
    Research {
        /// The research task
        task: String,

        /// Dispatch strategy: sgr, tool-calling or auto-tool-calling
        #[arg(short, long, default_value = "sgr")]
        agent: String,

        /// Override execution.max_iterations
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Never ask clarification questions
        #[arg(long)]
        no_clarify: bool,

        /// Print raw LLM tokens as they stream
        #[arg(long)]
        show_tokens: bool,
    },

    /// Initialize configuration
    Onboard {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Summarize a persisted agent log
    Log {
        /// Path to a `*-log.json` file
        path: PathBuf,

        /// Print the raw JSON document
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Research {
            task,
            agent,
            max_iterations,
            no_clarify,
            show_tokens,
        } => {
            let options = commands::research::ResearchOptions {
                agent,
                max_iterations,
                no_clarify,
                show_tokens,
            };
            commands::research::run(cli.config.as_deref(), task, options).await?
        }
        Commands::Onboard { force } => commands::onboard::run(cli.config.as_deref(), force).await?,
        Commands::Log { path, json } => commands::log::run(&path, json).await?,
    }

    Ok(())
}
