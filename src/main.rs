use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use scribe::config::ScribeConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "scribe")]
#[command(version, about = "Resumable long-document generator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project directory holding scribe.toml and the tasks directory.
    /// Defaults to the current directory.
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new generation task and run it to completion
    Start {
        /// The authoring request
        #[arg(short, long)]
        request: String,
        /// Optional file with prior conversation context
        #[arg(long)]
        chat_history: Option<PathBuf>,
    },
    /// Resume a persisted task from its last completed stage
    Resume { task_id: String },
    /// Show status, progress, and last error for a task
    Status { task_id: String },
    /// List all persisted tasks
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "scribe=debug" } else { "scribe=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let project_dir = match cli.project_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let config = ScribeConfig::load(&project_dir)?;

    match cli.command {
        Commands::Start {
            request,
            chat_history,
        } => cmd::start(config, request, chat_history).await,
        Commands::Resume { task_id } => cmd::resume(config, task_id).await,
        Commands::Status { task_id } => cmd::status(config, task_id),
        Commands::List => cmd::list(config),
    }
}
