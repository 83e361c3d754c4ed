//! CLI command handlers.
//!
//! Collaborator clients are constructed here, at the binary edge, and handed
//! to the orchestrator; nothing below this layer touches the environment.

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::sync::Arc;

use scribe::config::ScribeConfig;
use scribe::export::DocxWriter;
use scribe::pipeline::Orchestrator;
use scribe::services::{
    ArtifactStore, HttpArtifactStore, HttpKnowledgeRetriever, HttpModelClient,
    HttpStructuredDataSource,
};
use scribe::task::{InitialRequest, TaskState, TaskStatus};

fn build_orchestrator(config: ScribeConfig) -> Result<Orchestrator> {
    config.ensure_directories()?;
    let model = Arc::new(HttpModelClient::new(&config.model)?);
    let retriever = Arc::new(HttpKnowledgeRetriever::new(&config.search));
    let data_source = Arc::new(HttpStructuredDataSource::new(&config.search.api_base));
    let artifacts: Option<Arc<dyn ArtifactStore>> = config
        .artifacts
        .as_ref()
        .map(|cfg| Arc::new(HttpArtifactStore::new(cfg)) as Arc<dyn ArtifactStore>);

    Ok(Orchestrator::new(
        config,
        model,
        retriever,
        data_source,
        artifacts,
        Arc::new(DocxWriter),
    ))
}

/// Create a new task from the request (plus optional chat-history file) and
/// run it to a terminal state.
pub async fn start(
    config: ScribeConfig,
    request: String,
    chat_history: Option<PathBuf>,
) -> Result<()> {
    let chat_history = match chat_history {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read chat history file: {}", path.display()))?,
        None => String::new(),
    };

    let tasks_dir = config.tasks_dir.clone();
    let orchestrator = build_orchestrator(config)?;
    let task_id = orchestrator
        .start(InitialRequest {
            chat_history,
            request,
        })
        .await?;

    report_outcome(&tasks_dir, &task_id)
}

/// Resume a persisted task from its last completed stage.
pub async fn resume(config: ScribeConfig, task_id: String) -> Result<()> {
    let tasks_dir = config.tasks_dir.clone();
    let orchestrator = build_orchestrator(config)?;
    orchestrator.resume(&task_id).await?;
    report_outcome(&tasks_dir, &task_id)
}

fn report_outcome(tasks_dir: &std::path::Path, task_id: &str) -> Result<()> {
    let state = TaskState::load(tasks_dir, task_id)?
        .with_context(|| format!("Task {task_id} disappeared after run"))?;
    let task = &state.task;

    match task.status {
        TaskStatus::Completed => {
            println!("Task {task_id} completed.");
            for (kind, url) in &task.artifact_urls {
                println!("  {kind}: {url}");
            }
            Ok(())
        }
        TaskStatus::Failed => {
            let detail = task
                .error_log
                .last()
                .map(|e| format!("{} ({})", e.message, e.stage))
                .unwrap_or_else(|| "no error details recorded".to_string());
            bail!("Task {task_id} failed: {detail}");
        }
        other => bail!("Task {task_id} stopped in non-terminal state {other}"),
    }
}

/// Print one task's status, progress, and most recent error.
pub fn status(config: ScribeConfig, task_id: String) -> Result<()> {
    let state = TaskState::load(&config.tasks_dir, &task_id)?
        .with_context(|| format!("Task {task_id} not found"))?;
    let task = &state.task;

    println!("Task {}", task.task_id);
    println!("  Status:   {}", task.status);
    println!("  Progress: {}%", task.progress_percentage);
    println!("  Message:  {}", task.current_status_message);
    println!("  Updated:  {}", task.last_updated_timestamp);
    for (kind, url) in &task.artifact_urls {
        println!("  Artifact ({kind}): {url}");
    }
    if let Some(entry) = task.error_log.last() {
        println!(
            "  Last error: [{}] {}: {}",
            entry.timestamp, entry.stage, entry.message
        );
    }
    Ok(())
}

/// List every persisted task with status and a request preview.
pub fn list(config: ScribeConfig) -> Result<()> {
    let tasks = TaskState::list(&config.tasks_dir)?;
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    for task in tasks {
        let mut preview: String = task.initial_request.request.chars().take(50).collect();
        if preview.len() < task.initial_request.request.len() {
            preview.push_str("...");
        }
        println!(
            "{} | {:>3}% | {} | {}",
            task.task_id, task.progress_percentage, task.status, preview
        );
    }
    Ok(())
}
