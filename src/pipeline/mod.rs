//! The long-document generation state machine.
//!
//! The orchestrator dispatches purely on the persisted `status` field and
//! loops until a terminal state, so a freshly loaded task resumes exactly at
//! its last completed stage. Stages are sequential: each runs to completion
//! before the next status is evaluated, and the only suspension points are
//! the blocking collaborator calls.

pub mod assemble;
pub mod brief;
pub mod chapters;
pub mod outline;
pub mod refine;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ScribeConfig;
use crate::errors::{PipelineError, StageError};
use crate::export::BinaryDocWriter;
use crate::services::{
    ArtifactStore, KnowledgeRetriever, LanguageModelClient, StructuredDataSource,
};
use crate::task::record::Chapter;
use crate::task::{InitialRequest, TaskState, TaskStatus};

pub struct Orchestrator {
    pub(crate) config: ScribeConfig,
    pub(crate) model: Arc<dyn LanguageModelClient>,
    pub(crate) retriever: Arc<dyn KnowledgeRetriever>,
    pub(crate) data_source: Arc<dyn StructuredDataSource>,
    pub(crate) artifacts: Option<Arc<dyn ArtifactStore>>,
    pub(crate) doc_writer: Arc<dyn BinaryDocWriter>,
}

impl Orchestrator {
    pub fn new(
        config: ScribeConfig,
        model: Arc<dyn LanguageModelClient>,
        retriever: Arc<dyn KnowledgeRetriever>,
        data_source: Arc<dyn StructuredDataSource>,
        artifacts: Option<Arc<dyn ArtifactStore>>,
        doc_writer: Arc<dyn BinaryDocWriter>,
    ) -> Self {
        Self {
            config,
            model,
            retriever,
            data_source,
            artifacts,
            doc_writer,
        }
    }

    /// Create a new task from an authoring request and drive it until
    /// terminal. Returns the new task id.
    pub async fn start(&self, initial_request: InitialRequest) -> Result<String, PipelineError> {
        let mut state = TaskState::initialize(&self.config.tasks_dir, initial_request)?;
        let task_id = state.task.task_id.clone();
        info!(%task_id, "starting new generation task");
        self.run(&mut state).await?;
        Ok(task_id)
    }

    /// Load a persisted task and drive it from its current status until
    /// terminal. Returns the final status.
    pub async fn resume(&self, task_id: &str) -> Result<TaskStatus, PipelineError> {
        let mut state = TaskState::load(&self.config.tasks_dir, task_id)?.ok_or_else(|| {
            PipelineError::TaskNotFound {
                task_id: task_id.to_string(),
            }
        })?;
        info!(%task_id, status = %state.task.status, "resuming task");
        self.run(&mut state).await?;
        Ok(state.task.status)
    }

    /// The dispatch loop. Every stage error is caught here exactly once:
    /// persistence failures bubble to the caller (they cannot be logged into
    /// the record that failed to write), everything else fails the task via
    /// `log_error`.
    pub async fn run(&self, state: &mut TaskState) -> Result<(), PipelineError> {
        while !state.task.status.is_terminal() {
            let status = state.task.status;
            let result = match status {
                TaskStatus::Pending => brief::run(self, state).await,
                TaskStatus::BriefPrepared => outline::run(self, state).await,
                TaskStatus::OutlineGenerated => refine::run(self, state).await,
                TaskStatus::OutlineFinalized => chapters::run(self, state).await,
                TaskStatus::ChaptersGenerated => assemble::run(self, state).await,
                TaskStatus::Unknown => {
                    state.log_error("run_loop", "unknown state")?;
                    break;
                }
                TaskStatus::Completed | TaskStatus::Failed => break,
            };

            if let Err(err) = result {
                match err {
                    StageError::Persistence(e) => return Err(e.into()),
                    other => {
                        warn!(stage = stage_label(status), error = %other, "stage failed");
                        state.log_error(stage_label(status), &other.to_string())?;
                    }
                }
            }
        }

        if state.task.status == TaskStatus::Completed {
            info!(task_id = %state.task.task_id, "task completed");
        }
        Ok(())
    }

    /// Retrieval scoped by project name; hard retrieval failures degrade to
    /// an empty result, they never fail a stage.
    pub(crate) async fn scoped_search(&self, project_name: &str, term: &str) -> Vec<String> {
        let query = format!("{project_name} {term}").trim().to_string();
        match self
            .retriever
            .search(&query, self.config.search.top_k)
            .await
        {
            Ok(snippets) => snippets,
            Err(err) => {
                warn!(%query, error = %err, "knowledge retrieval failed, continuing without snippets");
                Vec::new()
            }
        }
    }
}

fn stage_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "brief",
        TaskStatus::BriefPrepared => "outline",
        TaskStatus::OutlineGenerated => "outline_refinement",
        TaskStatus::OutlineFinalized => "content_generation",
        TaskStatus::ChaptersGenerated => "assembly",
        _ => "run_loop",
    }
}

/// Root shape shared by the outline and refinement integration responses.
#[derive(Deserialize)]
pub(crate) struct ChapterListResult {
    #[serde(default)]
    pub(crate) chapters: Vec<Chapter>,
}

/// Lenient parse of a model JSON response: exact text first, then the widest
/// bracketed slice (models occasionally wrap JSON in prose or fences).
pub(crate) fn parse_model_json<T: DeserializeOwned>(text: &str) -> Option<T> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    let start = trimmed.find(['{', '['])?;
    let end = trimmed.rfind(['}', ']'])?;
    if start >= end {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}
