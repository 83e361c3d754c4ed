//! AssemblyStage: `chapters_generated` → `completed`.
//!
//! Generates an introduction and conclusion conditioned on the full outline,
//! concatenates the document body, then exports artifacts. The textual
//! document is the primary deliverable: once `finalDocument` is persisted the
//! task reaches `completed` regardless of export or upload outcomes, which
//! are logged as non-fatal incidents.

use tracing::warn;

use crate::errors::{PersistenceError, StageError};
use crate::export;
use crate::pipeline::Orchestrator;
use crate::task::{TaskState, TaskStatus};

pub(crate) async fn run(orch: &Orchestrator, state: &mut TaskState) -> Result<(), StageError> {
    state.set_progress("All chapters generated, assembling final document...", 95)?;

    if state.task.outline.chapters.is_empty() {
        warn!("outline is empty, introduction and conclusion will be generic");
    }
    let outline_json = serde_json::to_string(&state.task.outline.chapters)
        .unwrap_or_else(|_| "[]".to_string());

    let intro = orch
        .model
        .call(
            "Based on the complete outline provided as context, write an \
             engaging introduction for this document. Return prose only.",
            Some(&outline_json),
            false,
        )
        .await?;
    let conclusion = orch
        .model
        .call(
            "Based on the complete outline provided as context, write a \
             closing conclusion section for this document. Return prose only.",
            Some(&outline_json),
            false,
        )
        .await?;

    let mut parts = vec![intro.trim().to_string()];
    for chapter in &state.task.outline.chapters {
        parts.push(format!("\n\n## {}\n\n", chapter.title));
        parts.push(chapter.content.clone().unwrap_or_default());
    }
    parts.push("\n\n## Conclusion\n\n".to_string());
    parts.push(conclusion.trim().to_string());

    state.task.final_document = parts.concat();
    state.save()?;

    export_artifacts(orch, state).await?;

    state.update_status(TaskStatus::Completed, "Document generated successfully.", 100)?;
    Ok(())
}

/// Best-effort export: local markdown and docx, each uploaded when an
/// artifact store is configured. Only persistence failures propagate.
async fn export_artifacts(
    orch: &Orchestrator,
    state: &mut TaskState,
) -> Result<(), PersistenceError> {
    let task_id = state.task.task_id.clone();
    let title = if state.task.project_name.is_empty() {
        "Generated Document".to_string()
    } else {
        state.task.project_name.clone()
    };

    let md_name = format!("task_{task_id}.md");
    match export::write_markdown(
        &orch.config.tasks_dir,
        &md_name,
        &title,
        &state.task.final_document,
    ) {
        Ok(path) => {
            if let Some(store) = &orch.artifacts {
                match store.upload(&path, &md_name).await {
                    Ok(Some(url)) => {
                        state.task.artifact_urls.insert("markdown".to_string(), url);
                    }
                    Ok(None) => warn!("markdown upload declined by artifact store"),
                    Err(err) => {
                        state.log_nonfatal("export", &format!("markdown upload failed: {err}"))?;
                    }
                }
            }
        }
        Err(err) => {
            state.log_nonfatal("export", &format!("markdown write failed: {err}"))?;
        }
    }

    let docx_name = format!("task_{task_id}.docx");
    let docx_path = orch.config.tasks_dir.join(&docx_name);
    match orch
        .doc_writer
        .write(&title, &state.task.final_document, &docx_path)
    {
        Ok(()) => {
            if let Some(store) = &orch.artifacts {
                match store.upload(&docx_path, &docx_name).await {
                    Ok(Some(url)) => {
                        state.task.artifact_urls.insert("docx".to_string(), url);
                    }
                    Ok(None) => warn!("docx upload declined by artifact store"),
                    Err(err) => {
                        state.log_nonfatal("export", &format!("docx upload failed: {err}"))?;
                    }
                }
            }
        }
        Err(err) => {
            state.log_nonfatal("export", &format!("docx render failed: {err}"))?;
        }
    }

    state.save()
}
