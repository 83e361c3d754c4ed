//! ChapterStage: `outline_finalized` → `chapters_generated`.
//!
//! Chapters are generated strictly in outline order: chapter *i+1*'s
//! context carries chapter *i*'s persisted summary. The task is checkpointed
//! after every chapter; `lastCompletedChapterIndex` lets a resumed run skip
//! chapters that already made it to disk.

use tracing::{info, warn};

use crate::errors::StageError;
use crate::pipeline::Orchestrator;
use crate::task::record::{Chapter, ChapterKind};
use crate::task::{TaskState, TaskStatus};

pub(crate) async fn run(orch: &Orchestrator, state: &mut TaskState) -> Result<(), StageError> {
    let total = state.task.outline.chapters.len();
    if total == 0 {
        warn!("outline is empty, no chapter content to generate");
        state.update_status(
            TaskStatus::ChaptersGenerated,
            "Outline empty, nothing to generate.",
            90,
        )?;
        return Ok(());
    }

    let project_name = state.task.project_name.clone();
    let start_index = state
        .task
        .last_completed_chapter_index
        .map(|i| i + 1)
        .unwrap_or(0);
    if start_index > 0 {
        info!(start_index, "resuming chapter generation mid-stage");
    }

    for i in start_index..total {
        let chapter = state.task.outline.chapters[i].clone();
        let progress = 30 + ((i * 60) / total) as u8;
        state.set_progress(
            &format!("Generating chapter {}/{}: '{}'", i + 1, total, chapter.title),
            progress,
        )?;

        let outline_json = serde_json::to_string(&state.task.outline.chapters)
            .unwrap_or_else(|_| "[]".to_string());
        // The previous chapter's summary is read back from the persisted
        // outline, which is exactly what a resumed run would see.
        let previous_summary = if i == 0 {
            None
        } else {
            state.task.outline.chapters[i - 1].summary.clone()
        };

        let content = match chapter.kind {
            ChapterKind::StructuredDataInjection => {
                generate_injected(
                    orch,
                    &project_name,
                    &chapter,
                    &outline_json,
                    previous_summary.as_deref(),
                )
                .await?
            }
            ChapterKind::Standard => {
                generate_standard(
                    orch,
                    &project_name,
                    &chapter,
                    &outline_json,
                    previous_summary.as_deref(),
                )
                .await?
            }
        };

        let summary = orch
            .model
            .call(&summary_prompt(&chapter.title, &content), None, false)
            .await?;

        let slot = &mut state.task.outline.chapters[i];
        slot.content = Some(content);
        slot.summary = Some(summary.trim().to_string());
        state.task.last_completed_chapter_index = Some(i);
        // Checkpoint granularity: chapter i+1 may not begin until chapter
        // i's summary is on disk.
        state.save()?;
    }

    state.update_status(TaskStatus::ChaptersGenerated, "All chapters generated.", 90)?;
    Ok(())
}

async fn generate_standard(
    orch: &Orchestrator,
    project_name: &str,
    chapter: &Chapter,
    outline_json: &str,
    previous_summary: Option<&str>,
) -> Result<String, StageError> {
    let snippets = orch.scoped_search(project_name, &chapter.title).await;
    let context = build_context(outline_json, previous_summary, &snippets);
    let prompt = format!(
        "Write the full content for the chapter '{}'. Focus on these key \
         points: {}. Return the chapter body as plain prose, no JSON.",
        chapter.title,
        chapter.key_points.join(", ")
    );
    Ok(orch.model.call(&prompt, Some(&context), false).await?)
}

/// The injection path never authors content from scratch: it fetches the
/// pre-structured blob and asks the model only to rewrite it into prose.
/// A missing blob degrades to the standard path.
async fn generate_injected(
    orch: &Orchestrator,
    project_name: &str,
    chapter: &Chapter,
    outline_json: &str,
    previous_summary: Option<&str>,
) -> Result<String, StageError> {
    let blob = match orch.data_source.fetch(project_name).await {
        Ok(Some(blob)) => blob,
        Ok(None) => {
            warn!(
                chapter = %chapter.title,
                "no structured data available, falling back to standard generation"
            );
            return generate_standard(orch, project_name, chapter, outline_json, previous_summary)
                .await;
        }
        Err(err) => {
            warn!(
                chapter = %chapter.title,
                error = %err,
                "structured data fetch failed, falling back to standard generation"
            );
            return generate_standard(orch, project_name, chapter, outline_json, previous_summary)
                .await;
        }
    };

    let context = build_context(outline_json, previous_summary, &[]);
    let prompt = format!(
        "Rewrite the following structured data into polished prose for the \
         chapter '{}'. Keep every figure and item intact; do not invent new \
         data. Return plain prose.\n\nStructured data:\n{}",
        chapter.title,
        serde_json::to_string_pretty(&blob).unwrap_or_else(|_| blob.to_string())
    );
    Ok(orch.model.call(&prompt, Some(&context), false).await?)
}

fn build_context(
    outline_json: &str,
    previous_summary: Option<&str>,
    snippets: &[String],
) -> String {
    let mut context = format!("Full document outline:\n{outline_json}\n");
    match previous_summary {
        Some(summary) => {
            context.push_str(&format!("\nSummary of the previous chapter: {summary}\n"));
        }
        None => context.push_str("\nThis is the opening chapter of the document.\n"),
    }
    if !snippets.is_empty() {
        context.push_str(&format!(
            "\nReference material for accuracy and depth:\n{}\n",
            snippets.join("\n\n---\n\n")
        ));
    }
    context
}

fn summary_prompt(title: &str, content: &str) -> String {
    format!(
        "Summarize the following chapter ('{title}') in one or two \
         sentences. The summary will be used as context for writing the \
         next chapter.\n\n{content}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_context_opening_chapter() {
        let context = build_context("[]", None, &[]);
        assert!(context.contains("opening chapter"));
        assert!(!context.contains("previous chapter"));
    }

    #[test]
    fn test_build_context_carries_previous_summary_and_snippets() {
        let snippets = vec!["fact one".to_string(), "fact two".to_string()];
        let context = build_context("[]", Some("ch1 recap"), &snippets);
        assert!(context.contains("Summary of the previous chapter: ch1 recap"));
        assert!(context.contains("fact one\n\n---\n\nfact two"));
    }
}
