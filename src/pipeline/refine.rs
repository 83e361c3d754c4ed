//! RefinementStage: `outline_generated` → `outline_finalized`.
//!
//! A bounded self-critique loop: ask the model for chapters that would gain
//! from external detail, retrieve knowledge for every suggested keyword
//! (scoped by project name), and have the model fold the material back into
//! a complete updated outline. Empty gap lists end the loop early; that is
//! the expected steady state, not an error. The loop body never runs more
//! than `max_refinement_cycles` times even if gaps keep being reported.

use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::StageError;
use crate::pipeline::{ChapterListResult, Orchestrator, outline::assign_ids, parse_model_json};
use crate::task::{TaskState, TaskStatus};

#[derive(Deserialize)]
struct CritiqueResult {
    #[serde(default, alias = "gapsIdentified")]
    gaps_identified: Vec<Gap>,
}

#[derive(Deserialize)]
struct Gap {
    #[serde(default, alias = "chapterId")]
    #[allow(dead_code)]
    chapter_id: String,
    #[serde(default)]
    title: String,
    #[serde(default, alias = "queryKeywords")]
    query_keywords: Vec<String>,
}

pub(crate) async fn run(orch: &Orchestrator, state: &mut TaskState) -> Result<(), StageError> {
    state.set_progress("Reviewing and refining the outline...", 15)?;
    let project_name = state.task.project_name.clone();
    let max_cycles = orch.config.pipeline.max_refinement_cycles;

    for cycle in 0..max_cycles {
        let base_progress = 15u8.saturating_add((cycle as u8).saturating_mul(5));
        state.set_progress(
            &format!("Refinement cycle {}: self-critique...", cycle + 1),
            base_progress,
        )?;

        let outline_json = serde_json::to_string(&state.task.outline.chapters)
            .unwrap_or_else(|_| "[]".to_string());

        let critique_text = orch
            .model
            .call(&critique_prompt(&outline_json), None, true)
            .await?;
        let gaps = parse_model_json::<CritiqueResult>(&critique_text)
            .map(|c| c.gaps_identified)
            .unwrap_or_default();
        if gaps.is_empty() {
            info!(cycle = cycle + 1, "critique found no gaps, outline accepted");
            break;
        }

        state.set_progress(
            &format!(
                "Refinement cycle {}: retrieving knowledge for {} gap(s)...",
                cycle + 1,
                gaps.len()
            ),
            base_progress.saturating_add(1),
        )?;

        let mut snippets = Vec::new();
        let mut gap_titles = Vec::new();
        for gap in &gaps {
            if !gap.title.is_empty() {
                gap_titles.push(gap.title.clone());
            }
            for keyword in &gap.query_keywords {
                snippets.extend(orch.scoped_search(&project_name, keyword).await);
            }
        }

        if snippets.is_empty() {
            info!(
                cycle = cycle + 1,
                "no knowledge retrieved, skipping integration this cycle"
            );
            continue;
        }

        let knowledge = snippets.join("\n\n---\n\n");
        let integrate_text = orch
            .model
            .call(
                &integrate_prompt(&knowledge, &gap_titles, &outline_json),
                None,
                true,
            )
            .await?;

        match parse_model_json::<ChapterListResult>(&integrate_text) {
            Some(result) if !result.chapters.is_empty() => {
                let mut chapters = result.chapters;
                assign_ids(&mut chapters);
                state.task.outline.chapters = chapters;
            }
            _ => warn!(
                cycle = cycle + 1,
                "integration response malformed, keeping prior outline"
            ),
        }
        state.task.outline.metadata.refinement_cycles = cycle + 1;
        state.save()?;
    }

    state.update_status(
        TaskStatus::OutlineFinalized,
        "Outline finalized, ready for chapter generation.",
        30,
    )?;
    Ok(())
}

fn critique_prompt(outline_json: &str) -> String {
    format!(
        "You are an exacting senior editor reviewing a document outline. \
         Even if it looks logically complete, consider which chapters would \
         gain depth and credibility from specific external data, cases, or \
         details. Respond with a JSON object whose root has a \
         'gaps_identified' array; each element must have:\n\
         1. 'chapterId' (string, matching the outline)\n\
         2. 'title' (string, matching the outline)\n\
         3. 'query_keywords' (array of retrieval keywords)\n\
         Return an empty 'gaps_identified' array only if the outline truly \
         needs nothing.\n\n\
         Outline: {outline_json}"
    )
}

fn integrate_prompt(knowledge: &str, gap_titles: &[String], outline_json: &str) -> String {
    format!(
        "Using the background material below, expand and improve this \
         outline, especially the chapters: {}. Return the complete updated \
         outline as a JSON object with the same structure as the original \
         (a root 'chapters' array).\n\n\
         Background material:\n{knowledge}\n\n\
         Original outline: {outline_json}",
        gap_titles.join(", ")
    )
}
