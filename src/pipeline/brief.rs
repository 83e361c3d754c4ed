//! BriefStage: `pending` → `brief_prepared`.
//!
//! Synthesizes the chat history and the explicit request into a creative
//! brief, then extracts a short project name used to scope all later
//! retrieval queries. The brief call gets a bounded retry budget; a
//! malformed-but-nonempty response degrades to the raw text rather than
//! retrying forever.

use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::errors::{ModelError, StageError};
use crate::pipeline::{Orchestrator, parse_model_json};
use crate::task::{TaskState, TaskStatus};

#[derive(Deserialize)]
struct BriefResult {
    #[serde(alias = "creativeBrief")]
    creative_brief: String,
}

#[derive(Deserialize)]
struct NameResult {
    #[serde(default, alias = "projectName")]
    project_name: String,
}

pub(crate) async fn run(orch: &Orchestrator, state: &mut TaskState) -> Result<(), StageError> {
    state.set_progress("Analyzing chat history and user request...", 5)?;

    let prompt = brief_prompt(
        &state.task.initial_request.chat_history,
        &state.task.initial_request.request,
    );
    let brief = request_brief(orch, &prompt).await?;
    state.task.creative_brief = brief;

    state.set_progress("Extracting project name for scoped retrieval...", 7)?;
    let name_text = orch
        .model
        .call(&name_prompt(&state.task.creative_brief), None, true)
        .await?;
    state.task.project_name = match parse_model_json::<NameResult>(&name_text) {
        Some(result) => result.project_name.trim().to_string(),
        None => {
            warn!("project name response malformed, retrieval will be unscoped");
            String::new()
        }
    };
    if !state.task.project_name.is_empty() {
        info!(project_name = %state.task.project_name, "project name extracted");
    }

    state.update_status(TaskStatus::BriefPrepared, "Creative brief prepared.", 7)?;
    Ok(())
}

/// Bounded retry around the brief call. Transport failures and empty
/// responses are retried with linear backoff; a response that is text but
/// not the expected JSON shape immediately degrades to the raw text.
async fn request_brief(orch: &Orchestrator, prompt: &str) -> Result<String, StageError> {
    let attempts = orch.config.pipeline.max_brief_attempts.max(1);
    let backoff = orch.config.pipeline.retry_backoff_ms;
    let mut raw_fallback: Option<String> = None;
    let mut last_err: Option<ModelError> = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            tokio::time::sleep(Duration::from_millis(backoff * u64::from(attempt - 1))).await;
        }
        match orch.model.call(prompt, None, true).await {
            Ok(text) => {
                if let Some(result) = parse_model_json::<BriefResult>(&text)
                    && !result.creative_brief.trim().is_empty()
                {
                    return Ok(result.creative_brief);
                }
                if text.trim().is_empty() {
                    warn!(attempt, "brief response empty, retrying");
                    continue;
                }
                raw_fallback = Some(text);
                break;
            }
            Err(err) => {
                warn!(attempt, error = %err, "brief call failed, retrying");
                last_err = Some(err);
            }
        }
    }

    if let Some(raw) = raw_fallback {
        warn!("brief response was not the expected JSON shape, using raw text");
        return Ok(raw);
    }
    match last_err {
        Some(err) => Err(err.into()),
        None => Err(StageError::Validation(
            "model produced no usable brief text".to_string(),
        )),
    }
}

fn brief_prompt(chat_history: &str, request: &str) -> String {
    format!(
        "You are a planning assistant. Using the chat history and the final \
         request below, distill a single detailed creative brief that will \
         direct the writing of a long document. The brief should be clear, \
         structured, and synthesize everything already known.\n\n\
         [Chat history]\n{chat_history}\n\n\
         [Final request]\n{request}\n\n\
         Respond with a JSON object containing a single 'creative_brief' \
         field holding the full brief text."
    )
}

fn name_prompt(brief: &str) -> String {
    format!(
        "Extract a short project name or core topic from the creative brief \
         below (for example \"Riverside Stadium structural design\"). It is \
         used to scope knowledge-base retrieval queries.\n\
         Respond with a JSON object containing a single 'project_name' field.\n\n\
         Brief: {brief}"
    )
}
