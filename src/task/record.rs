//! The persisted data model for one generation task.
//!
//! A task is a single JSON document, camelCase on disk, mutated only through
//! [`crate::task::TaskState`]. It is an append-only audit record: tasks are
//! never deleted, and `errorLog` only grows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Pipeline position of a task. Advances monotonically on the success path;
/// `Failed` is terminal and reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    BriefPrepared,
    OutlineGenerated,
    OutlineFinalized,
    ChaptersGenerated,
    Completed,
    Failed,
    /// Catch-all for records written by a newer (or corrupted) scribe; the
    /// orchestrator treats it as fatal.
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::BriefPrepared => "brief_prepared",
            TaskStatus::OutlineGenerated => "outline_generated",
            TaskStatus::OutlineFinalized => "outline_finalized",
            TaskStatus::ChaptersGenerated => "chapters_generated",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// The request that created the task. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialRequest {
    #[serde(default)]
    pub chat_history: String,
    pub request: String,
}

/// How a chapter's content is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterKind {
    /// Authored by the model from outline + previous summary + retrieval.
    #[default]
    Standard,
    /// Rendered from a pre-structured data blob; the model only rewrites it
    /// into prose, it never authors the data.
    StructuredDataInjection,
}

/// One chapter of the outline. Ordering within `Outline::chapters` is the
/// reading order and the generation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// Stable id assigned at outline creation (`ch_01` style). Model
    /// responses that omit it get one assigned by position.
    #[serde(default, alias = "chapter_id")]
    pub chapter_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "key_points")]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub kind: ChapterKind,
    /// Absent until the chapter stage processes this chapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// 1-2 sentence digest of `content`, carried forward as context for the
    /// next chapter. Absent until generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Chapter {
    pub fn new(chapter_id: &str, title: &str, key_points: Vec<String>) -> Self {
        Self {
            chapter_id: chapter_id.to_string(),
            title: title.to_string(),
            key_points,
            kind: ChapterKind::Standard,
            content: None,
            summary: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineMetadata {
    #[serde(default)]
    pub refinement_cycles: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outline {
    #[serde(default)]
    pub metadata: OutlineMetadata,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

/// One `errorLog` entry. Appending an entry via `log_error` *is* the
/// transition to `failed`; `log_nonfatal` appends without transitioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    pub timestamp: String,
    pub stage: String,
    pub message: String,
}

/// The root persisted entity: one generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress_percentage: u8,
    pub current_status_message: String,
    pub initial_request: InitialRequest,
    #[serde(default)]
    pub creative_brief: String,
    /// Short project name used to scope every retrieval query.
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub outline: Outline,
    /// Highest chapter index whose content and summary are persisted;
    /// re-entering the chapter stage resumes after it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed_chapter_index: Option<usize>,
    #[serde(default)]
    pub final_document: String,
    #[serde(default)]
    pub artifact_urls: BTreeMap<String, String>,
    #[serde(default)]
    pub error_log: Vec<ErrorEntry>,
    #[serde(default)]
    pub last_updated_timestamp: String,
}

impl Task {
    pub fn new(task_id: String, initial_request: InitialRequest) -> Self {
        Self {
            task_id,
            status: TaskStatus::Pending,
            progress_percentage: 0,
            current_status_message: "Task created, awaiting pipeline start.".to_string(),
            initial_request,
            creative_brief: String::new(),
            project_name: String::new(),
            outline: Outline::default(),
            last_completed_chapter_index: None,
            final_document: String::new(),
            artifact_urls: BTreeMap::new(),
            error_log: Vec::new(),
            last_updated_timestamp: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::OutlineFinalized.is_terminal());
        assert!(!TaskStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_status_roundtrips_as_snake_case() {
        let json = serde_json::to_string(&TaskStatus::OutlineGenerated).unwrap();
        assert_eq!(json, "\"outline_generated\"");
        let back: TaskStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TaskStatus::OutlineGenerated);
    }

    #[test]
    fn test_unrecognized_status_maps_to_unknown() {
        let status: TaskStatus = serde_json::from_str("\"brief_generation\"").unwrap();
        assert_eq!(status, TaskStatus::Unknown);
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let task = Task::new(
            "t1".into(),
            InitialRequest {
                chat_history: String::new(),
                request: "a report".into(),
            },
        );
        let value = serde_json::to_value(&task).unwrap();
        assert!(value.get("taskId").is_some());
        assert!(value.get("progressPercentage").is_some());
        assert!(value.get("initialRequest").is_some());
        assert!(value.get("errorLog").is_some());
        // Optional index is omitted until the chapter stage sets it
        assert!(value.get("lastCompletedChapterIndex").is_none());
    }

    #[test]
    fn test_chapter_parses_model_style_keys() {
        // Model responses use snake_case key_points per the outline prompt
        let chapter: Chapter = serde_json::from_str(
            r#"{"chapterId": "ch_01", "title": "Overview", "key_points": ["a", "b"]}"#,
        )
        .unwrap();
        assert_eq!(chapter.chapter_id, "ch_01");
        assert_eq!(chapter.key_points.len(), 2);
        assert_eq!(chapter.kind, ChapterKind::Standard);

        let tagged: Chapter = serde_json::from_str(
            r#"{"title": "Bill of Quantities", "kind": "structured_data_injection"}"#,
        )
        .unwrap();
        assert_eq!(tagged.kind, ChapterKind::StructuredDataInjection);
        assert!(tagged.chapter_id.is_empty());
    }
}
