//! File-backed task persistence.
//!
//! One JSON document per task at `<tasks_dir>/task_<taskId>.json`, rewritten
//! in full on every save. The file is the sole source of truth: nothing held
//! only in memory survives a crash, so every stage checkpoint goes through
//! [`TaskState::save`].

use chrono::{SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::PersistenceError;
use crate::task::record::{ErrorEntry, InitialRequest, Task, TaskStatus};

pub struct TaskState {
    pub task: Task,
    path: PathBuf,
}

fn record_path(tasks_dir: &Path, task_id: &str) -> PathBuf {
    tasks_dir.join(format!("task_{task_id}.json"))
}

impl TaskState {
    /// Create a fresh `pending` task and persist it immediately.
    pub fn initialize(
        tasks_dir: &Path,
        initial_request: InitialRequest,
    ) -> Result<Self, PersistenceError> {
        std::fs::create_dir_all(tasks_dir).map_err(|source| PersistenceError::CreateDir {
            path: tasks_dir.to_path_buf(),
            source,
        })?;

        let task_id = Uuid::new_v4().to_string();
        let path = record_path(tasks_dir, &task_id);
        let mut state = Self {
            task: Task::new(task_id, initial_request),
            path,
        };
        state.save()?;
        Ok(state)
    }

    /// Atomic whole-record read. `Ok(None)` when no record exists for the id.
    pub fn load(tasks_dir: &Path, task_id: &str) -> Result<Option<Self>, PersistenceError> {
        let path = record_path(tasks_dir, task_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| PersistenceError::ReadFailed {
            path: path.clone(),
            source,
        })?;
        let task: Task = serde_json::from_str(&raw).map_err(|source| {
            PersistenceError::Malformed {
                path: path.clone(),
                source,
            }
        })?;
        Ok(Some(Self { task, path }))
    }

    /// Overwrite the persisted record in full. Safe to call repeatedly.
    pub fn save(&mut self) -> Result<(), PersistenceError> {
        self.task.last_updated_timestamp =
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let body =
            serde_json::to_string_pretty(&self.task).map_err(PersistenceError::Serialize)?;
        std::fs::write(&self.path, body).map_err(|source| PersistenceError::WriteFailed {
            path: self.path.clone(),
            source,
        })?;
        debug!(task_id = %self.task.task_id, status = %self.task.status, "task record saved");
        Ok(())
    }

    /// Transition to a new status, updating message and progress, and save.
    pub fn update_status(
        &mut self,
        status: TaskStatus,
        message: &str,
        progress: u8,
    ) -> Result<(), PersistenceError> {
        self.task.status = status;
        self.set_progress(message, progress)
    }

    /// Advisory mid-stage progress update; no status transition. Progress is
    /// clamped monotonic non-decreasing on the success path.
    pub fn set_progress(&mut self, message: &str, progress: u8) -> Result<(), PersistenceError> {
        self.task.current_status_message = message.to_string();
        self.task.progress_percentage = self.task.progress_percentage.max(progress.min(100));
        self.save()
    }

    /// Append to the error log and transition to `failed`. Logging an error
    /// *is* the failure transition.
    pub fn log_error(&mut self, stage: &str, message: &str) -> Result<(), PersistenceError> {
        warn!(task_id = %self.task.task_id, stage, message, "task failed");
        self.push_entry(stage, message);
        self.task.status = TaskStatus::Failed;
        self.task.current_status_message = format!("Error during the {stage} stage.");
        self.save()
    }

    /// Append to the error log without changing status. Used for best-effort
    /// export failures that must not fail an otherwise completed task.
    pub fn log_nonfatal(&mut self, stage: &str, message: &str) -> Result<(), PersistenceError> {
        warn!(task_id = %self.task.task_id, stage, message, "non-fatal incident");
        self.push_entry(stage, message);
        self.save()
    }

    fn push_entry(&mut self, stage: &str, message: &str) {
        self.task.error_log.push(ErrorEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            stage: stage.to_string(),
            message: message.to_string(),
        });
    }

    /// Enumerate every persisted task record under `tasks_dir`, skipping
    /// files that are not readable task records.
    pub fn list(tasks_dir: &Path) -> Result<Vec<Task>, PersistenceError> {
        if !tasks_dir.exists() {
            return Ok(Vec::new());
        }
        let entries =
            std::fs::read_dir(tasks_dir).map_err(|source| PersistenceError::ReadFailed {
                path: tasks_dir.to_path_buf(),
                source,
            })?;

        let mut tasks = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !(name.starts_with("task_") && name.ends_with(".json")) {
                continue;
            }
            match std::fs::read_to_string(entry.path())
                .ok()
                .and_then(|raw| serde_json::from_str::<Task>(&raw).ok())
            {
                Some(task) => tasks.push(task),
                None => warn!(file = %name, "skipping unreadable task record"),
            }
        }
        tasks.sort_by(|a, b| a.last_updated_timestamp.cmp(&b.last_updated_timestamp));
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request() -> InitialRequest {
        InitialRequest {
            chat_history: "earlier discussion".into(),
            request: "produce a 3-chapter report".into(),
        }
    }

    #[test]
    fn test_initialize_persists_pending_record() {
        let dir = tempdir().unwrap();
        let state = TaskState::initialize(dir.path(), request()).unwrap();
        assert_eq!(state.task.status, TaskStatus::Pending);
        assert_eq!(state.task.progress_percentage, 0);
        assert!(record_path(dir.path(), &state.task.task_id).exists());
    }

    #[test]
    fn test_load_roundtrip() {
        let dir = tempdir().unwrap();
        let task_id = {
            let mut state = TaskState::initialize(dir.path(), request()).unwrap();
            state.task.creative_brief = "a brief".into();
            state
                .update_status(TaskStatus::BriefPrepared, "Brief ready.", 7)
                .unwrap();
            state.task.task_id.clone()
        };

        let loaded = TaskState::load(dir.path(), &task_id).unwrap().unwrap();
        assert_eq!(loaded.task.status, TaskStatus::BriefPrepared);
        assert_eq!(loaded.task.creative_brief, "a brief");
        assert_eq!(loaded.task.progress_percentage, 7);
        assert!(!loaded.task.last_updated_timestamp.is_empty());
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = tempdir().unwrap();
        assert!(TaskState::load(dir.path(), "nope").unwrap().is_none());
    }

    #[test]
    fn test_progress_is_monotonic_non_decreasing() {
        let dir = tempdir().unwrap();
        let mut state = TaskState::initialize(dir.path(), request()).unwrap();
        state.set_progress("later", 30).unwrap();
        state.set_progress("stale update", 10).unwrap();
        assert_eq!(state.task.progress_percentage, 30);
        state.set_progress("clamped", 200).unwrap();
        assert_eq!(state.task.progress_percentage, 100);
    }

    #[test]
    fn test_log_error_is_the_failure_transition() {
        let dir = tempdir().unwrap();
        let mut state = TaskState::initialize(dir.path(), request()).unwrap();
        state.log_error("outline", "model unreachable").unwrap();
        assert_eq!(state.task.status, TaskStatus::Failed);
        assert_eq!(state.task.error_log.len(), 1);
        assert_eq!(state.task.error_log[0].stage, "outline");
        assert!(state.task.current_status_message.contains("outline"));

        // And it is what got persisted
        let loaded = TaskState::load(dir.path(), &state.task.task_id)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.task.status, TaskStatus::Failed);
    }

    #[test]
    fn test_log_nonfatal_keeps_status() {
        let dir = tempdir().unwrap();
        let mut state = TaskState::initialize(dir.path(), request()).unwrap();
        state
            .update_status(TaskStatus::ChaptersGenerated, "assembling", 95)
            .unwrap();
        state.log_nonfatal("export", "docx upload failed").unwrap();
        assert_eq!(state.task.status, TaskStatus::ChaptersGenerated);
        assert_eq!(state.task.error_log.len(), 1);
    }

    #[test]
    fn test_list_skips_foreign_files() {
        let dir = tempdir().unwrap();
        TaskState::initialize(dir.path(), request()).unwrap();
        TaskState::initialize(dir.path(), request()).unwrap();
        std::fs::write(dir.path().join("task_bogus.json"), "not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let tasks = TaskState::list(dir.path()).unwrap();
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let tasks = TaskState::list(&dir.path().join("absent")).unwrap();
        assert!(tasks.is_empty());
    }
}
