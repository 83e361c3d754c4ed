//! Typed error hierarchy for the scribe pipeline.
//!
//! One enum per collaborator boundary, plus `StageError`, the umbrella a
//! stage handler returns and the orchestrator catches exactly once. Only
//! `PersistenceError` escapes the orchestrator: it cannot be logged into the
//! very record that failed to write.

use std::path::PathBuf;
use thiserror::Error;

/// Transport/API failures from the language-model client.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to reach language model endpoint: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Language model returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Language model response carried no message content")]
    MissingContent,
}

/// Hard connectivity failures from the knowledge retriever. "No results" is
/// an empty list, never an error; callers treat these errors as empty too.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Knowledge retriever request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Knowledge retriever returned status {status}")]
    Api { status: u16 },
}

/// Failures reading or writing the persisted task record. Always fatal.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to create tasks directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read task record at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write task record at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Task record at {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize task record: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Artifact export failures (markdown/docx write, object-store upload).
/// Logged on the task record but never fatal to the pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write artifact at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render binary document: {0}")]
    Render(String),

    #[error("Artifact upload failed: {0}")]
    Upload(String),
}

/// A stage's unrecoverable failure.
///
/// Validation problems with documented fallbacks (malformed brief, outline
/// or critique JSON) are handled inside the stage and never reach this type.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Errors surfaced to whoever drives the orchestrator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Task {task_id} not found")]
    TaskNotFound { task_id: String },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_converts_from_model_error() {
        let err: StageError = ModelError::MissingContent.into();
        assert!(matches!(err, StageError::Model(ModelError::MissingContent)));
    }

    #[test]
    fn stage_error_persistence_is_distinguishable() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: StageError = PersistenceError::WriteFailed {
            path: PathBuf::from("/tasks/task_x.json"),
            source: io_err,
        }
        .into();
        match err {
            StageError::Persistence(PersistenceError::WriteFailed { path, .. }) => {
                assert_eq!(path, PathBuf::from("/tasks/task_x.json"));
            }
            other => panic!("Expected Persistence(WriteFailed), got {other:?}"),
        }
    }

    #[test]
    fn pipeline_error_not_found_carries_task_id() {
        let err = PipelineError::TaskNotFound {
            task_id: "abc".into(),
        };
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ModelError::MissingContent);
        assert_std_error(&RetrievalError::Api { status: 502 });
        assert_std_error(&ExportError::Upload("bucket missing".into()));
        assert_std_error(&StageError::Validation("no usable text".into()));
    }
}
