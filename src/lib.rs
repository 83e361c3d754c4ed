//! scribe: resumable long-document generation.
//!
//! A free-text authoring request is driven through a checkpointed pipeline
//! (brief → outline → refinement → chapters → assembly) by a status-dispatch
//! orchestrator. The persisted task record under the tasks directory is the
//! sole source of truth, so a restarted process resumes exactly at the last
//! completed stage.

pub mod config;
pub mod errors;
pub mod export;
pub mod pipeline;
pub mod services;
pub mod task;
