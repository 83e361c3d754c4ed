//! Persisted task model and file-backed state management.

pub mod record;
pub mod state;

pub use record::{
    Chapter, ChapterKind, ErrorEntry, InitialRequest, Outline, OutlineMetadata, Task, TaskStatus,
};
pub use state::TaskState;
