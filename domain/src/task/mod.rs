//! Coding task domain
//!
//! The [`CodingTask`] aggregate, its [`TaskExecution`] history and the pure
//! lifecycle [`transition`] function.

pub mod entities;
pub mod execution;
pub mod state_machine;
pub mod types;
pub mod value_objects;

pub use entities::{CodingTask, DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS, TaskChanges};
pub use execution::{ExecutionStatus, TaskExecution};
pub use state_machine::{TaskStatus, TaskTransition, transition};
pub use types::{ExecutionStrategy, TaskComplexity, TaskType};
pub use value_objects::{
    Artifact, ArtifactKind, Classification, ExecutionId, ExecutionResult, TaskId, Usage, UserId,
};
