//! Task lifecycle state machine.
//!
//! ```text
//! Pending ──begin_classification──▶ Classifying ──start──▶ InProgress ──complete──▶ Completed
//!    │                                   │                    │  └────fail─────▶ Failed
//!    └──────────cancel───────────────────┴──────cancel────────┴──▶ Cancelled      │
//!                                                 InProgress ◀──────retry──────────┘
//! ```
//!
//! [`transition`] is a pure function of (current state, transition); it never
//! touches timestamps or executions. The aggregate applies its result.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Status of a coding task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    /// Created, not yet classified
    #[default]
    Pending,
    /// Classification requested or done, execution not started
    Classifying,
    /// An execution is queued or running
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::Classifying,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Classifying => "Classifying",
            TaskStatus::InProgress => "InProgress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
            TaskStatus::Cancelled => "Cancelled",
        }
    }

    /// No further transitions except the explicit retry of a failed task.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Title and description may only change before work begins or after it ends.
    pub fn is_locked(&self) -> bool {
        matches!(self, TaskStatus::InProgress)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace(['_', '-'], "");
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str().to_ascii_lowercase() == normalized)
            .ok_or_else(|| format!("unknown task status: {}", s))
    }
}

/// An event that drives the task state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskTransition {
    BeginClassification,
    Start,
    Complete,
    Fail,
    Cancel,
    Retry,
}

impl TaskTransition {
    pub const ALL: [TaskTransition; 6] = [
        TaskTransition::BeginClassification,
        TaskTransition::Start,
        TaskTransition::Complete,
        TaskTransition::Fail,
        TaskTransition::Cancel,
        TaskTransition::Retry,
    ];

    /// State this transition moves a task into when it is legal.
    pub fn target(&self) -> TaskStatus {
        match self {
            TaskTransition::BeginClassification => TaskStatus::Classifying,
            TaskTransition::Start | TaskTransition::Retry => TaskStatus::InProgress,
            TaskTransition::Complete => TaskStatus::Completed,
            TaskTransition::Fail => TaskStatus::Failed,
            TaskTransition::Cancel => TaskStatus::Cancelled,
        }
    }
}

/// Compute the next state, or a [`DomainError::IllegalTransition`] naming the
/// current and requested state.
pub fn transition(current: TaskStatus, event: TaskTransition) -> Result<TaskStatus, DomainError> {
    use TaskStatus::*;
    use TaskTransition::*;

    let allowed = matches!(
        (current, event),
        (Pending, BeginClassification)
            | (Classifying, Start)
            | (InProgress, Complete)
            | (InProgress, Fail)
            | (Pending | Classifying | InProgress, Cancel)
            | (Failed, Retry)
    );

    if allowed {
        Ok(event.target())
    } else {
        Err(DomainError::illegal_transition("task", current, event.target()))
    }
}
