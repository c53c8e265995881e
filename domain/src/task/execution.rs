//! Task execution entity.
//!
//! A [`TaskExecution`] records one attempt at satisfying a task. It is owned
//! exclusively by its [`CodingTask`](super::entities::CodingTask) and becomes
//! immutable once it reaches a terminal status.

use super::types::ExecutionStrategy;
use super::value_objects::{ExecutionId, ExecutionResult, TaskId};
use crate::core::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a single execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ExecutionStatus {
    #[default]
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Queued => "Queued",
            ExecutionStatus::Running => "Running",
            ExecutionStatus::Completed => "Completed",
            ExecutionStatus::Failed => "Failed",
            ExecutionStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution attempt of a coding task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExecution {
    pub id: ExecutionId,
    pub task_id: TaskId,
    pub strategy: ExecutionStrategy,
    pub model: String,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: ExecutionResult,
}

impl TaskExecution {
    pub(crate) fn queued(
        task_id: TaskId,
        strategy: ExecutionStrategy,
        model: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ExecutionId::generate(),
            task_id,
            strategy,
            model: model.into(),
            status: ExecutionStatus::Queued,
            error_message: None,
            queued_at: now,
            started_at: None,
            completed_at: None,
            result: ExecutionResult::default(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock duration between start (or queueing) and completion.
    pub fn duration(&self) -> Option<chrono::Duration> {
        let end = self.completed_at?;
        Some(end - self.started_at.unwrap_or(self.queued_at))
    }

    pub(crate) fn mark_running(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure(ExecutionStatus::Running, self.status == ExecutionStatus::Queued)?;
        self.status = ExecutionStatus::Running;
        self.started_at = Some(now);
        Ok(())
    }

    pub(crate) fn complete(
        &mut self,
        result: ExecutionResult,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure(
            ExecutionStatus::Completed,
            self.status == ExecutionStatus::Running,
        )?;
        self.status = ExecutionStatus::Completed;
        self.result = result;
        self.completed_at = Some(now);
        Ok(())
    }

    pub(crate) fn fail(
        &mut self,
        error: impl Into<String>,
        partial: ExecutionResult,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure(ExecutionStatus::Failed, !self.is_terminal())?;
        self.status = ExecutionStatus::Failed;
        self.error_message = Some(error.into());
        self.result = partial;
        self.completed_at = Some(now);
        Ok(())
    }

    pub(crate) fn cancel(
        &mut self,
        partial: ExecutionResult,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure(ExecutionStatus::Cancelled, !self.is_terminal())?;
        self.status = ExecutionStatus::Cancelled;
        self.result = partial;
        self.completed_at = Some(now);
        Ok(())
    }

    fn ensure(&self, requested: ExecutionStatus, allowed: bool) -> Result<(), DomainError> {
        if allowed {
            Ok(())
        } else {
            Err(DomainError::illegal_transition("execution", self.status, requested))
        }
    }
}
