//! Coding task aggregate

use super::execution::{ExecutionStatus, TaskExecution};
use super::state_machine::{TaskStatus, TaskTransition, transition};
use super::types::{ExecutionStrategy, TaskComplexity, TaskType};
use super::value_objects::{Classification, ExecutionId, ExecutionResult, TaskId, UserId};
use crate::core::error::{DomainError, FieldError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 10_000;

/// Partial update of a task's editable details.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub task_type: Option<TaskType>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.task_type.is_none()
    }
}

/// A unit of coding work requested by a user.
///
/// Owns its [`TaskExecution`] history exclusively. All mutation goes through
/// methods that consult the state machine, so an `InProgress` task cannot be
/// edited or deleted regardless of which layer asks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodingTask {
    id: TaskId,
    user_id: UserId,
    title: String,
    description: String,
    task_type: TaskType,
    complexity: Option<TaskComplexity>,
    classification: Option<Classification>,
    status: TaskStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    executions: Vec<TaskExecution>,
}

impl CodingTask {
    pub fn new(
        user_id: impl Into<UserId>,
        title: impl Into<String>,
        description: impl Into<String>,
        task_type: TaskType,
    ) -> Result<Self, DomainError> {
        let title = title.into().trim().to_string();
        let description = description.into().trim().to_string();

        let mut errors = Vec::new();
        validate_title(&title, &mut errors);
        validate_description(&description, &mut errors);
        if !errors.is_empty() {
            return Err(DomainError::Validation(errors));
        }

        let now = Utc::now();
        Ok(Self {
            id: TaskId::generate(),
            user_id: user_id.into(),
            title,
            description,
            task_type,
            complexity: None,
            classification: None,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            executions: Vec::new(),
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn complexity(&self) -> Option<TaskComplexity> {
        self.complexity
    }

    pub fn classification(&self) -> Option<&Classification> {
        self.classification.as_ref()
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Execution history, oldest first.
    pub fn executions(&self) -> &[TaskExecution] {
        &self.executions
    }

    pub fn execution(&self, id: ExecutionId) -> Option<&TaskExecution> {
        self.executions.iter().find(|e| e.id == id)
    }

    pub fn latest_execution(&self) -> Option<&TaskExecution> {
        self.executions.last()
    }

    /// The execution that is queued or running, if any.
    pub fn active_execution(&self) -> Option<&TaskExecution> {
        self.executions.iter().rev().find(|e| !e.is_terminal())
    }

    /// Apply a partial edit. Rejected while the task is `InProgress`.
    pub fn update_details(&mut self, changes: TaskChanges) -> Result<(), DomainError> {
        if self.status.is_locked() {
            return Err(DomainError::locked("task", self.status, "update"));
        }

        let title = changes.title.map(|t| t.trim().to_string());
        let description = changes.description.map(|d| d.trim().to_string());

        let mut errors = Vec::new();
        if let Some(title) = &title {
            validate_title(title, &mut errors);
        }
        if let Some(description) = &description {
            validate_description(description, &mut errors);
        }
        if !errors.is_empty() {
            return Err(DomainError::Validation(errors));
        }

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(task_type) = changes.task_type {
            self.task_type = task_type;
        }
        self.touch();
        Ok(())
    }

    pub fn ensure_deletable(&self) -> Result<(), DomainError> {
        if self.status.is_locked() {
            return Err(DomainError::locked("task", self.status, "delete"));
        }
        Ok(())
    }

    /// Pending → Classifying.
    pub fn begin_classification(&mut self) -> Result<(), DomainError> {
        self.status = transition(self.status, TaskTransition::BeginClassification)?;
        self.touch();
        Ok(())
    }

    /// Record a classifier verdict. Complexity stays mutable until execution starts.
    pub fn apply_classification(&mut self, classification: Classification) -> Result<(), DomainError> {
        if !matches!(self.status, TaskStatus::Pending | TaskStatus::Classifying) {
            return Err(DomainError::locked("task", self.status, "reclassify"));
        }
        self.task_type = classification.task_type;
        self.complexity = Some(classification.complexity);
        self.classification = Some(classification);
        self.touch();
        Ok(())
    }

    /// Set complexity without a classifier verdict (e.g. a fallback).
    pub fn set_complexity(&mut self, complexity: TaskComplexity) -> Result<(), DomainError> {
        if !matches!(self.status, TaskStatus::Pending | TaskStatus::Classifying) {
            return Err(DomainError::locked("task", self.status, "reclassify"));
        }
        self.complexity = Some(complexity);
        self.touch();
        Ok(())
    }

    /// Check that [`start_execution`](Self::start_execution) would succeed,
    /// without changing anything.
    pub fn ensure_executable(&self) -> Result<(), DomainError> {
        self.execution_target().map(|_| ())
    }

    /// Whether this start is the retry of a failed execution.
    pub fn is_retry(&self) -> bool {
        self.status == TaskStatus::Failed
    }

    fn execution_target(&self) -> Result<TaskStatus, DomainError> {
        if self.active_execution().is_some() {
            return Err(DomainError::illegal_transition(
                "task",
                self.status,
                TaskStatus::InProgress,
            ));
        }
        match self.status {
            TaskStatus::Failed => transition(self.status, TaskTransition::Retry),
            TaskStatus::Pending => {
                let classifying = transition(self.status, TaskTransition::BeginClassification)?;
                transition(classifying, TaskTransition::Start)
            }
            current => transition(current, TaskTransition::Start),
        }
    }

    /// Move into `InProgress` and append a new `Queued` execution.
    ///
    /// A `Failed` task goes through the retry edge; prior executions are left
    /// untouched. A `Pending` task is moved through `Classifying` first.
    pub fn start_execution(
        &mut self,
        strategy: ExecutionStrategy,
        model: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<ExecutionId, DomainError> {
        let next = self.execution_target()?;
        let execution = TaskExecution::queued(self.id, strategy, model, now);
        let id = execution.id;
        self.executions.push(execution);
        self.status = next;
        self.started_at = Some(now);
        self.completed_at = None;
        self.updated_at = now;
        Ok(id)
    }

    pub fn mark_execution_running(
        &mut self,
        id: ExecutionId,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.execution_mut(id)?.mark_running(now)?;
        self.updated_at = now;
        Ok(())
    }

    /// Complete the execution and the task together.
    pub fn complete_execution(
        &mut self,
        id: ExecutionId,
        result: ExecutionResult,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let next = transition(self.status, TaskTransition::Complete)?;
        self.execution_mut(id)?.complete(result, now)?;
        self.finish(next, now);
        Ok(())
    }

    /// Fail the execution and the task together, keeping partial usage.
    pub fn fail_execution(
        &mut self,
        id: ExecutionId,
        error: impl Into<String>,
        partial: ExecutionResult,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let next = transition(self.status, TaskTransition::Fail)?;
        self.execution_mut(id)?.fail(error, partial, now)?;
        self.finish(next, now);
        Ok(())
    }

    /// Cancel the execution and the task together.
    pub fn cancel_execution(
        &mut self,
        id: ExecutionId,
        partial: ExecutionResult,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let next = transition(self.status, TaskTransition::Cancel)?;
        self.execution_mut(id)?.cancel(partial, now)?;
        self.finish(next, now);
        Ok(())
    }

    /// Cancel a task that has no execution in flight.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if let Some(active) = self.active_execution() {
            let id = active.id;
            return self.cancel_execution(id, ExecutionResult::default(), now);
        }
        let next = transition(self.status, TaskTransition::Cancel)?;
        self.finish(next, now);
        Ok(())
    }

    fn execution_mut(&mut self, id: ExecutionId) -> Result<&mut TaskExecution, DomainError> {
        self.executions
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| DomainError::not_found("execution", id))
    }

    fn finish(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        self.status = status;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Count of executions that ended in the given status.
    pub fn executions_with_status(&self, status: ExecutionStatus) -> usize {
        self.executions.iter().filter(|e| e.status == status).count()
    }
}

fn validate_title(title: &str, errors: &mut Vec<FieldError>) {
    let len = title.chars().count();
    if len == 0 {
        errors.push(FieldError::new("title", "must not be empty"));
    } else if len > TITLE_MAX_CHARS {
        errors.push(FieldError::new(
            "title",
            format!("must be at most {} characters (got {})", TITLE_MAX_CHARS, len),
        ));
    }
}

fn validate_description(description: &str, errors: &mut Vec<FieldError>) {
    let len = description.chars().count();
    if len == 0 {
        errors.push(FieldError::new("description", "must not be empty"));
    } else if len > DESCRIPTION_MAX_CHARS {
        errors.push(FieldError::new(
            "description",
            format!(
                "must be at most {} characters (got {})",
                DESCRIPTION_MAX_CHARS, len
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::value_objects::Usage;

    fn task() -> CodingTask {
        CodingTask::new("alice", "Fix login", "Fix null pointer in login", TaskType::BugFix)
            .unwrap()
    }

    fn running(task: &mut CodingTask) -> ExecutionId {
        let id = task
            .start_execution(ExecutionStrategy::SingleShot, "gpt-4o", Utc::now())
            .unwrap();
        task.mark_execution_running(id, Utc::now()).unwrap();
        id
    }

    // ==================== Validation ====================

    #[test]
    fn test_new_task_is_pending() {
        let task = task();
        assert_eq!(task.status(), TaskStatus::Pending);
        assert!(task.executions().is_empty());
        assert!(task.complexity().is_none());
    }

    #[test]
    fn test_new_task_reports_every_invalid_field() {
        let err = CodingTask::new("alice", "  ", "", TaskType::Feature).unwrap_err();
        let fields: Vec<_> = err.field_errors().iter().map(|f| f.field).collect();
        assert_eq!(fields, vec!["title", "description"]);
    }

    #[test]
    fn test_title_length_bounds() {
        let max = "x".repeat(TITLE_MAX_CHARS);
        assert!(CodingTask::new("u", max, "d", TaskType::Feature).is_ok());

        let over = "x".repeat(TITLE_MAX_CHARS + 1);
        let err = CodingTask::new("u", over, "d", TaskType::Feature).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "title");
    }

    #[test]
    fn test_description_length_bound() {
        let over = "y".repeat(DESCRIPTION_MAX_CHARS + 1);
        let err = CodingTask::new("u", "t", over, TaskType::Feature).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "description");
    }

    // ==================== Locking ====================

    #[test]
    fn test_in_progress_task_cannot_be_updated_or_deleted() {
        let mut task = task();
        running(&mut task);

        let err = task
            .update_details(TaskChanges {
                title: Some("New".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(task.title(), "Fix login");
        assert!(task.ensure_deletable().unwrap_err().is_conflict());
    }

    #[test]
    fn test_update_applies_only_given_fields() {
        let mut task = task();
        task.update_details(TaskChanges {
            description: Some("Fix NPE in login handler".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(task.title(), "Fix login");
        assert_eq!(task.description(), "Fix NPE in login handler");
    }

    #[test]
    fn test_invalid_update_leaves_task_untouched() {
        let mut task = task();
        let err = task
            .update_details(TaskChanges {
                title: Some(String::new()),
                description: Some("ok".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.field_errors().len(), 1);
        assert_eq!(task.description(), "Fix null pointer in login");
    }

    // ==================== Execution lifecycle ====================

    #[test]
    fn test_execute_from_pending_goes_through_classifying() {
        let mut task = task();
        let id = task
            .start_execution(ExecutionStrategy::SingleShot, "m", Utc::now())
            .unwrap();
        assert_eq!(task.status(), TaskStatus::InProgress);
        assert_eq!(task.active_execution().unwrap().id, id);
        assert_eq!(task.active_execution().unwrap().status, ExecutionStatus::Queued);
    }

    #[test]
    fn test_second_execute_is_a_conflict() {
        let mut task = task();
        running(&mut task);
        let err = task
            .start_execution(ExecutionStrategy::SingleShot, "m", Utc::now())
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(task.executions().len(), 1);
    }

    #[test]
    fn test_ensure_executable_does_not_mutate() {
        let mut task = task();
        assert!(task.ensure_executable().is_ok());
        assert_eq!(task.status(), TaskStatus::Pending);
        assert!(task.executions().is_empty());

        running(&mut task);
        assert!(task.ensure_executable().unwrap_err().is_conflict());
    }

    #[test]
    fn test_completion_updates_task_and_execution() {
        let mut task = task();
        let id = running(&mut task);
        task.complete_execution(id, ExecutionResult::new(Usage::new(42, 0.01)), Utc::now())
            .unwrap();

        assert_eq!(task.status(), TaskStatus::Completed);
        assert!(task.completed_at().is_some());
        let exec = task.execution(id).unwrap();
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert_eq!(exec.result.tokens_used, 42);
    }

    #[test]
    fn test_completed_task_cannot_execute_again() {
        let mut task = task();
        let id = running(&mut task);
        task.complete_execution(id, ExecutionResult::default(), Utc::now())
            .unwrap();

        let err = task
            .start_execution(ExecutionStrategy::SingleShot, "m", Utc::now())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Conflict: cannot move task from Completed to InProgress"
        );
    }

    #[test]
    fn test_retry_appends_new_execution_and_keeps_history() {
        let mut task = task();
        let first = running(&mut task);
        task.fail_execution(first, "timeout", ExecutionResult::default(), Utc::now())
            .unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);

        let second = task
            .start_execution(ExecutionStrategy::Iterative, "m", Utc::now())
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(task.status(), TaskStatus::InProgress);
        assert_eq!(task.executions().len(), 2);
        let prior = task.execution(first).unwrap();
        assert_eq!(prior.status, ExecutionStatus::Failed);
        assert_eq!(prior.error_message.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_cancel_pending_task() {
        let mut task = task();
        task.cancel(Utc::now()).unwrap();
        assert_eq!(task.status(), TaskStatus::Cancelled);
        assert!(task.cancel(Utc::now()).is_err());
    }

    #[test]
    fn test_cancel_running_task_cancels_execution() {
        let mut task = task();
        let id = running(&mut task);
        task.cancel(Utc::now()).unwrap();
        assert_eq!(task.status(), TaskStatus::Cancelled);
        assert_eq!(task.execution(id).unwrap().status, ExecutionStatus::Cancelled);
        assert_eq!(task.executions_with_status(ExecutionStatus::Cancelled), 1);
    }

    #[test]
    fn test_classification_locked_after_start() {
        let mut task = task();
        task.begin_classification().unwrap();
        task.apply_classification(Classification::new(
            TaskType::BugFix,
            TaskComplexity::Simple,
            0.9,
        ))
        .unwrap();
        assert_eq!(task.complexity(), Some(TaskComplexity::Simple));

        running(&mut task);
        let err = task.set_complexity(TaskComplexity::Epic).unwrap_err();
        assert!(err.is_conflict());
    }
}
