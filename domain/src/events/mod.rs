//! Task lifecycle domain events
//!
//! Immutable records created at state transitions and handed to the event
//! publisher. Field names serialize in camelCase; consumers ignore unknown
//! fields, so new fields may only be added, never renamed.

use crate::core::error::{DomainError, FieldError};
use crate::core::id::uuid_id;
use crate::task::{
    CodingTask, ExecutionId, ExecutionResult, ExecutionStrategy, TaskComplexity, TaskExecution,
    TaskId, TaskType, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bus destination all task events are published to.
pub const EVENTS_EXCHANGE: &str = "coding_agent_events";

uuid_id!(
    /// Unique identifier of a published event; consumers deduplicate on it.
    EventId
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreatedEvent {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
    pub task_id: TaskId,
    pub user_id: UserId,
    pub title: String,
}

impl TaskCreatedEvent {
    pub fn new(task: &CodingTask) -> Self {
        Self {
            event_id: EventId::generate(),
            occurred_at: Utc::now(),
            task_id: task.id(),
            user_id: task.user_id().clone(),
            title: task.title().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStartedEvent {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
    pub task_id: TaskId,
    pub execution_id: ExecutionId,
    pub task_type: TaskType,
    pub complexity: Option<TaskComplexity>,
    pub strategy: ExecutionStrategy,
    pub user_id: UserId,
}

impl TaskStartedEvent {
    pub fn new(task: &CodingTask, execution: &TaskExecution) -> Self {
        Self {
            event_id: EventId::generate(),
            occurred_at: Utc::now(),
            task_id: task.id(),
            execution_id: execution.id,
            task_type: task.task_type(),
            complexity: task.complexity(),
            strategy: execution.strategy,
            user_id: task.user_id().clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletedEvent {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
    pub task_id: TaskId,
    pub execution_id: ExecutionId,
    pub tokens_used: u64,
    pub cost_usd: f64,
    /// Milliseconds
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub result: ExecutionResult,
}

impl TaskCompletedEvent {
    pub fn new(task: &CodingTask, execution: &TaskExecution) -> Self {
        Self {
            event_id: EventId::generate(),
            occurred_at: Utc::now(),
            task_id: task.id(),
            execution_id: execution.id,
            tokens_used: execution.result.tokens_used,
            cost_usd: execution.result.cost_usd,
            duration_ms: duration_ms(execution),
            result: execution.result.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFailedEvent {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
    pub task_id: TaskId,
    pub execution_id: ExecutionId,
    pub error_message: String,
    pub tokens_used: u64,
    pub cost_usd: f64,
    /// Milliseconds
    #[serde(rename = "duration")]
    pub duration_ms: u64,
}

impl TaskFailedEvent {
    pub fn new(task: &CodingTask, execution: &TaskExecution) -> Self {
        Self {
            event_id: EventId::generate(),
            occurred_at: Utc::now(),
            task_id: task.id(),
            execution_id: execution.id,
            error_message: execution.error_message.clone().unwrap_or_default(),
            tokens_used: execution.result.tokens_used,
            cost_usd: execution.result.cost_usd,
            duration_ms: duration_ms(execution),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCancelledEvent {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
    pub task_id: TaskId,
    pub user_id: UserId,
    pub reason: String,
}

impl TaskCancelledEvent {
    pub fn new(task: &CodingTask, reason: impl Into<String>) -> Self {
        Self {
            event_id: EventId::generate(),
            occurred_at: Utc::now(),
            task_id: task.id(),
            user_id: task.user_id().clone(),
            reason: reason.into(),
        }
    }
}

fn duration_ms(execution: &TaskExecution) -> u64 {
    execution
        .duration()
        .and_then(|d| u64::try_from(d.num_milliseconds()).ok())
        .unwrap_or(0)
}

/// Any task lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum DomainEvent {
    TaskCreated(TaskCreatedEvent),
    TaskStarted(TaskStartedEvent),
    TaskCompleted(TaskCompletedEvent),
    TaskFailed(TaskFailedEvent),
    TaskCancelled(TaskCancelledEvent),
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::TaskCreated(_) => "TaskCreated",
            DomainEvent::TaskStarted(_) => "TaskStarted",
            DomainEvent::TaskCompleted(_) => "TaskCompleted",
            DomainEvent::TaskFailed(_) => "TaskFailed",
            DomainEvent::TaskCancelled(_) => "TaskCancelled",
        }
    }

    /// Topic-style routing key on [`EVENTS_EXCHANGE`].
    pub fn routing_key(&self) -> &'static str {
        match self {
            DomainEvent::TaskCreated(_) => "task.created",
            DomainEvent::TaskStarted(_) => "task.started",
            DomainEvent::TaskCompleted(_) => "task.completed",
            DomainEvent::TaskFailed(_) => "task.failed",
            DomainEvent::TaskCancelled(_) => "task.cancelled",
        }
    }

    pub fn event_id(&self) -> EventId {
        match self {
            DomainEvent::TaskCreated(e) => e.event_id,
            DomainEvent::TaskStarted(e) => e.event_id,
            DomainEvent::TaskCompleted(e) => e.event_id,
            DomainEvent::TaskFailed(e) => e.event_id,
            DomainEvent::TaskCancelled(e) => e.event_id,
        }
    }

    pub fn task_id(&self) -> TaskId {
        match self {
            DomainEvent::TaskCreated(e) => e.task_id,
            DomainEvent::TaskStarted(e) => e.task_id,
            DomainEvent::TaskCompleted(e) => e.task_id,
            DomainEvent::TaskFailed(e) => e.task_id,
            DomainEvent::TaskCancelled(e) => e.task_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::TaskCreated(e) => e.occurred_at,
            DomainEvent::TaskStarted(e) => e.occurred_at,
            DomainEvent::TaskCompleted(e) => e.occurred_at,
            DomainEvent::TaskFailed(e) => e.occurred_at,
            DomainEvent::TaskCancelled(e) => e.occurred_at,
        }
    }

    /// Structural checks run before publishing. A malformed event is never
    /// retried.
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut errors = Vec::new();
        if self.event_id().is_nil() {
            errors.push(FieldError::new("eventId", "must not be nil"));
        }
        if self.task_id().is_nil() {
            errors.push(FieldError::new("taskId", "must not be nil"));
        }

        match self {
            DomainEvent::TaskCreated(e) if e.user_id.as_str().is_empty() => {
                errors.push(FieldError::new("userId", "must not be empty"));
            }
            DomainEvent::TaskStarted(e) if e.user_id.as_str().is_empty() => {
                errors.push(FieldError::new("userId", "must not be empty"));
            }
            DomainEvent::TaskCompleted(e) if !e.cost_usd.is_finite() || e.cost_usd < 0.0 => {
                errors.push(FieldError::new("costUsd", "must be a non-negative number"));
            }
            DomainEvent::TaskFailed(e) if !e.cost_usd.is_finite() || e.cost_usd < 0.0 => {
                errors.push(FieldError::new("costUsd", "must be a non-negative number"));
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(errors))
        }
    }
}

macro_rules! impl_from_event {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for DomainEvent {
                fn from(event: $ty) -> Self {
                    DomainEvent::$variant(event)
                }
            }
        )*
    };
}

impl_from_event!(
    TaskCreated(TaskCreatedEvent),
    TaskStarted(TaskStartedEvent),
    TaskCompleted(TaskCompletedEvent),
    TaskFailed(TaskFailedEvent),
    TaskCancelled(TaskCancelledEvent),
);
