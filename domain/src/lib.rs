//! Domain layer for taskforge
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure, async runtimes or I/O.
//!
//! # Core Concepts
//!
//! ## Task lifecycle
//!
//! A [`CodingTask`] moves through
//! `Pending → Classifying → InProgress → {Completed, Failed, Cancelled}`,
//! with `Failed → InProgress` as the only back-edge (an explicit retry that
//! appends a new [`TaskExecution`]). [`transition`] is the pure state machine.
//!
//! ## Plans
//!
//! Complex tasks are decomposed into a [`Plan`] of dependency-ordered
//! [`PlanStep`]s, each produced by a coder call and judged by a reviewer
//! ([`ReviewVerdict`]).
//!
//! ## Events
//!
//! [`DomainEvent`]s are immutable notifications created at state transitions.

pub mod core;
pub mod events;
pub mod plan;
pub mod prompt;
pub mod review;
pub mod task;

// Re-export commonly used types
pub use core::{
    error::{DomainError, FieldError},
    json::extract_first_json_object,
};
pub use events::{
    DomainEvent, EVENTS_EXCHANGE, EventId, TaskCancelledEvent, TaskCompletedEvent,
    TaskCreatedEvent, TaskFailedEvent, TaskStartedEvent,
};
pub use plan::{
    EffortTier, Plan, PlanFeedback, PlanId, PlanProgress, PlanStatus, PlanStep, PlanStepStatus,
    StepId, StepResult, parse_plan, parse_plan_json,
};
pub use prompt::TaskPromptTemplate;
pub use review::{Critique, ReviewVerdict, parse_critique, parse_review};
pub use task::{
    Artifact, ArtifactKind, Classification, CodingTask, ExecutionId, ExecutionResult,
    ExecutionStatus, ExecutionStrategy, TaskChanges, TaskComplexity, TaskExecution, TaskId,
    TaskStatus, TaskTransition, TaskType, Usage, UserId, transition,
};
