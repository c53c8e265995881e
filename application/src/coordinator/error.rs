//! Coordinator error taxonomy.

use crate::ports::repository::RepositoryError;
use std::time::Duration;
use taskforge_domain::{DomainError, UserId};
use thiserror::Error;

/// Errors returned to callers of the execution coordinator.
///
/// Strategy failures are not in this list: they end the execution as
/// `Failed` and are reported on the execution record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    #[error(transparent)]
    Validation(DomainError),

    #[error(transparent)]
    NotFound(DomainError),

    #[error(transparent)]
    Conflict(DomainError),

    #[error("Rate limit exceeded for user {user_id}; retry in {}s", retry_after.as_secs().max(1))]
    RateLimitExceeded {
        user_id: UserId,
        retry_after: Duration,
    },

    #[error("Execution queue is full")]
    QueueFull,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Coordinator is shutting down")]
    ShuttingDown,
}

impl CoordinatorError {
    pub(crate) fn task_not_found(id: impl std::fmt::Display) -> Self {
        CoordinatorError::NotFound(DomainError::not_found("task", id))
    }
}

impl From<DomainError> for CoordinatorError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation(_) => CoordinatorError::Validation(error),
            DomainError::NotFound { .. } => CoordinatorError::NotFound(error),
            DomainError::IllegalTransition { .. }
            | DomainError::Locked { .. }
            | DomainError::NoEligibleStep { .. } => CoordinatorError::Conflict(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_taxonomy() {
        assert!(matches!(
            CoordinatorError::from(DomainError::invalid("title", "must not be empty")),
            CoordinatorError::Validation(_)
        ));
        assert!(matches!(
            CoordinatorError::from(DomainError::locked("task", "InProgress", "delete")),
            CoordinatorError::Conflict(_)
        ));
        assert!(matches!(
            CoordinatorError::task_not_found("42"),
            CoordinatorError::NotFound(_)
        ));
    }

    #[test]
    fn test_rate_limit_message_reports_at_least_one_second() {
        let err = CoordinatorError::RateLimitExceeded {
            user_id: UserId::new("alice"),
            retry_after: Duration::from_millis(300),
        };
        assert_eq!(
            err.to_string(),
            "Rate limit exceeded for user alice; retry in 1s"
        );
    }
}
