//! Domain error types

use thiserror::Error;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Validation failed: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    /// A state transition outside the allowed edge set.
    #[error("Conflict: cannot move {entity} from {current} to {requested}")]
    IllegalTransition {
        entity: &'static str,
        current: String,
        requested: String,
    },

    /// A mutation of an entity whose current state forbids it.
    #[error("Conflict: cannot {operation} {entity} while {current}")]
    Locked {
        entity: &'static str,
        current: String,
        operation: &'static str,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("No eligible step in plan {plan_id}: {reason}")]
    NoEligibleStep { plan_id: String, reason: String },
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl DomainError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn illegal_transition(
        entity: &'static str,
        current: impl std::fmt::Display,
        requested: impl std::fmt::Display,
    ) -> Self {
        DomainError::IllegalTransition {
            entity,
            current: current.to_string(),
            requested: requested.to_string(),
        }
    }

    pub fn locked(
        entity: &'static str,
        current: impl std::fmt::Display,
        operation: &'static str,
    ) -> Self {
        DomainError::Locked {
            entity,
            current: current.to_string(),
            operation,
        }
    }

    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Both illegal transitions and locked mutations are conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::IllegalTransition { .. } | DomainError::Locked { .. }
        )
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            DomainError::Validation(fields) => fields,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_transition_names_both_states() {
        let error = DomainError::illegal_transition("task", "Completed", "InProgress");
        assert_eq!(
            error.to_string(),
            "Conflict: cannot move task from Completed to InProgress"
        );
        assert!(error.is_conflict());
    }

    #[test]
    fn test_locked_is_a_conflict() {
        let error = DomainError::locked("task", "InProgress", "update");
        assert_eq!(error.to_string(), "Conflict: cannot update task while InProgress");
        assert!(error.is_conflict());
    }

    #[test]
    fn test_validation_lists_every_field() {
        let error = DomainError::Validation(vec![
            FieldError::new("title", "must not be empty"),
            FieldError::new("description", "too long"),
        ]);
        assert_eq!(
            error.to_string(),
            "Validation failed: title: must not be empty; description: too long"
        );
        assert_eq!(error.field_errors().len(), 2);
        assert!(!error.is_conflict());
    }

    #[test]
    fn test_not_found() {
        let error = DomainError::not_found("task", "abc");
        assert_eq!(error.to_string(), "task not found: abc");
    }
}
