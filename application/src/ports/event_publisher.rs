//! Event publisher port

use async_trait::async_trait;
use taskforge_domain::{DomainError, DomainEvent};
use thiserror::Error;

use super::message_bus::TransportError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    /// Local, non-retryable: the event failed structural validation.
    #[error("Malformed event: {0}")]
    Malformed(#[from] DomainError),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Delivery and dead-lettering both failed; the event is lost.
    #[error("Dead-letter routing failed after {attempts} attempts: {source}")]
    DeadLetterFailed {
        attempts: u32,
        source: TransportError,
    },
}

/// What happened to a published event.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Delivered { attempts: u32 },
    DeadLettered { attempts: u32, reason: String },
}

impl PublishOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, PublishOutcome::Delivered { .. })
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<PublishOutcome, PublishError>;

    /// One result per event, in input order. A failing event never blocks
    /// its siblings.
    async fn publish_batch(
        &self,
        events: Vec<DomainEvent>,
    ) -> Vec<Result<PublishOutcome, PublishError>>;
}
