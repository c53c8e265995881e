//! Classifier client port
//!
//! The external service that assigns a [`TaskType`](taskforge_domain::TaskType)
//! and [`TaskComplexity`](taskforge_domain::TaskComplexity) to a description.
//! Retrying a failed call is the caller's decision.

use async_trait::async_trait;
use taskforge_domain::Classification;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid classifier response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait ClassifierClient: Send + Sync {
    async fn classify(&self, description: &str) -> Result<Classification, ClassifierError>;
}
