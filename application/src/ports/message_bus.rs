//! Message bus port
//!
//! Transport for published events. Implementations only move bytes; retry,
//! backoff and dead-letter routing belong to the publisher.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Transport timeout")]
    Timeout,

    #[error("Message rejected by broker: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// A message ready for the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub exchange: String,
    pub routing_key: String,
    /// Stable across retries so consumers can deduplicate.
    pub message_id: String,
    pub payload: serde_json::Value,
}

/// A message that exhausted delivery, with why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub message: OutboundMessage,
    pub reason: String,
    pub attempts: u32,
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;

    async fn dead_letter(&self, letter: &DeadLetter) -> Result<(), TransportError>;
}
