use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use taskforge_application::ports::message_bus::{
    DeadLetter, MessageBus, OutboundMessage, TransportError,
};
use tracing::debug;

/// In-process bus that records every message it is handed.
#[derive(Debug, Default)]
pub struct InMemoryMessageBus {
    sent: Mutex<Vec<OutboundMessage>>,
    dead_letters: Mutex<Vec<DeadLetter>>,
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages sent with the given routing key.
    pub fn sent_with_key(&self, routing_key: &str) -> Vec<OutboundMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.routing_key == routing_key)
            .collect()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        debug!(
            routing_key = %message.routing_key,
            message_id = %message.message_id,
            "Message sent"
        );
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }

    async fn dead_letter(&self, letter: &DeadLetter) -> Result<(), TransportError> {
        self.dead_letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(letter.clone());
        Ok(())
    }
}
