//! Reliable event publisher
//!
//! At-least-once delivery of [`DomainEvent`]s over a [`MessageBus`]:
//! validate, serialize, send with bounded retries and jittered backoff, and
//! route to the dead-letter destination once attempts are exhausted. The
//! message id equals the event id on every attempt so consumers can
//! deduplicate redeliveries.

use crate::config::RetryPolicy;
use crate::ports::event_publisher::{EventPublisher, PublishError, PublishOutcome};
use crate::ports::message_bus::{DeadLetter, MessageBus, OutboundMessage, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use taskforge_domain::{DomainEvent, EVENTS_EXCHANGE};
use tracing::{debug, error, warn};

pub struct ReliableEventPublisher {
    bus: Arc<dyn MessageBus>,
    policy: RetryPolicy,
    exchange: String,
}

impl ReliableEventPublisher {
    pub fn new(bus: Arc<dyn MessageBus>, policy: RetryPolicy) -> Self {
        Self {
            bus,
            policy,
            exchange: EVENTS_EXCHANGE.to_string(),
        }
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    fn message(&self, event: &DomainEvent) -> Result<OutboundMessage, PublishError> {
        event.validate()?;
        let payload =
            serde_json::to_value(event).map_err(|e| PublishError::Serialization(e.to_string()))?;
        Ok(OutboundMessage {
            exchange: self.exchange.clone(),
            routing_key: event.routing_key().to_string(),
            message_id: event.event_id().to_string(),
            payload,
        })
    }

    /// Send until delivered, a non-retryable failure, or the attempt budget
    /// runs out. Returns the attempts made and the last error.
    async fn deliver(&self, message: &OutboundMessage) -> (u32, Option<TransportError>) {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.bus.send(message).await {
                Ok(()) => return (attempt, None),
                Err(e) => {
                    let retryable = self.policy.is_retryable(&e);
                    if !retryable || attempt >= self.policy.max_attempts {
                        return (attempt, Some(e));
                    }
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        message_id = %message.message_id,
                        routing_key = %message.routing_key,
                        attempt,
                        error = %e,
                        "Publish failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl EventPublisher for ReliableEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<PublishOutcome, PublishError> {
        let message = match self.message(&event) {
            Ok(message) => message,
            Err(e) => {
                error!(
                    event_id = %event.event_id(),
                    event_type = event.event_type(),
                    task_id = %event.task_id(),
                    error = %e,
                    "Refusing to publish malformed event"
                );
                return Err(e);
            }
        };

        let (attempts, failure) = self.deliver(&message).await;
        let Some(last_error) = failure else {
            debug!(
                event_id = %message.message_id,
                routing_key = %message.routing_key,
                attempts,
                "Event delivered"
            );
            return Ok(PublishOutcome::Delivered { attempts });
        };

        let reason = last_error.to_string();
        error!(
            event_id = %message.message_id,
            event_type = event.event_type(),
            task_id = %event.task_id(),
            routing_key = %message.routing_key,
            attempts,
            error = %reason,
            "Event delivery failed; routing to dead letter"
        );
        let letter = DeadLetter {
            message,
            reason: reason.clone(),
            attempts,
        };
        match self.bus.dead_letter(&letter).await {
            Ok(()) => Ok(PublishOutcome::DeadLettered { attempts, reason }),
            Err(source) => {
                error!(
                    event_id = %letter.message.message_id,
                    error = %source,
                    "Dead-letter routing failed; event lost"
                );
                Err(PublishError::DeadLetterFailed { attempts, source })
            }
        }
    }

    async fn publish_batch(
        &self,
        events: Vec<DomainEvent>,
    ) -> Vec<Result<PublishOutcome, PublishError>> {
        futures::future::join_all(events.into_iter().map(|event| self.publish(event))).await
    }
}

impl std::fmt::Debug for ReliableEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReliableEventPublisher")
            .field("exchange", &self.exchange)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingBus;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use taskforge_domain::{CodingTask, TaskCreatedEvent, TaskType, UserId};

    fn event() -> DomainEvent {
        let task = CodingTask::new("alice", "Fix login", "NPE", TaskType::BugFix).unwrap();
        TaskCreatedEvent::new(&task).into()
    }

    fn publisher(bus: Arc<RecordingBus>) -> ReliableEventPublisher {
        ReliableEventPublisher::new(bus, RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_first_try() {
        let bus = Arc::new(RecordingBus::new());
        let event = event();
        let outcome = publisher(bus.clone()).publish(event.clone()).await.unwrap();

        assert_eq!(outcome, PublishOutcome::Delivered { attempts: 1 });
        let sent = bus.sent.lock().unwrap();
        assert_eq!(sent[0].routing_key, "task.created");
        assert_eq!(sent[0].exchange, EVENTS_EXCHANGE);
        assert_eq!(sent[0].message_id, event.event_id().to_string());
        assert_eq!(sent[0].payload["eventType"], "TaskCreated");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried_once_delivered() {
        let bus = Arc::new(RecordingBus::failing_first(1, TransportError::Timeout));
        let started = tokio::time::Instant::now();

        let outcome = publisher(bus.clone()).publish(event()).await.unwrap();

        assert_eq!(outcome, PublishOutcome::Delivered { attempts: 2 });
        assert_eq!(bus.sent_count(), 1);
        assert_eq!(bus.dead_letter_count(), 0);
        // 100ms +/- 20%
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(79) && waited <= Duration::from_millis(121));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_go_to_dead_letter() {
        let bus = Arc::new(RecordingBus::failing_first(
            10,
            TransportError::Unavailable("broker down".to_string()),
        ));

        let outcome = publisher(bus.clone()).publish(event()).await.unwrap();

        assert!(matches!(outcome, PublishOutcome::DeadLettered { attempts: 3, .. }));
        assert_eq!(bus.send_attempts.load(Ordering::SeqCst), 3);
        assert_eq!(bus.sent_count(), 0);
        let letters = bus.dead_letters.lock().unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].attempts, 3);
        assert!(letters[0].reason.contains("broker down"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_failure_dead_letters_immediately() {
        let bus = Arc::new(RecordingBus::failing_first(
            1,
            TransportError::Rejected("schema".to_string()),
        ));
        let policy = RetryPolicy::default()
            .with_retryable(|e| !matches!(e, TransportError::Rejected(_)));

        let outcome = ReliableEventPublisher::new(bus.clone(), policy)
            .publish(event())
            .await
            .unwrap();

        assert!(matches!(outcome, PublishOutcome::DeadLettered { attempts: 1, .. }));
        assert_eq!(bus.send_attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_event_is_never_sent() {
        let bus = Arc::new(RecordingBus::new());
        let task = CodingTask::new("alice", "t", "d", TaskType::Test).unwrap();
        let mut created = TaskCreatedEvent::new(&task);
        created.user_id = UserId::new("");

        let err = publisher(bus.clone())
            .publish(created.into())
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Malformed(_)));
        assert_eq!(bus.send_attempts.load(Ordering::SeqCst), 0);
        assert_eq!(bus.dead_letter_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_isolates_failures() {
        let bus = Arc::new(RecordingBus::new());
        let task = CodingTask::new("alice", "t", "d", TaskType::Test).unwrap();
        let mut bad = TaskCreatedEvent::new(&task);
        bad.user_id = UserId::new("");

        let results = publisher(bus.clone())
            .publish_batch(vec![event(), bad.into(), event()])
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].as_ref().unwrap().is_delivered());
        assert!(results[1].is_err());
        assert!(results[2].as_ref().unwrap().is_delivered());
        assert_eq!(bus.sent_count(), 2);
    }
}
