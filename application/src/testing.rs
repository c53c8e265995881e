//! Test doubles for the application ports.

use crate::ports::classifier::{ClassifierClient, ClassifierError};
use crate::ports::event_publisher::{EventPublisher, PublishError, PublishOutcome};
use crate::ports::llm_client::{ChatRole, LlmClient, LlmError, LlmRequest, LlmResponse};
use crate::ports::message_bus::{DeadLetter, MessageBus, OutboundMessage, TransportError};
use crate::ports::repository::{
    ExecutionRepository, Page, RepositoryError, TaskQuery, TaskRepository,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use taskforge_domain::{
    Classification, CodingTask, DomainEvent, ExecutionId, TaskExecution, TaskId,
};

pub const TOKENS_PER_CALL: u64 = 10;
pub const COST_PER_CALL: f64 = 0.001;

type Handler = Box<dyn Fn(&LlmRequest) -> Result<String, LlmError> + Send + Sync>;

/// LLM that answers from a queue, or from a routing function.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    handler: Option<Handler>,
    requests: Mutex<Vec<LlmRequest>>,
    delay: Option<Duration>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            handler: None,
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn texts(responses: &[&str]) -> Self {
        Self::new(responses.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn routed(
        handler: impl Fn(&LlmRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::new(Vec::new())
        }
    }

    /// Every call sleeps first (use with paused time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let content = match &self.handler {
            Some(handler) => handler(&request),
            None => self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("(no more responses)".to_string())),
        }?;
        Ok(LlmResponse::new(content, TOKENS_PER_CALL, COST_PER_CALL))
    }
}

/// Classifier returning a fixed verdict.
pub struct FixedClassifier {
    result: Result<Classification, ClassifierError>,
    calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(classification: Classification) -> Self {
        Self {
            result: Ok(classification),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(ClassifierError::Unavailable("down".to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClassifierClient for FixedClassifier {
    async fn classify(&self, _description: &str) -> Result<Classification, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Bus that records traffic and fails the first `failures` sends.
#[derive(Default)]
pub struct RecordingBus {
    pub sent: Mutex<Vec<OutboundMessage>>,
    pub dead_letters: Mutex<Vec<DeadLetter>>,
    pub send_attempts: AtomicU32,
    failures: AtomicU32,
    failure: Mutex<Option<TransportError>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(failures: u32, error: TransportError) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            failure: Mutex::new(Some(error)),
            ..Self::default()
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn dead_letter_count(&self) -> usize {
        self.dead_letters.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageBus for RecordingBus {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail && let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn dead_letter(&self, letter: &DeadLetter) -> Result<(), TransportError> {
        self.dead_letters.lock().unwrap().push(letter.clone());
        Ok(())
    }
}

/// Publisher that records events in publish order.
#[derive(Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<DomainEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type())
            .collect()
    }

    pub fn events_for(&self, task_id: TaskId) -> Vec<DomainEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.task_id() == task_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<PublishOutcome, PublishError> {
        self.events.lock().unwrap().push(event);
        Ok(PublishOutcome::Delivered { attempts: 1 })
    }

    async fn publish_batch(
        &self,
        events: Vec<DomainEvent>,
    ) -> Vec<Result<PublishOutcome, PublishError>> {
        let mut results = Vec::new();
        for event in events {
            results.push(self.publish(event).await);
        }
        results
    }
}

/// Task store backed by a map.
#[derive(Default)]
pub struct MemoryRepository {
    tasks: Mutex<HashMap<TaskId, CodingTask>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for MemoryRepository {
    async fn insert(&self, task: &CodingTask) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.contains_key(&task.id()) {
            return Err(RepositoryError::Duplicate(task.id().to_string()));
        }
        tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Option<CodingTask>, RepositoryError> {
        Ok(self.tasks.lock().unwrap().get(&id).cloned())
    }

    async fn save(&self, task: &CodingTask) -> Result<(), RepositoryError> {
        self.tasks.lock().unwrap().insert(task.id(), task.clone());
        Ok(())
    }

    async fn delete(&self, id: TaskId) -> Result<bool, RepositoryError> {
        Ok(self.tasks.lock().unwrap().remove(&id).is_some())
    }

    async fn list(&self, query: &TaskQuery) -> Result<Page<CodingTask>, RepositoryError> {
        let tasks = self.tasks.lock().unwrap();
        let mut matching: Vec<_> = tasks.values().filter(|t| query.matches(t)).cloned().collect();
        matching.sort_by_key(|t| std::cmp::Reverse(t.created_at()));
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.offset())
            .take(query.per_page as usize)
            .collect();
        Ok(Page {
            items,
            total,
            page: query.page,
            per_page: query.per_page,
        })
    }
}

#[async_trait]
impl ExecutionRepository for MemoryRepository {
    async fn list_for_task(&self, task_id: TaskId) -> Result<Vec<TaskExecution>, RepositoryError> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .get(&task_id)
            .map(|t| t.executions().to_vec())
            .unwrap_or_default())
    }

    async fn get_execution(
        &self,
        id: ExecutionId,
    ) -> Result<Option<TaskExecution>, RepositoryError> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .values()
            .find_map(|t| t.execution(id).cloned()))
    }
}

/// System prompt of a request, or `""`.
pub fn system_prompt(request: &LlmRequest) -> &str {
    request
        .messages
        .iter()
        .find(|m| m.role == ChatRole::System)
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}
