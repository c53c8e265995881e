//! Execution coordinator
//!
//! Owns the task lifecycle on behalf of callers: intake and classification,
//! admission control, strategy selection, hand-off to the worker pool, and
//! the final state transition with its domain event.
//!
//! Every read-modify-save of a task happens under one async write lock, so
//! a task row is never written by two callers at once. Model calls and
//! classifier calls always happen outside that lock.

pub mod admission;
pub mod error;
pub mod worker_pool;

pub use admission::{AdmissionControl, SlidingWindowRateLimiter};
pub use error::CoordinatorError;
pub use worker_pool::WorkerPool;

use crate::config::CoordinatorConfig;
use crate::logs::{ExecutionLogHub, ExecutionLogWriter, LogSubscription};
use crate::ports::classifier::ClassifierClient;
use crate::ports::event_publisher::{EventPublisher, PublishOutcome};
use crate::ports::repository::{ExecutionRepository, Page, TaskQuery, TaskRepository};
use crate::strategies::{ExecutionContext, StrategyError, StrategyRegistry};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use taskforge_domain::{
    Classification, CodingTask, DomainError, DomainEvent, ExecutionId, ExecutionResult,
    ExecutionStrategy, TaskCancelledEvent, TaskChanges, TaskCompletedEvent, TaskComplexity,
    TaskCreatedEvent, TaskExecution, TaskFailedEvent, TaskId, TaskStartedEvent, TaskStatus,
    TaskType, UserId,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const DEFAULT_CANCEL_REASON: &str = "cancelled by user";

/// Input for [`ExecutionCoordinator::create_task`].
#[derive(Debug, Clone)]
pub struct NewTask {
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    /// Overwritten by the classifier when one answers.
    pub task_type: TaskType,
}

impl NewTask {
    pub fn new(
        user_id: impl Into<UserId>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            description: description.into(),
            task_type: TaskType::Feature,
        }
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }
}

/// Options for [`ExecutionCoordinator::execute`].
#[derive(Debug, Clone, Default)]
pub struct ExecuteRequest {
    /// Overrides the complexity-based default.
    pub strategy: Option<ExecutionStrategy>,
    pub model: Option<String>,
}

impl ExecuteRequest {
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Receipt for an accepted execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionTicket {
    pub task_id: TaskId,
    pub execution_id: ExecutionId,
    pub strategy: ExecutionStrategy,
    pub model: String,
}

/// How the strategy of an execution was chosen.
struct Resolution {
    strategy: ExecutionStrategy,
    classification: Option<Classification>,
    fallback: Option<TaskComplexity>,
}

struct InFlight {
    execution_id: ExecutionId,
    cancel: CancellationToken,
    reason: Option<String>,
}

struct Inner {
    tasks: Arc<dyn TaskRepository>,
    executions: Arc<dyn ExecutionRepository>,
    classifier: Arc<dyn ClassifierClient>,
    publisher: Arc<dyn EventPublisher>,
    strategies: StrategyRegistry,
    admission: Arc<dyn AdmissionControl>,
    logs: Arc<ExecutionLogHub>,
    pool: WorkerPool,
    write_lock: tokio::sync::Mutex<()>,
    in_flight: Mutex<HashMap<TaskId, InFlight>>,
    config: CoordinatorConfig,
}

/// Cheap to clone; clones share the same pool and state.
#[derive(Clone)]
pub struct ExecutionCoordinator {
    inner: Arc<Inner>,
}

impl ExecutionCoordinator {
    /// Must be called inside a tokio runtime (the worker pool spawns its
    /// dispatcher immediately).
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        executions: Arc<dyn ExecutionRepository>,
        classifier: Arc<dyn ClassifierClient>,
        publisher: Arc<dyn EventPublisher>,
        strategies: StrategyRegistry,
        config: CoordinatorConfig,
    ) -> Self {
        let admission = Arc::new(SlidingWindowRateLimiter::new(config.rate_limit.clone()));
        Self::with_admission(
            tasks,
            executions,
            classifier,
            publisher,
            strategies,
            admission,
            config,
        )
    }

    pub fn with_admission(
        tasks: Arc<dyn TaskRepository>,
        executions: Arc<dyn ExecutionRepository>,
        classifier: Arc<dyn ClassifierClient>,
        publisher: Arc<dyn EventPublisher>,
        strategies: StrategyRegistry,
        admission: Arc<dyn AdmissionControl>,
        config: CoordinatorConfig,
    ) -> Self {
        let pool = WorkerPool::new(config.worker_pool_size, config.queue_capacity);
        Self {
            inner: Arc::new(Inner {
                tasks,
                executions,
                classifier,
                publisher,
                strategies,
                admission,
                logs: Arc::new(ExecutionLogHub::with_retention(config.retained_logs)),
                pool,
                write_lock: tokio::sync::Mutex::new(()),
                in_flight: Mutex::new(HashMap::new()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn log_hub(&self) -> Arc<ExecutionLogHub> {
        Arc::clone(&self.inner.logs)
    }

    // ==================== Task CRUD ====================

    /// Validate and persist a new task, then classify it when configured to.
    ///
    /// A classifier failure is logged and leaves the task unclassified.
    pub async fn create_task(&self, new: NewTask) -> Result<CodingTask, CoordinatorError> {
        let mut task = CodingTask::new(new.user_id, new.title, new.description, new.task_type)?;
        self.inner.tasks.insert(&task).await?;
        info!(task_id = %task.id(), user_id = %task.user_id(), "Task created");
        self.inner.emit(TaskCreatedEvent::new(&task)).await;

        if !self.inner.config.classify_on_create {
            return Ok(task);
        }

        let classification = match self.inner.classifier.classify(task.description()).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!(task_id = %task.id(), error = %e, "Classification failed; task left unclassified");
                return Ok(task);
            }
        };

        let _guard = self.inner.write_lock.lock().await;
        if let Some(mut current) = self.inner.tasks.get(task.id()).await? {
            if current.status() == TaskStatus::Pending {
                current.begin_classification()?;
            }
            match current.apply_classification(classification) {
                Ok(()) => {
                    self.inner.tasks.save(&current).await?;
                    debug!(
                        task_id = %current.id(),
                        complexity = ?current.complexity(),
                        "Task classified"
                    );
                }
                Err(e) => debug!(task_id = %current.id(), error = %e, "Classification discarded"),
            }
            task = current;
        }
        Ok(task)
    }

    pub async fn get_task(&self, task_id: TaskId) -> Result<CodingTask, CoordinatorError> {
        self.inner.load(task_id).await
    }

    pub async fn list_tasks(&self, query: &TaskQuery) -> Result<Page<CodingTask>, CoordinatorError> {
        Ok(self.inner.tasks.list(query).await?)
    }

    /// Rejected with `Conflict` while the task is in progress.
    pub async fn update_task(
        &self,
        task_id: TaskId,
        changes: TaskChanges,
    ) -> Result<CodingTask, CoordinatorError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut task = self.inner.load(task_id).await?;
        task.update_details(changes)?;
        self.inner.tasks.save(&task).await?;
        debug!(task_id = %task_id, "Task updated");
        Ok(task)
    }

    /// Rejected with `Conflict` while the task is in progress.
    pub async fn delete_task(&self, task_id: TaskId) -> Result<(), CoordinatorError> {
        let _guard = self.inner.write_lock.lock().await;
        let task = self.inner.load(task_id).await?;
        task.ensure_deletable()?;
        if !self.inner.tasks.delete(task_id).await? {
            return Err(CoordinatorError::task_not_found(task_id));
        }
        for execution in task.executions() {
            self.inner.logs.remove(execution.id);
        }
        info!(task_id = %task_id, "Task deleted");
        Ok(())
    }

    pub async fn list_executions(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<TaskExecution>, CoordinatorError> {
        self.inner.load(task_id).await?;
        Ok(self.inner.executions.list_for_task(task_id).await?)
    }

    // ==================== Execution ====================

    /// Accept an execution request and queue it.
    ///
    /// Fails fast with `Conflict` when the task cannot start (including a
    /// second request while one is in flight), `RateLimitExceeded` when the
    /// user's quota is spent and `QueueFull` when no queue place is left.
    pub async fn execute(
        &self,
        task_id: TaskId,
        request: ExecuteRequest,
    ) -> Result<ExecutionTicket, CoordinatorError> {
        let inner = &self.inner;
        let task = inner.load(task_id).await?;
        task.ensure_executable()?;

        let user_id = task.user_id().clone();
        let consumes_quota = !task.is_retry() || inner.config.retries_consume_quota;
        if consumes_quota && let Err(retry_after) = inner.admission.try_admit(&user_id) {
            warn!(task_id = %task_id, user_id = %user_id, "Rate limit exceeded");
            return Err(CoordinatorError::RateLimitExceeded {
                user_id,
                retry_after,
            });
        }

        let accepted = self.accept(task, request).await;
        if accepted.is_err() && consumes_quota {
            inner.admission.refund(&user_id);
        }
        accepted
    }

    async fn accept(
        &self,
        task: CodingTask,
        request: ExecuteRequest,
    ) -> Result<ExecutionTicket, CoordinatorError> {
        let inner = &self.inner;
        let task_id = task.id();
        let resolution = inner.resolve_strategy(&task, request.strategy).await;
        if inner.strategies.get(resolution.strategy).is_none() {
            return Err(CoordinatorError::Validation(DomainError::invalid(
                "strategy",
                format!("{} is not available", resolution.strategy),
            )));
        }
        let model = request
            .model
            .unwrap_or_else(|| inner.config.default_model.clone());
        let slot = inner.pool.reserve()?;

        let execution_id = {
            let _guard = inner.write_lock.lock().await;
            let mut task = inner.load(task_id).await?;
            if task.complexity().is_none()
                && matches!(task.status(), TaskStatus::Pending | TaskStatus::Classifying)
            {
                if let Some(classification) = resolution.classification {
                    task.apply_classification(classification)?;
                } else if let Some(complexity) = resolution.fallback {
                    task.set_complexity(complexity)?;
                }
            }
            let execution_id = task.start_execution(resolution.strategy, &model, Utc::now())?;
            inner.tasks.save(&task).await?;
            inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(
                    task_id,
                    InFlight {
                        execution_id,
                        cancel: CancellationToken::new(),
                        reason: None,
                    },
                );
            execution_id
        };

        let log = inner.logs.open(execution_id);
        log.line(format!(
            "Queued: strategy {} with model {}",
            resolution.strategy, model
        ));
        info!(
            task_id = %task_id,
            execution_id = %execution_id,
            strategy = %resolution.strategy,
            model = %model,
            "Execution queued"
        );

        let worker = Arc::clone(inner);
        slot.submit(async move {
            worker.run(task_id, execution_id, log).await;
        });

        Ok(ExecutionTicket {
            task_id,
            execution_id,
            strategy: resolution.strategy,
            model,
        })
    }

    /// Cancel a task.
    ///
    /// An execution in flight is signalled through its cancellation token and
    /// stops at its next model-call boundary; a task with nothing in flight
    /// moves straight to `Cancelled`.
    pub async fn cancel(
        &self,
        task_id: TaskId,
        reason: Option<String>,
    ) -> Result<(), CoordinatorError> {
        let reason = reason.unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());
        // Workers settle an execution and drop its in-flight entry under the
        // write lock, so an entry seen here has not been settled yet.
        let task = {
            let _guard = self.inner.write_lock.lock().await;
            {
                let mut in_flight = self
                    .inner
                    .in_flight
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if let Some(entry) = in_flight.get_mut(&task_id) {
                    info!(task_id = %task_id, execution_id = %entry.execution_id, "Cancellation requested");
                    entry.reason.get_or_insert(reason);
                    entry.cancel.cancel();
                    return Ok(());
                }
            }
            let mut task = self.inner.load(task_id).await?;
            task.cancel(Utc::now())?;
            self.inner.tasks.save(&task).await?;
            task
        };
        info!(task_id = %task_id, "Task cancelled");
        self.inner.emit(TaskCancelledEvent::new(&task, reason)).await;
        Ok(())
    }

    /// Follow the log of the task's latest execution.
    pub async fn logs(&self, task_id: TaskId) -> Result<LogSubscription, CoordinatorError> {
        let task = self.inner.load(task_id).await?;
        let execution = task.latest_execution().ok_or_else(|| {
            CoordinatorError::NotFound(DomainError::not_found("execution of task", task_id))
        })?;
        self.inner.logs.subscribe(execution.id).ok_or_else(|| {
            CoordinatorError::NotFound(DomainError::not_found("execution log", execution.id))
        })
    }

    /// Executions currently queued or running.
    pub fn in_flight(&self) -> usize {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stop accepting executions and wait for queued and running ones.
    pub async fn shutdown(&self) {
        info!(in_flight = self.in_flight(), "Coordinator shutting down");
        self.inner.pool.shutdown().await;
    }
}

impl Inner {
    async fn load(&self, task_id: TaskId) -> Result<CodingTask, CoordinatorError> {
        self.tasks
            .get(task_id)
            .await?
            .ok_or_else(|| CoordinatorError::task_not_found(task_id))
    }

    async fn resolve_strategy(
        &self,
        task: &CodingTask,
        requested: Option<ExecutionStrategy>,
    ) -> Resolution {
        if let Some(strategy) = requested {
            return Resolution {
                strategy,
                classification: None,
                fallback: None,
            };
        }
        if let Some(complexity) = task.complexity() {
            return Resolution {
                strategy: complexity.default_strategy(),
                classification: None,
                fallback: None,
            };
        }

        match self.classifier.classify(task.description()).await {
            Ok(classification) => Resolution {
                strategy: classification.complexity.default_strategy(),
                classification: Some(classification),
                fallback: None,
            },
            Err(e) => {
                warn!(
                    task_id = %task.id(),
                    error = %e,
                    "Classification failed; falling back to medium complexity"
                );
                Resolution {
                    strategy: TaskComplexity::Medium.default_strategy(),
                    classification: None,
                    fallback: Some(TaskComplexity::Medium),
                }
            }
        }
    }

    async fn emit(&self, event: impl Into<DomainEvent>) {
        let event = event.into();
        let event_id = event.event_id();
        let event_type = event.event_type();
        let task_id = event.task_id();
        match self.publisher.publish(event).await {
            Ok(PublishOutcome::Delivered { .. }) => {}
            Ok(PublishOutcome::DeadLettered { attempts, reason }) => {
                warn!(%event_id, event_type, %task_id, attempts, reason = %reason, "Event dead-lettered");
            }
            Err(e) => {
                error!(%event_id, event_type, %task_id, error = %e, "Event publish failed");
            }
        }
    }

    fn cancel_token(&self, task_id: TaskId) -> CancellationToken {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&task_id)
            .map(|entry| entry.cancel.clone())
            .unwrap_or_default()
    }

    /// Drop the in-flight entry of this execution. A newer execution of the
    /// same task may already have replaced it.
    fn release(&self, task_id: TaskId, execution_id: ExecutionId) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight
            .get(&task_id)
            .is_some_and(|entry| entry.execution_id == execution_id)
        {
            in_flight.remove(&task_id);
        }
    }

    fn cancel_reason(&self, task_id: TaskId) -> String {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&task_id)
            .and_then(|entry| entry.reason.clone())
            .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string())
    }

    /// Worker body. Never panics on execution errors: anything that goes
    /// wrong is recorded on the execution or logged.
    async fn run(&self, task_id: TaskId, execution_id: ExecutionId, log: ExecutionLogWriter) {
        if let Err(e) = self.run_execution(task_id, execution_id, &log).await {
            error!(
                task_id = %task_id,
                execution_id = %execution_id,
                error = %e,
                "Execution bookkeeping failed"
            );
            log.line(format!("Internal error: {}", e));
        }
        log.close();
        self.release(task_id, execution_id);
    }

    async fn run_execution(
        &self,
        task_id: TaskId,
        execution_id: ExecutionId,
        log: &ExecutionLogWriter,
    ) -> Result<(), CoordinatorError> {
        let cancel = self.cancel_token(task_id);

        // Queued → Running, unless cancelled while waiting for a slot
        let (task, execution) = {
            let _guard = self.write_lock.lock().await;
            let mut task = self.load(task_id).await?;
            if cancel.is_cancelled() {
                task.cancel_execution(execution_id, ExecutionResult::default(), Utc::now())?;
                self.tasks.save(&task).await?;
                let reason = self.cancel_reason(task_id);
                self.release(task_id, execution_id);
                drop(_guard);
                log.line("Cancelled before start");
                self.emit(TaskCancelledEvent::new(&task, reason)).await;
                return Ok(());
            }
            task.mark_execution_running(execution_id, Utc::now())?;
            self.tasks.save(&task).await?;
            let execution = task
                .execution(execution_id)
                .cloned()
                .ok_or_else(|| DomainError::not_found("execution", execution_id))?;
            (task, execution)
        };
        self.emit(TaskStartedEvent::new(&task, &execution)).await;
        log.line("Running");

        let strategy = execution.strategy;
        let ctx = ExecutionContext::new(execution_id, strategy, execution.model.clone(), log.clone());
        let timeout = self.config.strategy.timeout_for(strategy);
        let outcome = match self.strategies.get(strategy) {
            Some(runner) => {
                match tokio::time::timeout(timeout, runner.execute(&task, &ctx, &cancel)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(StrategyError::Timeout(timeout)),
                }
            }
            None => Err(StrategyError::StepFailed {
                step: "dispatch".to_string(),
                reason: format!("no runner for strategy {}", strategy),
            }),
        };

        let partial = ExecutionResult::new(ctx.usage.snapshot());
        let _guard = self.write_lock.lock().await;
        let outcome = match outcome {
            // the last call finished after a cancellation request
            Ok(_) if cancel.is_cancelled() => Err(StrategyError::Cancelled),
            other => other,
        };
        let mut task = self.load(task_id).await?;
        let event: DomainEvent = match outcome {
            Ok(result) => {
                task.complete_execution(execution_id, result, Utc::now())?;
                self.tasks.save(&task).await?;
                info!(
                    task_id = %task_id,
                    execution_id = %execution_id,
                    tokens = partial.tokens_used,
                    "Execution completed"
                );
                log.line("Completed");
                TaskCompletedEvent::new(&task, self.execution(&task, execution_id)?).into()
            }
            Err(StrategyError::Cancelled) => {
                task.cancel_execution(execution_id, partial, Utc::now())?;
                self.tasks.save(&task).await?;
                info!(task_id = %task_id, execution_id = %execution_id, "Execution cancelled");
                log.line("Cancelled");
                TaskCancelledEvent::new(&task, self.cancel_reason(task_id)).into()
            }
            Err(e) => {
                task.fail_execution(execution_id, e.to_string(), partial, Utc::now())?;
                self.tasks.save(&task).await?;
                warn!(task_id = %task_id, execution_id = %execution_id, error = %e, "Execution failed");
                log.line(format!("Failed: {}", e));
                TaskFailedEvent::new(&task, self.execution(&task, execution_id)?).into()
            }
        };
        self.release(task_id, execution_id);
        drop(_guard);
        self.emit(event).await;
        Ok(())
    }

    fn execution<'a>(
        &self,
        task: &'a CodingTask,
        execution_id: ExecutionId,
    ) -> Result<&'a TaskExecution, CoordinatorError> {
        task.execution(execution_id)
            .ok_or_else(|| CoordinatorError::NotFound(DomainError::not_found("execution", execution_id)))
    }
}

impl std::fmt::Debug for ExecutionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionCoordinator")
            .field("pool", &self.inner.pool)
            .field("strategies", &self.inner.strategies)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}
