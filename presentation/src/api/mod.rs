//! Task REST contract
//!
//! [`TaskApi`] maps each endpoint of the task API onto the execution
//! coordinator and translates the outcome into an [`ApiResponse`]. It owns
//! no transport: an HTTP server only has to route requests here and write
//! the status, headers and body back out.
//!
//! | Endpoint | Method |
//! |----------|--------|
//! | `GET /tasks` | [`TaskApi::list_tasks`] |
//! | `GET /tasks/{id}` | [`TaskApi::get_task`] |
//! | `POST /tasks` | [`TaskApi::create_task`] |
//! | `PUT /tasks/{id}` | [`TaskApi::update_task`] |
//! | `DELETE /tasks/{id}` | [`TaskApi::delete_task`] |
//! | `POST /tasks/{id}/execute` | [`TaskApi::execute_task`] |
//! | `POST /tasks/{id}/cancel` | [`TaskApi::cancel_task`] |
//! | `GET /tasks/{id}/executions` | [`TaskApi::list_executions`] |
//! | `GET /tasks/{id}/logs` | [`TaskApi::logs`] |

pub mod dto;
pub mod pagination;
pub mod response;

pub use dto::{
    CreateTaskRequest, ExecuteTaskRequest, ExecutionAcceptedDto, ExecutionDto, ListTasksQuery,
    TaskDto, UpdateTaskRequest,
};
pub use response::{ApiResponse, Operation, error_response};

use crate::sse::{DEFAULT_KEEPALIVE, SSE_HEADERS, event_stream};
use futures::Stream;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;
use taskforge_application::{
    CoordinatorError, DEFAULT_PAGE_SIZE, ExecuteRequest, ExecutionCoordinator, NewTask, TaskQuery,
};
use taskforge_domain::{
    DomainError, ExecutionStrategy, TaskChanges, TaskId, TaskStatus, TaskType, UserId,
};
use tracing::debug;

/// A stream of ready-to-write SSE frames.
pub type FrameStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Headers plus frames of a `GET /tasks/{id}/logs` response.
pub struct LogStreamResponse {
    pub headers: Vec<(String, String)>,
    pub frames: FrameStream,
}

impl std::fmt::Debug for LogStreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStreamResponse")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

fn bad_request(field: &'static str, message: impl Into<String>) -> ApiResponse {
    error_response(
        Operation::Read,
        &CoordinatorError::from(DomainError::invalid(field, message)),
    )
}

fn parse_field<T: FromStr<Err = String>>(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<T>, ApiResponse> {
    value
        .map(|v| T::from_str(v).map_err(|e| bad_request(field, e)))
        .transpose()
}

fn parse_task_id(id: &str) -> Result<TaskId, ApiResponse> {
    id.parse::<TaskId>()
        .map_err(|_| bad_request("id", format!("not a task id: {}", id)))
}

pub struct TaskApi {
    coordinator: ExecutionCoordinator,
    base_path: String,
    keepalive: Duration,
}

impl TaskApi {
    pub fn new(coordinator: ExecutionCoordinator) -> Self {
        Self {
            coordinator,
            base_path: "/tasks".to_string(),
            keepalive: DEFAULT_KEEPALIVE,
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }

    fn location(&self, task_id: TaskId) -> String {
        format!("{}/{}", self.base_path, task_id)
    }

    /// `GET /tasks`, optionally scoped to one user.
    pub async fn list_tasks(&self, user_id: Option<UserId>, query: ListTasksQuery) -> ApiResponse {
        let status = match parse_field::<TaskStatus>("status", query.status.as_deref()) {
            Ok(s) => s,
            Err(response) => return response,
        };
        let task_type = match parse_field::<TaskType>("type", query.task_type.as_deref()) {
            Ok(t) => t,
            Err(response) => return response,
        };

        let task_query = TaskQuery {
            user_id,
            status,
            task_type,
            ..TaskQuery::default()
        }
        .with_page(
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(DEFAULT_PAGE_SIZE),
        );

        match self.coordinator.list_tasks(&task_query).await {
            Ok(page) => {
                let items: Vec<TaskDto> = page.items.iter().map(TaskDto::from).collect();
                pagination::with_pagination(
                    ApiResponse::json(response::OK, &items),
                    &self.base_path,
                    &task_query,
                    &page,
                )
            }
            Err(e) => error_response(Operation::Read, &e),
        }
    }

    /// `GET /tasks/{id}`
    pub async fn get_task(&self, id: &str) -> ApiResponse {
        let task_id = match parse_task_id(id) {
            Ok(id) => id,
            Err(response) => return response,
        };
        match self.coordinator.get_task(task_id).await {
            Ok(task) => ApiResponse::json(response::OK, &TaskDto::from(&task)),
            Err(e) => error_response(Operation::Read, &e),
        }
    }

    /// `POST /tasks` → `201 Created` with `Location`.
    pub async fn create_task(&self, user_id: UserId, request: CreateTaskRequest) -> ApiResponse {
        let task_type = match parse_field::<TaskType>("taskType", request.task_type.as_deref()) {
            Ok(t) => t.unwrap_or_default(),
            Err(response) => return response,
        };
        let new = NewTask::new(user_id, request.title, request.description).with_task_type(task_type);

        match self.coordinator.create_task(new).await {
            Ok(task) => ApiResponse::json(response::CREATED, &TaskDto::from(&task))
                .with_header("Location", self.location(task.id())),
            Err(e) => error_response(Operation::Create, &e),
        }
    }

    /// `PUT /tasks/{id}`; `400` while the task is in progress.
    pub async fn update_task(&self, id: &str, request: UpdateTaskRequest) -> ApiResponse {
        let task_id = match parse_task_id(id) {
            Ok(id) => id,
            Err(response) => return response,
        };
        let task_type = match parse_field::<TaskType>("taskType", request.task_type.as_deref()) {
            Ok(t) => t,
            Err(response) => return response,
        };
        let changes = TaskChanges {
            title: request.title,
            description: request.description,
            task_type,
        };

        match self.coordinator.update_task(task_id, changes).await {
            Ok(task) => ApiResponse::json(response::OK, &TaskDto::from(&task)),
            Err(e) => error_response(Operation::Update, &e),
        }
    }

    /// `DELETE /tasks/{id}`; `400` while the task is in progress.
    pub async fn delete_task(&self, id: &str) -> ApiResponse {
        let task_id = match parse_task_id(id) {
            Ok(id) => id,
            Err(response) => return response,
        };
        match self.coordinator.delete_task(task_id).await {
            Ok(()) => ApiResponse::new(response::NO_CONTENT),
            Err(e) => error_response(Operation::Delete, &e),
        }
    }

    /// `POST /tasks/{id}/execute` → `202 Accepted`; `409` when already
    /// running, `429` with `Retry-After` when the quota is spent.
    pub async fn execute_task(&self, id: &str, request: ExecuteTaskRequest) -> ApiResponse {
        let task_id = match parse_task_id(id) {
            Ok(id) => id,
            Err(response) => return response,
        };
        let strategy =
            match parse_field::<ExecutionStrategy>("strategy", request.strategy.as_deref()) {
                Ok(s) => s,
                Err(response) => return response,
            };
        let execute = ExecuteRequest {
            strategy,
            model: request.model.filter(|m| !m.trim().is_empty()),
        };

        match self.coordinator.execute(task_id, execute).await {
            Ok(ticket) => {
                debug!(task_id = %task_id, execution_id = %ticket.execution_id, "Execution accepted");
                ApiResponse::json(
                    response::ACCEPTED,
                    &ExecutionAcceptedDto {
                        task_id: ticket.task_id.to_string(),
                        execution_id: ticket.execution_id.to_string(),
                        strategy: ticket.strategy.to_string(),
                        model: ticket.model,
                    },
                )
                .with_header("Location", format!("{}/executions", self.location(task_id)))
            }
            Err(e) => error_response(Operation::Execute, &e),
        }
    }

    /// `POST /tasks/{id}/cancel` → `202 Accepted`.
    pub async fn cancel_task(&self, id: &str, reason: Option<String>) -> ApiResponse {
        let task_id = match parse_task_id(id) {
            Ok(id) => id,
            Err(response) => return response,
        };
        match self.coordinator.cancel(task_id, reason).await {
            Ok(()) => ApiResponse::new(response::ACCEPTED),
            Err(e) => error_response(Operation::Cancel, &e),
        }
    }

    /// `GET /tasks/{id}/executions`, oldest first.
    pub async fn list_executions(&self, id: &str) -> ApiResponse {
        let task_id = match parse_task_id(id) {
            Ok(id) => id,
            Err(response) => return response,
        };
        match self.coordinator.list_executions(task_id).await {
            Ok(executions) => {
                let items: Vec<ExecutionDto> = executions.iter().map(ExecutionDto::from).collect();
                ApiResponse::json(response::OK, &items)
            }
            Err(e) => error_response(Operation::Read, &e),
        }
    }

    /// `GET /tasks/{id}/logs`: SSE frames of the latest execution's log.
    pub async fn logs(&self, id: &str) -> Result<LogStreamResponse, ApiResponse> {
        let task_id = parse_task_id(id)?;
        let subscription = self
            .coordinator
            .logs(task_id)
            .await
            .map_err(|e| error_response(Operation::Read, &e))?;

        Ok(LogStreamResponse {
            headers: SSE_HEADERS
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            frames: Box::pin(event_stream(subscription, self.keepalive)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::Arc;
    use taskforge_application::ports::llm_client::{LlmClient, LlmError, LlmRequest, LlmResponse};
    use taskforge_application::{
        CoordinatorConfig, PlanningService, RateLimitConfig, ReliableEventPublisher, RetryPolicy,
        StrategyRegistry,
    };
    use taskforge_infrastructure::{HeuristicClassifier, InMemoryMessageBus, InMemoryTaskStore};

    // ==================== Helper ====================

    struct FixedLlm {
        delay: Option<Duration>,
    }

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(LlmResponse::new(
                "```rust\nfn check(user: Option<&User>) {}\n```",
                42,
                0.01,
            ))
        }
    }

    fn api_with(config: CoordinatorConfig, delay: Option<Duration>) -> (TaskApi, Arc<InMemoryMessageBus>) {
        let store = Arc::new(InMemoryTaskStore::new());
        let bus = Arc::new(InMemoryMessageBus::new());
        let publisher = Arc::new(ReliableEventPublisher::new(bus.clone(), RetryPolicy::default()));
        let llm: Arc<dyn LlmClient> = Arc::new(FixedLlm { delay });
        let planning = Arc::new(PlanningService::new(
            Arc::clone(&llm),
            config.strategy.clone(),
        ));
        let strategies = StrategyRegistry::standard(llm, planning, &config.strategy);
        let coordinator = ExecutionCoordinator::new(
            store.clone(),
            store,
            Arc::new(HeuristicClassifier::new()),
            publisher,
            strategies,
            config,
        );
        (TaskApi::new(coordinator), bus)
    }

    fn api() -> (TaskApi, Arc<InMemoryMessageBus>) {
        api_with(CoordinatorConfig::default(), None)
    }

    fn create_request(title: &str, description: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            title: title.to_string(),
            description: description.to_string(),
            task_type: None,
        }
    }

    async fn create(api: &TaskApi, description: &str) -> String {
        let response = api
            .create_task("alice".into(), create_request("Login fix", description))
            .await;
        assert_eq!(response.status, 201);
        response.body.unwrap()["id"].as_str().unwrap().to_string()
    }

    // ==================== Tests ====================

    #[tokio::test]
    async fn test_create_returns_location() {
        let (api, _) = api();
        let response = api
            .create_task("alice".into(), create_request("Login fix", "Fix null pointer in login"))
            .await;

        assert_eq!(response.status, 201);
        let body = response.body.clone().unwrap();
        let id = body["id"].as_str().unwrap();
        assert_eq!(response.header("Location"), Some(format!("/tasks/{}", id).as_str()));
        assert_eq!(body["taskType"], "BugFix");
        assert_eq!(body["complexity"], "Simple");
    }

    #[tokio::test]
    async fn test_create_rejects_empty_fields() {
        let (api, _) = api();
        let response = api.create_task("alice".into(), create_request("", "")).await;
        assert_eq!(response.status, 400);
        assert_eq!(
            response.body.unwrap()["fieldErrors"].as_array().unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_get_distinguishes_malformed_and_unknown_ids() {
        let (api, _) = api();
        assert_eq!(api.get_task("not-a-uuid").await.status, 400);
        assert_eq!(api.get_task(&TaskId::generate().to_string()).await.status, 404);
    }

    #[tokio::test]
    async fn test_execute_then_stream_logs_to_completion() {
        let (api, bus) = api();
        let id = create(&api, "Fix null pointer in login").await;

        let response = api.execute_task(&id, ExecuteTaskRequest::default()).await;
        assert_eq!(response.status, 202);
        assert_eq!(response.body.as_ref().unwrap()["strategy"], "SingleShot");

        let logs = api.logs(&id).await.unwrap();
        assert!(logs
            .headers
            .iter()
            .any(|(n, v)| n == "Content-Type" && v == "text/event-stream"));
        let frames: Vec<String> = logs.frames.collect().await;
        assert_eq!(frames.last().map(String::as_str), Some("data: Completed\n\n"));

        let executions = api.list_executions(&id).await.body.unwrap();
        assert_eq!(executions[0]["status"], "Completed");
        assert_eq!(executions[0]["tokensUsed"], 42);
        assert_eq!(bus.sent_with_key("task.completed").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_progress_task_conflicts_per_operation() {
        let (api, _) = api_with(CoordinatorConfig::default(), Some(Duration::from_secs(10)));
        let id = create(&api, "Fix null pointer in login").await;

        assert_eq!(api.execute_task(&id, ExecuteTaskRequest::default()).await.status, 202);
        assert_eq!(api.execute_task(&id, ExecuteTaskRequest::default()).await.status, 409);
        assert_eq!(
            api.update_task(
                &id,
                UpdateTaskRequest {
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                }
            )
            .await
            .status,
            400
        );
        assert_eq!(api.delete_task(&id).await.status, 400);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_returns_429_with_retry_after() {
        let config = CoordinatorConfig::default()
            .with_rate_limit(RateLimitConfig::new(1, Duration::from_secs(3600)));
        let (api, _) = api_with(config, Some(Duration::from_secs(10)));
        let first = create(&api, "Fix null pointer in login").await;
        let second = create(&api, "Fix typo in footer").await;

        assert_eq!(api.execute_task(&first, ExecuteTaskRequest::default()).await.status, 202);
        let refused = api.execute_task(&second, ExecuteTaskRequest::default()).await;
        assert_eq!(refused.status, 429);
        assert_eq!(refused.header("Retry-After"), Some("3600"));
    }

    #[tokio::test]
    async fn test_unknown_strategy_is_a_bad_request() {
        let (api, _) = api();
        let id = create(&api, "Fix null pointer in login").await;
        let response = api
            .execute_task(
                &id,
                ExecuteTaskRequest {
                    strategy: Some("telepathy".to_string()),
                    model: None,
                },
            )
            .await;
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn test_list_paginates_and_validates_filters() {
        let (api, _) = api();
        for _ in 0..3 {
            create(&api, "Fix null pointer in login").await;
        }

        let response = api
            .list_tasks(
                Some("alice".into()),
                ListTasksQuery {
                    page: Some(1),
                    per_page: Some(2),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.header("X-Total-Count"), Some("3"));
        assert_eq!(response.header("X-Total-Pages"), Some("2"));
        assert!(response.header("Link").unwrap().contains("rel=\"next\""));
        assert_eq!(response.body.unwrap().as_array().unwrap().len(), 2);

        let bad = api
            .list_tasks(
                None,
                ListTasksQuery {
                    status: Some("Sleeping".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(bad.status, 400);
    }

    #[tokio::test]
    async fn test_cancel_pending_task() {
        let (api, bus) = api();
        let id = create(&api, "Fix null pointer in login").await;
        assert_eq!(api.cancel_task(&id, None).await.status, 202);
        assert_eq!(api.get_task(&id).await.body.unwrap()["status"], "Cancelled");
        assert_eq!(api.cancel_task(&id, None).await.status, 409);
        assert_eq!(bus.sent_with_key("task.cancelled").len(), 1);
    }
}
