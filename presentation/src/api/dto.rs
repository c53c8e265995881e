//! JSON bodies of the task API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskforge_domain::{Artifact, CodingTask, TaskExecution};

/// `POST /tasks` body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub task_type: Option<String>,
}

/// `PUT /tasks/{id}` body; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub task_type: Option<String>,
}

/// `POST /tasks/{id}/execute` body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteTaskRequest {
    pub strategy: Option<String>,
    pub model: Option<String>,
}

/// `GET /tasks` query string
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListTasksQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub task_type: String,
    pub complexity: Option<String>,
    pub status: String,
    pub classification_confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_count: usize,
}

impl From<&CodingTask> for TaskDto {
    fn from(task: &CodingTask) -> Self {
        Self {
            id: task.id().to_string(),
            user_id: task.user_id().to_string(),
            title: task.title().to_string(),
            description: task.description().to_string(),
            task_type: task.task_type().to_string(),
            complexity: task.complexity().map(|c| c.to_string()),
            status: task.status().to_string(),
            classification_confidence: task.classification().map(|c| c.confidence),
            created_at: task.created_at(),
            updated_at: task.updated_at(),
            started_at: task.started_at(),
            completed_at: task.completed_at(),
            execution_count: task.executions().len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDto {
    pub name: String,
    pub kind: String,
    pub content: String,
}

impl From<&Artifact> for ArtifactDto {
    fn from(artifact: &Artifact) -> Self {
        Self {
            name: artifact.name.clone(),
            kind: serde_json::to_value(artifact.kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            content: artifact.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDto {
    pub id: String,
    pub task_id: String,
    pub strategy: String,
    pub model: String,
    pub status: String,
    pub error_message: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub tokens_used: u64,
    pub cost_usd: f64,
    pub summary: String,
    pub artifacts: Vec<ArtifactDto>,
    pub suggestions: Vec<String>,
}

impl From<&TaskExecution> for ExecutionDto {
    fn from(execution: &TaskExecution) -> Self {
        Self {
            id: execution.id.to_string(),
            task_id: execution.task_id.to_string(),
            strategy: execution.strategy.to_string(),
            model: execution.model.clone(),
            status: execution.status.to_string(),
            error_message: execution.error_message.clone(),
            queued_at: execution.queued_at,
            started_at: execution.started_at,
            completed_at: execution.completed_at,
            duration_ms: execution.duration().map(|d| d.num_milliseconds()),
            tokens_used: execution.result.tokens_used,
            cost_usd: execution.result.cost_usd,
            summary: execution.result.summary.clone(),
            artifacts: execution.result.artifacts.iter().map(ArtifactDto::from).collect(),
            suggestions: execution.result.suggestions.clone(),
        }
    }
}

/// `202 Accepted` body of an execute request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionAcceptedDto {
    pub task_id: String,
    pub execution_id: String,
    pub strategy: String,
    pub model: String,
}
