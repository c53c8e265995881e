//! Repository ports
//!
//! Durable storage for task aggregates. A [`CodingTask`] is always loaded and
//! saved together with its executions, so one `save` is one logical
//! transaction covering the task row and every execution row.

use async_trait::async_trait;
use taskforge_domain::{
    CodingTask, ExecutionId, TaskExecution, TaskId, TaskStatus, TaskType, UserId,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("Duplicate id: {0}")]
    Duplicate(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Filter and paging for task listings. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub user_id: Option<UserId>,
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub page: u32,
    pub per_page: u32,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            status: None,
            task_type: None,
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TaskQuery {
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = Some(task_type);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<UserId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Page number and size clamped to valid bounds.
    pub fn with_page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page.max(1);
        self.per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.per_page as usize
    }

    pub fn matches(&self, task: &CodingTask) -> bool {
        self.user_id.as_ref().is_none_or(|u| task.user_id() == u)
            && self.status.is_none_or(|s| task.status() == s)
            && self.task_type.is_none_or(|t| task.task_type() == t)
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        self.total.div_ceil(self.per_page.max(1) as u64) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn insert(&self, task: &CodingTask) -> Result<(), RepositoryError>;

    /// Load a task together with its executions.
    async fn get(&self, id: TaskId) -> Result<Option<CodingTask>, RepositoryError>;

    /// Persist the task and all of its executions atomically.
    async fn save(&self, task: &CodingTask) -> Result<(), RepositoryError>;

    /// Returns `false` when no such task existed.
    async fn delete(&self, id: TaskId) -> Result<bool, RepositoryError>;

    /// Newest first.
    async fn list(&self, query: &TaskQuery) -> Result<Page<CodingTask>, RepositoryError>;
}

#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// Executions of a task, oldest first.
    async fn list_for_task(&self, task_id: TaskId) -> Result<Vec<TaskExecution>, RepositoryError>;

    async fn get_execution(
        &self,
        id: ExecutionId,
    ) -> Result<Option<TaskExecution>, RepositoryError>;
}
