//! In-memory task store
//!
//! Holds whole task aggregates (task plus executions) behind one lock, so a
//! `save` replaces the task and every execution row at once. Also serves as
//! episode memory by recalling completed tasks that share keywords with a
//! planning goal.

use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use taskforge_application::ports::episode_memory::EpisodeMemory;
use taskforge_application::ports::repository::{
    ExecutionRepository, Page, RepositoryError, TaskQuery, TaskRepository,
};
use taskforge_domain::{CodingTask, ExecutionId, TaskExecution, TaskId, TaskStatus};
use tokio::sync::RwLock;
use tracing::debug;

/// Words shorter than this never count as shared keywords.
const MIN_KEYWORD_LEN: usize = 4;

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, CodingTask>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= MIN_KEYWORD_LEN)
        .map(str::to_lowercase)
        .collect()
}

fn episode_summary(task: &CodingTask) -> String {
    let outcome = task
        .latest_execution()
        .map(|e| e.result.summary.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("completed");
    format!("{} ({}): {}", task.title(), task.task_type(), outcome)
}

#[async_trait]
impl TaskRepository for InMemoryTaskStore {
    async fn insert(&self, task: &CodingTask) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id()) {
            return Err(RepositoryError::Duplicate(task.id().to_string()));
        }
        tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Option<CodingTask>, RepositoryError> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn save(&self, task: &CodingTask) -> Result<(), RepositoryError> {
        self.tasks.write().await.insert(task.id(), task.clone());
        Ok(())
    }

    async fn delete(&self, id: TaskId) -> Result<bool, RepositoryError> {
        Ok(self.tasks.write().await.remove(&id).is_some())
    }

    async fn list(&self, query: &TaskQuery) -> Result<Page<CodingTask>, RepositoryError> {
        let tasks = self.tasks.read().await;
        let mut matching: Vec<&CodingTask> = tasks.values().filter(|t| query.matches(t)).collect();
        matching.sort_by_key(|t| (Reverse(t.created_at()), t.id()));

        Ok(Page {
            total: matching.len() as u64,
            items: matching
                .into_iter()
                .skip(query.offset())
                .take(query.per_page as usize)
                .cloned()
                .collect(),
            page: query.page,
            per_page: query.per_page,
        })
    }
}

#[async_trait]
impl ExecutionRepository for InMemoryTaskStore {
    async fn list_for_task(&self, task_id: TaskId) -> Result<Vec<TaskExecution>, RepositoryError> {
        Ok(self
            .tasks
            .read()
            .await
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
            .read()
            .await
            .values()
            .find_map(|t| t.execution(id).cloned()))
    }
}

#[async_trait]
impl EpisodeMemory for InMemoryTaskStore {
    async fn similar_episodes(&self, goal: &str, limit: usize) -> Vec<String> {
        let wanted = keywords(goal);
        if wanted.is_empty() || limit == 0 {
            return Vec::new();
        }

        let tasks = self.tasks.read().await;
        let mut scored: Vec<(usize, &CodingTask)> = tasks
            .values()
            .filter(|t| t.status() == TaskStatus::Completed)
            .map(|t| {
                let text = format!("{} {}", t.title(), t.description());
                (keywords(&text).intersection(&wanted).count(), t)
            })
            .filter(|(overlap, _)| *overlap > 0)
            .collect();
        scored.sort_by_key(|(overlap, t)| (Reverse(*overlap), Reverse(t.completed_at())));

        debug!(candidates = scored.len(), limit, "Episode recall");
        scored
            .into_iter()
            .take(limit)
            .map(|(_, t)| episode_summary(t))
            .collect()
    }
}
