//! Episode memory port
//!
//! Summaries of similar past work, embedded in planning prompts.

use async_trait::async_trait;

#[async_trait]
pub trait EpisodeMemory: Send + Sync {
    /// Up to `limit` one-line summaries of episodes similar to `goal`.
    async fn similar_episodes(&self, goal: &str, limit: usize) -> Vec<String>;
}

/// Memory that never recalls anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEpisodeMemory;

#[async_trait]
impl EpisodeMemory for NoEpisodeMemory {
    async fn similar_episodes(&self, _goal: &str, _limit: usize) -> Vec<String> {
        Vec::new()
    }
}
