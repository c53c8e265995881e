//! Strategy configuration from TOML (`[strategy]` section)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use taskforge_application::StrategyConfig;
use taskforge_domain::ExecutionStrategy;

/// Raw strategy configuration from TOML
///
/// Timeouts are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStrategyConfig {
    pub iterative_rounds: u32,
    pub max_refinements: u32,
    pub multi_agent_parallel_steps: usize,
    pub hybrid_parallel_steps: usize,
    pub max_plan_refinements: u32,
    pub single_shot_timeout: u64,
    pub iterative_timeout: u64,
    pub multi_agent_timeout: u64,
    pub step_timeout: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub episode_limit: usize,
}

impl Default for FileStrategyConfig {
    fn default() -> Self {
        let d = StrategyConfig::default();
        Self {
            iterative_rounds: d.iterative_rounds,
            max_refinements: d.max_refinements,
            multi_agent_parallel_steps: d.multi_agent_parallel_steps,
            hybrid_parallel_steps: d.hybrid_parallel_steps,
            max_plan_refinements: d.max_plan_refinements,
            single_shot_timeout: d.single_shot_timeout.as_secs(),
            iterative_timeout: d.iterative_timeout.as_secs(),
            multi_agent_timeout: d.multi_agent_timeout.as_secs(),
            step_timeout: d.step_timeout.as_secs(),
            temperature: d.temperature,
            max_tokens: d.max_tokens,
            episode_limit: d.episode_limit,
        }
    }
}

impl FileStrategyConfig {
    pub fn to_strategy_config(&self) -> StrategyConfig {
        StrategyConfig::default()
            .with_iterative_rounds(self.iterative_rounds)
            .with_max_refinements(self.max_refinements)
            .with_parallel_steps(self.multi_agent_parallel_steps, self.hybrid_parallel_steps)
            .with_max_plan_refinements(self.max_plan_refinements)
            .with_timeout(
                ExecutionStrategy::SingleShot,
                Duration::from_secs(self.single_shot_timeout),
            )
            .with_timeout(
                ExecutionStrategy::Iterative,
                Duration::from_secs(self.iterative_timeout),
            )
            .with_timeout(
                ExecutionStrategy::MultiAgent,
                Duration::from_secs(self.multi_agent_timeout),
            )
            .with_step_timeout(Duration::from_secs(self.step_timeout))
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_episode_limit(self.episode_limit)
    }

    /// `(field, value)` of every timeout, for validation.
    pub(super) fn timeouts(&self) -> [(&'static str, u64); 4] {
        [
            ("strategy.single_shot_timeout", self.single_shot_timeout),
            ("strategy.iterative_timeout", self.iterative_timeout),
            ("strategy.multi_agent_timeout", self.multi_agent_timeout),
            ("strategy.step_timeout", self.step_timeout),
        ]
    }
}
