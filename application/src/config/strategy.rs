//! Strategy parameters: round budgets, parallelism and timeouts.

use std::time::Duration;
use taskforge_domain::ExecutionStrategy;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    /// Critique rounds of the iterative strategy.
    pub iterative_rounds: u32,
    /// Refinement passes of the iterative strategy.
    pub max_refinements: u32,
    pub multi_agent_parallel_steps: usize,
    pub hybrid_parallel_steps: usize,
    /// Re-plans allowed when a plan deadlocks.
    pub max_plan_refinements: u32,
    pub single_shot_timeout: Duration,
    pub iterative_timeout: Duration,
    /// Also used for hybrid execution.
    pub multi_agent_timeout: Duration,
    pub step_timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Past episodes embedded in planning prompts.
    pub episode_limit: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            iterative_rounds: 3,
            max_refinements: 2,
            multi_agent_parallel_steps: 2,
            hybrid_parallel_steps: 4,
            max_plan_refinements: 1,
            single_shot_timeout: Duration::from_secs(120),
            iterative_timeout: Duration::from_secs(600),
            multi_agent_timeout: Duration::from_secs(1800),
            step_timeout: Duration::from_secs(300),
            temperature: 0.2,
            max_tokens: 4096,
            episode_limit: 3,
        }
    }
}

impl StrategyConfig {
    /// Wall-clock budget for a whole strategy invocation.
    pub fn timeout_for(&self, strategy: ExecutionStrategy) -> Duration {
        match strategy {
            ExecutionStrategy::SingleShot => self.single_shot_timeout,
            ExecutionStrategy::Iterative => self.iterative_timeout,
            ExecutionStrategy::MultiAgent | ExecutionStrategy::HybridExecution => {
                self.multi_agent_timeout
            }
        }
    }

    /// Concurrent plan steps; `1` for strategies without a plan.
    pub fn parallel_steps_for(&self, strategy: ExecutionStrategy) -> usize {
        match strategy {
            ExecutionStrategy::MultiAgent => self.multi_agent_parallel_steps.max(1),
            ExecutionStrategy::HybridExecution => self.hybrid_parallel_steps.max(1),
            _ => 1,
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_iterative_rounds(mut self, rounds: u32) -> Self {
        self.iterative_rounds = rounds.max(1);
        self
    }

    pub fn with_max_refinements(mut self, refinements: u32) -> Self {
        self.max_refinements = refinements;
        self
    }

    pub fn with_parallel_steps(mut self, multi_agent: usize, hybrid: usize) -> Self {
        self.multi_agent_parallel_steps = multi_agent.max(1);
        self.hybrid_parallel_steps = hybrid.max(1);
        self
    }

    pub fn with_max_plan_refinements(mut self, refinements: u32) -> Self {
        self.max_plan_refinements = refinements;
        self
    }

    pub fn with_timeout(mut self, strategy: ExecutionStrategy, timeout: Duration) -> Self {
        match strategy {
            ExecutionStrategy::SingleShot => self.single_shot_timeout = timeout,
            ExecutionStrategy::Iterative => self.iterative_timeout = timeout,
            ExecutionStrategy::MultiAgent | ExecutionStrategy::HybridExecution => {
                self.multi_agent_timeout = timeout
            }
        }
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_episode_limit(mut self, limit: usize) -> Self {
        self.episode_limit = limit;
        self
    }
}
