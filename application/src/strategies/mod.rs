//! Execution strategies
//!
//! One [`ExecutionStrategyRunner`] per [`ExecutionStrategy`] variant, chosen at
//! runtime through the [`StrategyRegistry`]. Strategies only depend on the
//! LLM client port and, for plan-based variants, the planning service.
//!
//! | Strategy | Model calls |
//! |----------|-------------|
//! | SingleShot | exactly one |
//! | Iterative | draft, then critique / refine rounds |
//! | MultiAgent | planner, then coder + reviewer per step |
//! | HybridExecution | MultiAgent at the highest effort tier, wider parallelism |

pub mod context;
pub mod iterative;
pub mod multi_agent;
pub mod reviewer;
pub mod single_shot;

pub use context::{ExecutionContext, UsageMeter};
pub use iterative::IterativeStrategy;
pub use multi_agent::MultiAgentStrategy;
pub use reviewer::ReviewerAgent;
pub use single_shot::SingleShotStrategy;

use crate::config::StrategyConfig;
use crate::planning::{PlanningError, PlanningService};
use crate::ports::llm_client::{LlmClient, LlmError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use taskforge_domain::{CodingTask, EffortTier, ExecutionResult, ExecutionStrategy};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Strategy-internal failures. Always terminal for the current execution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cancelled")]
    Cancelled,

    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Plan deadlocked: {0}")]
    PlanDeadlock(String),

    #[error("Step {step} rejected by reviewer (severity {severity}): {issues}")]
    ReviewRejected {
        step: String,
        severity: u8,
        issues: String,
    },

    #[error("Step {step} failed: {reason}")]
    StepFailed { step: String, reason: String },
}

impl From<PlanningError> for StrategyError {
    fn from(error: PlanningError) -> Self {
        match error {
            PlanningError::Llm(e) => StrategyError::Llm(e),
            other => StrategyError::Planning(other.to_string()),
        }
    }
}

/// A pluggable execution algorithm.
#[async_trait]
pub trait ExecutionStrategyRunner: Send + Sync {
    fn kind(&self) -> ExecutionStrategy;

    /// Run the task to completion, checking `cancel` between model calls.
    async fn execute(
        &self,
        task: &CodingTask,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, StrategyError>;
}

/// Factory keyed by [`ExecutionStrategy`].
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    runners: HashMap<ExecutionStrategy, Arc<dyn ExecutionStrategyRunner>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All four strategies sharing one LLM client and planning service.
    pub fn standard(
        llm: Arc<dyn LlmClient>,
        planning: Arc<PlanningService>,
        config: &StrategyConfig,
    ) -> Self {
        let reviewer = ReviewerAgent::new(Arc::clone(&llm), config.temperature);
        Self::new()
            .with(Arc::new(SingleShotStrategy::new(
                Arc::clone(&llm),
                config.clone(),
            )))
            .with(Arc::new(IterativeStrategy::new(
                Arc::clone(&llm),
                config.clone(),
            )))
            .with(Arc::new(MultiAgentStrategy::new(
                ExecutionStrategy::MultiAgent,
                EffortTier::Medium,
                Arc::clone(&llm),
                Arc::clone(&planning),
                reviewer.clone(),
                config.clone(),
            )))
            .with(Arc::new(MultiAgentStrategy::new(
                ExecutionStrategy::HybridExecution,
                EffortTier::highest(),
                llm,
                planning,
                reviewer,
                config.clone(),
            )))
    }

    pub fn with(mut self, runner: Arc<dyn ExecutionStrategyRunner>) -> Self {
        self.runners.insert(runner.kind(), runner);
        self
    }

    pub fn get(&self, strategy: ExecutionStrategy) -> Option<Arc<dyn ExecutionStrategyRunner>> {
        self.runners.get(&strategy).cloned()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.runners.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("StrategyRegistry")
            .field("runners", &kinds)
            .finish()
    }
}
