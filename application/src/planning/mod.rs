//! Planning service
//!
//! Decomposes a goal into a dependency-ordered [`Plan`] and owns the live
//! plans while they execute. All plan mutation goes through this service so
//! concurrent steps never race on step status.

use crate::config::StrategyConfig;
use crate::ports::episode_memory::{EpisodeMemory, NoEpisodeMemory};
use crate::ports::llm_client::{LlmClient, LlmError, LlmRequest};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use taskforge_domain::{
    DomainError, EffortTier, Plan, PlanFeedback, PlanId, PlanProgress, PlanStep, StepId,
    StepResult, TaskPromptTemplate, Usage, parse_plan,
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanningError {
    #[error("Planner call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Plan not found: {0}")]
    NotFound(PlanId),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// A plan together with the usage spent producing it.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: Plan,
    pub usage: Usage,
}

pub struct PlanningService {
    llm: Arc<dyn LlmClient>,
    memory: Arc<dyn EpisodeMemory>,
    plans: RwLock<HashMap<PlanId, Plan>>,
    config: StrategyConfig,
}

impl PlanningService {
    pub fn new(llm: Arc<dyn LlmClient>, config: StrategyConfig) -> Self {
        Self {
            llm,
            memory: Arc::new(NoEpisodeMemory),
            plans: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn EpisodeMemory>) -> Self {
        self.memory = memory;
        self
    }

    fn request(&self, model: &str, user: String) -> LlmRequest {
        LlmRequest::new(model)
            .with_system(TaskPromptTemplate::planning_system())
            .with_user(user)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
    }

    /// Ask the planner for a plan and register it.
    ///
    /// Only a failed model call is an error; an unusable answer becomes a
    /// single-step plan of the goal.
    pub async fn create_plan(
        &self,
        goal: &str,
        context: &str,
        tier: EffortTier,
        model: &str,
    ) -> Result<PlanOutcome, PlanningError> {
        let episodes = self
            .memory
            .similar_episodes(goal, self.config.episode_limit)
            .await;
        let prompt = TaskPromptTemplate::planning(goal, context, &episodes, tier);
        let response = self.llm.generate(self.request(model, prompt)).await?;

        let plan = parse_plan(goal, &response.content);
        if plan.steps.len() > tier.max_steps() {
            warn!(
                plan_id = %plan.id,
                steps = plan.steps.len(),
                tier = %tier,
                "Planner exceeded the step budget of its tier"
            );
        }
        info!(
            plan_id = %plan.id,
            steps = plan.steps.len(),
            episodes = episodes.len(),
            "Plan created"
        );

        self.write().insert(plan.id, plan.clone());
        Ok(PlanOutcome {
            plan,
            usage: response.usage(),
        })
    }

    /// Re-plan after a failure. Completed steps survive unchanged.
    pub async fn refine_plan(
        &self,
        plan_id: PlanId,
        feedback: &PlanFeedback,
        model: &str,
    ) -> Result<PlanOutcome, PlanningError> {
        let current = self.plan(plan_id)?;
        let prompt = TaskPromptTemplate::refine_plan(&current, feedback);
        let response = self.llm.generate(self.request(model, prompt)).await?;
        let refined = parse_plan(&current.goal, &response.content);

        let plan = self.update(plan_id, |plan| {
            plan.merge_refinement(refined);
            Ok(plan.clone())
        })?;
        info!(
            plan_id = %plan_id,
            reason = %feedback.reason,
            steps = plan.steps.len(),
            "Plan refined"
        );
        Ok(PlanOutcome {
            plan,
            usage: response.usage(),
        })
    }

    /// Lowest-ordered pending step whose dependencies are all completed.
    pub fn get_next_step(&self, plan_id: PlanId) -> Result<PlanStep, PlanningError> {
        let plans = self.read();
        let plan = plans.get(&plan_id).ok_or(PlanningError::NotFound(plan_id))?;
        Ok(plan.next_step()?.clone())
    }

    /// Atomically pick the next eligible step and mark it in progress.
    ///
    /// Returns the step with a snapshot of the plan taken at claim time, or
    /// `None` when nothing is eligible right now.
    pub fn claim_next_step(
        &self,
        plan_id: PlanId,
    ) -> Result<Option<(PlanStep, Plan)>, PlanningError> {
        self.update(plan_id, |plan| {
            let Ok(step) = plan.next_step() else {
                return Ok(None);
            };
            let id = step.id.clone();
            plan.start_step(&id)?;
            let step = plan.step(&id).cloned().ok_or_else(|| {
                DomainError::not_found("plan step", &id)
            })?;
            Ok(Some((step, plan.clone())))
        })
    }

    pub fn start_step(&self, plan_id: PlanId, step: &StepId) -> Result<(), PlanningError> {
        self.update(plan_id, |plan| Ok(plan.start_step(step)?))
    }

    pub fn record_step_result(
        &self,
        plan_id: PlanId,
        step: &StepId,
        result: StepResult,
    ) -> Result<(), PlanningError> {
        self.update(plan_id, |plan| Ok(plan.complete_step(step, result)?))
    }

    /// Fail a step; returns the dependents that were skipped.
    pub fn record_step_failure(
        &self,
        plan_id: PlanId,
        step: &StepId,
        result: StepResult,
    ) -> Result<Vec<StepId>, PlanningError> {
        let skipped = self.update(plan_id, |plan| Ok(plan.fail_step(step, result)?))?;
        if !skipped.is_empty() {
            info!(plan_id = %plan_id, step = %step, skipped = skipped.len(), "Skipped dependents of failed step");
        }
        Ok(skipped)
    }

    pub fn progress(&self, plan_id: PlanId) -> Result<PlanProgress, PlanningError> {
        let plans = self.read();
        let plan = plans.get(&plan_id).ok_or(PlanningError::NotFound(plan_id))?;
        Ok(plan.progress())
    }

    pub fn plan(&self, plan_id: PlanId) -> Result<Plan, PlanningError> {
        self.read()
            .get(&plan_id)
            .cloned()
            .ok_or(PlanningError::NotFound(plan_id))
    }

    pub fn abandon(&self, plan_id: PlanId) -> Result<Plan, PlanningError> {
        self.update(plan_id, |plan| {
            plan.abandon();
            Ok(plan.clone())
        })
    }

    /// Forget a plan once its execution is over.
    pub fn remove(&self, plan_id: PlanId) -> Option<Plan> {
        self.write().remove(&plan_id)
    }

    fn update<T>(
        &self,
        plan_id: PlanId,
        f: impl FnOnce(&mut Plan) -> Result<T, PlanningError>,
    ) -> Result<T, PlanningError> {
        let mut plans = self.write();
        let plan = plans
            .get_mut(&plan_id)
            .ok_or(PlanningError::NotFound(plan_id))?;
        f(plan)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<PlanId, Plan>> {
        self.plans.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<PlanId, Plan>> {
        self.plans.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PlanningService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanningService")
            .field("plans", &self.read().len())
            .finish_non_exhaustive()
    }
}
