//! Multi-agent strategy: planner, then coder and reviewer per step.
//!
//! The planner decomposes the task into a [`Plan`]. Every eligible step is
//! handed to a coder call followed by a reviewer call; independent steps run
//! concurrently up to the configured parallelism. A blocking review verdict
//! fails the step, skips its dependents and fails the execution once the
//! steps already running have finished.

use super::context::{UsageMeter, check_cancelled, generate_metered};
use super::reviewer::ReviewerAgent;
use super::{ExecutionContext, ExecutionStrategyRunner, StrategyError};
use crate::config::StrategyConfig;
use crate::logs::ExecutionLogWriter;
use crate::planning::PlanningService;
use crate::ports::llm_client::{LlmClient, LlmRequest};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use taskforge_domain::{
    Artifact, ArtifactKind, CodingTask, EffortTier, ExecutionResult, ExecutionStrategy, Plan,
    PlanFeedback, PlanId, PlanProgress, PlanStep, PlanStepStatus, ReviewVerdict, StepId,
    StepResult, TaskPromptTemplate, Usage,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct MultiAgentStrategy {
    kind: ExecutionStrategy,
    tier: EffortTier,
    llm: Arc<dyn LlmClient>,
    planning: Arc<PlanningService>,
    reviewer: ReviewerAgent,
    config: StrategyConfig,
}

/// Everything a spawned step needs, owned.
struct StepJob {
    llm: Arc<dyn LlmClient>,
    reviewer: ReviewerAgent,
    task: Arc<CodingTask>,
    plan: Plan,
    step: PlanStep,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    cancel: CancellationToken,
    log: ExecutionLogWriter,
}

/// Removes the plan from the planning service when dropped, including when
/// the run is abandoned mid-flight by an outer timeout.
struct PlanLease {
    planning: Arc<PlanningService>,
    plan_id: PlanId,
}

impl PlanLease {
    fn release(self) -> Option<Plan> {
        self.planning.remove(self.plan_id)
    }
}

impl Drop for PlanLease {
    fn drop(&mut self) {
        self.planning.remove(self.plan_id);
    }
}

struct StepReport {
    step: StepId,
    usage: Usage,
    outcome: Result<(String, ReviewVerdict), StrategyError>,
}

impl MultiAgentStrategy {
    pub fn new(
        kind: ExecutionStrategy,
        tier: EffortTier,
        llm: Arc<dyn LlmClient>,
        planning: Arc<PlanningService>,
        reviewer: ReviewerAgent,
        config: StrategyConfig,
    ) -> Self {
        Self {
            kind,
            tier,
            llm,
            planning,
            reviewer,
            config,
        }
    }

    async fn run_step(job: StepJob) -> StepReport {
        let meter = UsageMeter::new();
        let work = async {
            let request = LlmRequest::new(&job.model)
                .with_system(TaskPromptTemplate::coder_system())
                .with_user(TaskPromptTemplate::coder_step(&job.task, &job.plan, &job.step))
                .with_temperature(job.temperature)
                .with_max_tokens(job.max_tokens);
            let output = generate_metered(job.llm.as_ref(), request, &meter, &job.cancel)
                .await?
                .content;
            job.log.line(format!("Step {}: reviewing", job.step.id));
            let verdict = job
                .reviewer
                .review(&job.step, &output, &job.model, &meter, &job.cancel)
                .await?;
            Ok::<_, StrategyError>((output, verdict))
        };

        let outcome = match tokio::time::timeout(job.timeout, work).await {
            Ok(outcome) => outcome,
            Err(_) => Err(StrategyError::StepFailed {
                step: job.step.id.to_string(),
                reason: format!("timed out after {:?}", job.timeout),
            }),
        };
        StepReport {
            step: job.step.id,
            usage: meter.snapshot(),
            outcome,
        }
    }

    fn job(
        &self,
        task: &Arc<CodingTask>,
        plan: Plan,
        step: PlanStep,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> StepJob {
        StepJob {
            llm: Arc::clone(&self.llm),
            reviewer: self.reviewer.clone(),
            task: Arc::clone(task),
            plan,
            step,
            model: ctx.model.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            timeout: self.config.step_timeout,
            cancel: cancel.clone(),
            log: ctx.log.clone(),
        }
    }

    /// Schedule steps until the plan finishes or the first failure has
    /// drained every step in flight.
    async fn drive(
        &self,
        task: &CodingTask,
        plan_id: PlanId,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<(), StrategyError> {
        let task = Arc::new(task.clone());
        let parallel = self.config.parallel_steps_for(self.kind);
        let mut join_set = JoinSet::new();
        let mut refinements = 0;
        let mut failure: Option<StrategyError> = None;

        loop {
            if failure.is_none()
                && let Err(e) = check_cancelled(cancel)
            {
                info!(execution_id = %ctx.execution_id, "Cancellation requested, draining steps");
                failure = Some(e);
            }

            if failure.is_none() {
                while join_set.len() < parallel {
                    let Some((step, snapshot)) = self.planning.claim_next_step(plan_id)? else {
                        break;
                    };
                    ctx.log.line(format!("Step {}: {}", step.id, step.description));
                    join_set.spawn(Self::run_step(self.job(&task, snapshot, step, ctx, cancel)));
                }
            }

            let Some(joined) = join_set.join_next().await else {
                if let Some(error) = failure {
                    return Err(error);
                }
                match self.planning.progress(plan_id)? {
                    PlanProgress::Finished => return Ok(()),
                    PlanProgress::Ready => continue,
                    PlanProgress::Waiting => {
                        return Err(StrategyError::PlanDeadlock(
                            "steps in progress with no worker".to_string(),
                        ));
                    }
                    PlanProgress::Deadlocked => {
                        let pending = self.pending_steps(plan_id)?;
                        if refinements >= self.config.max_plan_refinements {
                            self.planning.abandon(plan_id)?;
                            return Err(StrategyError::PlanDeadlock(format!(
                                "pending steps can never start: {}",
                                pending
                            )));
                        }
                        refinements += 1;
                        warn!(plan_id = %plan_id, pending = %pending, "Plan deadlocked, refining");
                        ctx.log.line("Plan deadlocked; asking the planner to revise it");
                        let feedback = PlanFeedback::new(format!(
                            "Deadlock: steps {} wait on dependencies that can never complete",
                            pending
                        ));
                        let outcome = self
                            .planning
                            .refine_plan(plan_id, &feedback, &ctx.model)
                            .await?;
                        ctx.usage.record(outcome.usage);
                        continue;
                    }
                }
            };

            let report = match joined {
                Ok(report) => report,
                Err(e) => {
                    warn!("Step join error: {}", e);
                    failure.get_or_insert(StrategyError::StepFailed {
                        step: "unknown".to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            ctx.usage.record(report.usage);

            match report.outcome {
                Ok((output, verdict)) if verdict.blocks() => {
                    let error = StrategyError::ReviewRejected {
                        step: report.step.to_string(),
                        severity: verdict.severity,
                        issues: verdict.issues.join("; "),
                    };
                    warn!(step = %report.step, severity = verdict.severity, "Step rejected");
                    ctx.log.line(format!(
                        "Step {}: rejected (severity {})",
                        report.step, verdict.severity
                    ));
                    let result = StepResult::failure(error.to_string(), report.usage)
                        .with_output(output)
                        .with_review(verdict);
                    let skipped = self
                        .planning
                        .record_step_failure(plan_id, &report.step, result)?;
                    for id in skipped {
                        ctx.log.line(format!("Step {}: skipped", id));
                    }
                    failure.get_or_insert(error);
                }
                Ok((output, verdict)) => {
                    ctx.log.line(format!(
                        "Step {}: approved (severity {})",
                        report.step, verdict.severity
                    ));
                    let result = StepResult::success(output, verdict, report.usage);
                    self.planning
                        .record_step_result(plan_id, &report.step, result)?;
                }
                Err(error) => {
                    warn!(step = %report.step, error = %error, "Step failed");
                    ctx.log.line(format!("Step {}: failed: {}", report.step, error));
                    let result = StepResult::failure(error.to_string(), report.usage);
                    self.planning
                        .record_step_failure(plan_id, &report.step, result)?;
                    failure.get_or_insert(error);
                }
            }
        }
    }

    fn pending_steps(&self, plan_id: PlanId) -> Result<String, StrategyError> {
        let plan = self.planning.plan(plan_id)?;
        Ok(plan
            .steps
            .iter()
            .filter(|s| s.status == PlanStepStatus::Pending)
            .map(|s| s.id.as_str())
            .collect::<Vec<_>>()
            .join(", "))
    }

    fn build_result(&self, plan: &Plan, usage: Usage) -> ExecutionResult {
        let mut artifacts = Vec::new();
        let mut suggestions = Vec::new();
        for step in &plan.steps {
            let Some(result) = &step.result else {
                continue;
            };
            artifacts.push(Artifact::from_output(step.id.as_str(), result.output.as_str()));
            if let Some(review) = &result.review {
                suggestions.extend(review.suggestions.iter().cloned());
            }
        }
        let plan_json = serde_json::to_string_pretty(plan).unwrap_or_default();
        artifacts.push(Artifact::new("plan", ArtifactKind::Plan, plan_json));

        let (done, total) = plan.completion();
        let mut result = ExecutionResult::new(usage)
            .with_summary(format!("Completed {}/{} plan steps: {}", done, total, plan.goal))
            .with_suggestions(suggestions);
        result.artifacts = artifacts;
        result
    }
}

#[async_trait]
impl ExecutionStrategyRunner for MultiAgentStrategy {
    fn kind(&self) -> ExecutionStrategy {
        self.kind
    }

    async fn execute(
        &self,
        task: &CodingTask,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, StrategyError> {
        check_cancelled(cancel)?;
        info!(
            task_id = %task.id(),
            execution_id = %ctx.execution_id,
            strategy = %self.kind,
            tier = %self.tier,
            "Multi-agent execution"
        );

        ctx.log.line(format!("Planning at the {} tier", self.tier));
        let outcome = self
            .planning
            .create_plan(task.title(), task.description(), self.tier, &ctx.model)
            .await?;
        ctx.usage.record(outcome.usage);
        let plan_id = outcome.plan.id;
        let lease = PlanLease {
            planning: Arc::clone(&self.planning),
            plan_id,
        };
        ctx.log.line(format!("Plan has {} step(s)", outcome.plan.steps.len()));

        let driven = self.drive(task, plan_id, ctx, cancel).await;
        let plan = lease.release();
        driven?;

        let plan = plan.ok_or_else(|| StrategyError::Planning(format!("plan {} vanished", plan_id)))?;
        Ok(self.build_result(&plan, ctx.usage.snapshot()))
    }
}
