//! Iterative strategy: generate, self-critique, refine.

use super::context::generate_metered;
use super::single_shot::summarize;
use super::{ExecutionContext, ExecutionStrategyRunner, StrategyError};
use crate::config::StrategyConfig;
use crate::ports::llm_client::{LlmClient, LlmRequest};
use async_trait::async_trait;
use std::sync::Arc;
use taskforge_domain::{
    Artifact, CodingTask, ExecutionResult, ExecutionStrategy, TaskPromptTemplate, parse_critique,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Draft once, then alternate critique and refinement with the same model.
///
/// Stops at the first critique reporting no remaining issues, after
/// `max_refinements` refinement passes, or after `iterative_rounds`
/// critiques, whichever comes first.
pub struct IterativeStrategy {
    llm: Arc<dyn LlmClient>,
    config: StrategyConfig,
}

impl IterativeStrategy {
    pub fn new(llm: Arc<dyn LlmClient>, config: StrategyConfig) -> Self {
        Self { llm, config }
    }

    fn request(&self, ctx: &ExecutionContext, system: &str, user: String) -> LlmRequest {
        LlmRequest::new(&ctx.model)
            .with_system(system)
            .with_user(user)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
    }
}

#[async_trait]
impl ExecutionStrategyRunner for IterativeStrategy {
    fn kind(&self) -> ExecutionStrategy {
        ExecutionStrategy::Iterative
    }

    async fn execute(
        &self,
        task: &CodingTask,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, StrategyError> {
        let rounds = self.config.iterative_rounds.max(1);
        info!(
            task_id = %task.id(),
            execution_id = %ctx.execution_id,
            rounds,
            max_refinements = self.config.max_refinements,
            "Iterative execution"
        );

        ctx.log.line("Generating initial draft");
        let request = self.request(
            ctx,
            TaskPromptTemplate::coder_system(),
            TaskPromptTemplate::single_shot(task),
        );
        let mut draft = generate_metered(self.llm.as_ref(), request, &ctx.usage, cancel)
            .await?
            .content;

        let mut refinements = 0;
        let mut open_issues = Vec::new();
        let mut converged = false;

        for round in 1..=rounds {
            ctx.log.line(format!("Round {}/{}: critiquing draft", round, rounds));
            let request = self.request(
                ctx,
                TaskPromptTemplate::critique_system(),
                TaskPromptTemplate::critique(task, &draft),
            );
            let response = generate_metered(self.llm.as_ref(), request, &ctx.usage, cancel).await?;
            let critique = parse_critique(&response.content);

            if !critique.issues_remain {
                debug!(round, "Critique reports no remaining issues");
                ctx.log.line(format!("Round {}: no issues remain", round));
                open_issues.clear();
                converged = true;
                break;
            }

            open_issues = critique.issues;
            ctx.log.line(format!(
                "Round {}: {} issue(s) found",
                round,
                open_issues.len()
            ));

            if refinements >= self.config.max_refinements || round == rounds {
                break;
            }

            ctx.log.line(format!("Round {}: refining draft", round));
            let request = self.request(
                ctx,
                TaskPromptTemplate::coder_system(),
                TaskPromptTemplate::refine(task, &draft, &open_issues),
            );
            draft = generate_metered(self.llm.as_ref(), request, &ctx.usage, cancel)
                .await?
                .content;
            refinements += 1;
        }

        let summary = if converged {
            format!("Converged after {} refinement(s): {}", refinements, summarize(&draft))
        } else if open_issues.is_empty() {
            format!(
                "Stopped after {} refinement(s); critique still reports issues",
                refinements
            )
        } else {
            format!(
                "Stopped after {} refinement(s) with {} open issue(s)",
                refinements,
                open_issues.len()
            )
        };
        ctx.log.line(summary.clone());

        Ok(ExecutionResult::new(ctx.usage.snapshot())
            .with_summary(summary)
            .with_suggestions(open_issues)
            .with_artifact(Artifact::from_output("solution", draft)))
    }
}
