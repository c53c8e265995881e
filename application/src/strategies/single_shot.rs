//! Single-shot strategy: exactly one model call.

use super::context::generate_metered;
use super::{ExecutionContext, ExecutionStrategyRunner, StrategyError};
use crate::config::StrategyConfig;
use crate::ports::llm_client::{LlmClient, LlmRequest};
use async_trait::async_trait;
use std::sync::Arc;
use taskforge_domain::{
    Artifact, CodingTask, ExecutionResult, ExecutionStrategy, TaskPromptTemplate,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One model invocation with the task description as prompt. A failed call
/// fails the execution; retries are the coordinator's business.
pub struct SingleShotStrategy {
    llm: Arc<dyn LlmClient>,
    config: StrategyConfig,
}

impl SingleShotStrategy {
    pub fn new(llm: Arc<dyn LlmClient>, config: StrategyConfig) -> Self {
        Self { llm, config }
    }
}

#[async_trait]
impl ExecutionStrategyRunner for SingleShotStrategy {
    fn kind(&self) -> ExecutionStrategy {
        ExecutionStrategy::SingleShot
    }

    async fn execute(
        &self,
        task: &CodingTask,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, StrategyError> {
        info!(task_id = %task.id(), execution_id = %ctx.execution_id, "Single-shot execution");
        ctx.log.line(format!("Generating solution with {}", ctx.model));

        let request = LlmRequest::new(&ctx.model)
            .with_system(TaskPromptTemplate::coder_system())
            .with_user(TaskPromptTemplate::single_shot(task))
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);
        let response = generate_metered(self.llm.as_ref(), request, &ctx.usage, cancel).await?;

        ctx.log.line(format!(
            "Solution generated ({} tokens)",
            response.tokens_used
        ));

        Ok(ExecutionResult::new(ctx.usage.snapshot())
            .with_summary(summarize(&response.content))
            .with_artifact(Artifact::from_output("solution", response.content)))
    }
}

/// First non-empty line, shortened.
pub(crate) fn summarize(content: &str) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("```"))
        .unwrap_or("");
    if line.chars().count() > 120 {
        let short: String = line.chars().take(117).collect();
        format!("{}...", short)
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::ExecutionLogHub;
    use crate::ports::llm_client::LlmError;
    use crate::testing::{ScriptedLlm, TOKENS_PER_CALL};
    use taskforge_domain::{ArtifactKind, ExecutionId, TaskType};

    fn ctx(hub: &ExecutionLogHub) -> ExecutionContext {
        let id = ExecutionId::generate();
        ExecutionContext::new(id, ExecutionStrategy::SingleShot, "test-model", hub.open(id))
    }

    fn task() -> CodingTask {
        CodingTask::new("u", "Fix login", "Fix null pointer in login", TaskType::BugFix).unwrap()
    }

    #[tokio::test]
    async fn test_exactly_one_call() {
        let llm = Arc::new(ScriptedLlm::texts(&["Patched.\n```rust\nfn login() {}\n```"]));
        let strategy = SingleShotStrategy::new(llm.clone(), StrategyConfig::default());
        let hub = ExecutionLogHub::new();
        let ctx = ctx(&hub);

        let result = strategy
            .execute(&task(), &ctx, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(llm.calls(), 1);
        assert_eq!(result.tokens_used, TOKENS_PER_CALL);
        assert_eq!(result.artifacts[0].kind, ArtifactKind::Code);
        assert_eq!(result.summary, "Patched.");
        assert!(
            llm.requests()[0]
                .last_user_message()
                .unwrap()
                .contains("Fix null pointer in login")
        );
        assert_eq!(hub.lines(ctx.execution_id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_call_is_terminal() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Err(LlmError::RequestFailed("500".into())),
            Ok("never used".into()),
        ]));
        let strategy = SingleShotStrategy::new(llm.clone(), StrategyConfig::default());
        let hub = ExecutionLogHub::new();

        let err = strategy
            .execute(&task(), &ctx(&hub), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, StrategyError::Llm(_)));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let llm = Arc::new(ScriptedLlm::texts(&["x"]));
        let strategy = SingleShotStrategy::new(llm.clone(), StrategyConfig::default());
        let hub = ExecutionLogHub::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = strategy.execute(&task(), &ctx(&hub), &cancel).await.unwrap_err();
        assert_eq!(err, StrategyError::Cancelled);
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn test_summarize_skips_fences() {
        assert_eq!(summarize("```rust\nfn a() {}\n```"), "fn a() {}");
        assert_eq!(summarize("").len(), 0);
    }
}
