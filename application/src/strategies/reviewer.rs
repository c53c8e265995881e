//! Reviewer agent: judges one plan step's output.

use super::StrategyError;
use super::context::{UsageMeter, generate_metered};
use crate::ports::llm_client::{LlmClient, LlmRequest};
use std::sync::Arc;
use taskforge_domain::{PlanStep, ReviewVerdict, TaskPromptTemplate, parse_review};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Clone)]
pub struct ReviewerAgent {
    llm: Arc<dyn LlmClient>,
    temperature: f32,
}

impl ReviewerAgent {
    pub fn new(llm: Arc<dyn LlmClient>, temperature: f32) -> Self {
        Self { llm, temperature }
    }

    /// Ask the model for a verdict on `output`. Unparseable answers fall back
    /// to keyword matching and never fail the call.
    pub async fn review(
        &self,
        step: &PlanStep,
        output: &str,
        model: &str,
        usage: &UsageMeter,
        cancel: &CancellationToken,
    ) -> Result<ReviewVerdict, StrategyError> {
        let request = LlmRequest::new(model)
            .with_system(TaskPromptTemplate::reviewer_system())
            .with_user(TaskPromptTemplate::reviewer_step(step, output))
            .with_temperature(self.temperature);
        let response = generate_metered(self.llm.as_ref(), request, usage, cancel).await?;
        let verdict = parse_review(&response.content);
        debug!(
            step = %step.id,
            approved = verdict.is_approved,
            severity = verdict.severity,
            "Review verdict"
        );
        Ok(verdict)
    }
}

impl std::fmt::Debug for ReviewerAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewerAgent")
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;

    #[tokio::test]
    async fn test_review_parses_json_verdict() {
        let llm = Arc::new(ScriptedLlm::texts(&[
            r#"{"isApproved": false, "issues": ["no tests"], "severity": 5}"#,
        ]));
        let reviewer = ReviewerAgent::new(llm, 0.2);
        let meter = UsageMeter::new();

        let verdict = reviewer
            .review(
                &PlanStep::new("step_1", "add cache"),
                "struct Cache;",
                "m",
                &meter,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(verdict.blocks());
        assert_eq!(verdict.issues, vec!["no tests"]);
        assert!(meter.snapshot().tokens_used > 0);
    }

    #[tokio::test]
    async fn test_review_skipped_when_cancelled() {
        let llm = Arc::new(ScriptedLlm::texts(&["APPROVE"]));
        let reviewer = ReviewerAgent::new(llm.clone(), 0.2);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = reviewer
            .review(
                &PlanStep::new("step_1", "x"),
                "",
                "m",
                &UsageMeter::new(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert_eq!(err, StrategyError::Cancelled);
        assert_eq!(llm.calls(), 0);
    }
}
