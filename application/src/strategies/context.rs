//! Per-execution context handed to strategies.

use super::StrategyError;
use crate::logs::ExecutionLogWriter;
use crate::ports::llm_client::{LlmClient, LlmRequest, LlmResponse};
use std::sync::{Arc, Mutex, PoisonError};
use taskforge_domain::{ExecutionId, ExecutionStrategy, Usage};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Running total of tokens and cost spent by one execution.
///
/// Cloned into every concurrent step so a failed or cancelled execution
/// still reports what it consumed.
#[derive(Debug, Clone, Default)]
pub struct UsageMeter {
    total: Arc<Mutex<Usage>>,
}

impl UsageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, usage: Usage) {
        self.total
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(usage);
    }

    pub fn snapshot(&self) -> Usage {
        *self.total.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything a strategy needs besides the task itself.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub execution_id: ExecutionId,
    pub strategy: ExecutionStrategy,
    pub model: String,
    pub usage: UsageMeter,
    pub log: ExecutionLogWriter,
}

impl ExecutionContext {
    pub fn new(
        execution_id: ExecutionId,
        strategy: ExecutionStrategy,
        model: impl Into<String>,
        log: ExecutionLogWriter,
    ) -> Self {
        Self {
            execution_id,
            strategy,
            model: model.into(),
            usage: UsageMeter::new(),
            log,
        }
    }
}

/// Check if cancellation has been requested.
pub(crate) fn check_cancelled(token: &CancellationToken) -> Result<(), StrategyError> {
    if token.is_cancelled() {
        return Err(StrategyError::Cancelled);
    }
    Ok(())
}

/// One model call with cancellation checked first and usage metered after.
///
/// Cancellation is honoured between calls, never in the middle of one.
pub(crate) async fn generate_metered(
    llm: &dyn LlmClient,
    request: LlmRequest,
    usage: &UsageMeter,
    cancel: &CancellationToken,
) -> Result<LlmResponse, StrategyError> {
    check_cancelled(cancel)?;
    debug!(model = %request.model, messages = request.messages.len(), "LLM call");
    let response = llm.generate(request).await?;
    usage.record(response.usage());
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_is_shared_between_clones() {
        let meter = UsageMeter::new();
        let clone = meter.clone();
        clone.record(Usage::new(5, 0.5));
        meter.record(Usage::new(5, 0.5));
        assert_eq!(meter.snapshot().tokens_used, 10);
    }
}
