//! Coordinator configuration.

use super::retry::RetryPolicy;
use super::strategy::StrategyConfig;
use std::time::Duration;

/// Per-user admission quota over a rolling window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_executions: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_executions: 10,
            window: Duration::from_secs(3600),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_executions: u32, window: Duration) -> Self {
        Self {
            max_executions,
            window,
        }
    }
}

/// Execution coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Concurrent execution slots.
    pub worker_pool_size: usize,
    /// Executions that may wait for a slot before new requests are refused.
    pub queue_capacity: usize,
    /// Model used when the caller does not pick one.
    pub default_model: String,
    /// Whether executing a `Failed` task again counts against the quota.
    pub retries_consume_quota: bool,
    /// Classify tasks as soon as they are created.
    pub classify_on_create: bool,
    /// Finished execution logs kept for late readers; older ones are dropped.
    pub retained_logs: usize,
    pub rate_limit: RateLimitConfig,
    pub strategy: StrategyConfig,
    pub publisher: RetryPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 4,
            queue_capacity: 256,
            default_model: "gpt-4o".to_string(),
            retries_consume_quota: true,
            classify_on_create: true,
            retained_logs: 1024,
            rate_limit: RateLimitConfig::default(),
            strategy: StrategyConfig::default(),
            publisher: RetryPolicy::default(),
        }
    }
}

impl CoordinatorConfig {
    // ==================== Builder Methods ====================

    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_retries_consume_quota(mut self, consume: bool) -> Self {
        self.retries_consume_quota = consume;
        self
    }

    pub fn with_classify_on_create(mut self, classify: bool) -> Self {
        self.classify_on_create = classify;
        self
    }

    pub fn with_retained_logs(mut self, retained: usize) -> Self {
        self.retained_logs = retained;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_publisher(mut self, publisher: RetryPolicy) -> Self {
        self.publisher = publisher;
        self
    }
}
