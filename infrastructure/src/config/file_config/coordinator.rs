//! Coordinator configuration from TOML (`[coordinator]` and `[rate_limit]` sections)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use taskforge_application::{CoordinatorConfig, RateLimitConfig};

/// Raw coordinator configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCoordinatorConfig {
    pub worker_pool_size: usize,
    pub queue_capacity: usize,
    pub default_model: String,
    /// Whether executing a failed task again counts against the quota
    pub retries_consume_quota: bool,
    pub classify_on_create: bool,
    /// Finished execution logs kept in memory
    pub retained_logs: usize,
}

impl Default for FileCoordinatorConfig {
    fn default() -> Self {
        let defaults = CoordinatorConfig::default();
        Self {
            worker_pool_size: defaults.worker_pool_size,
            queue_capacity: defaults.queue_capacity,
            default_model: defaults.default_model,
            retries_consume_quota: defaults.retries_consume_quota,
            classify_on_create: defaults.classify_on_create,
            retained_logs: defaults.retained_logs,
        }
    }
}

/// Raw per-user admission quota from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRateLimitConfig {
    pub max_executions: u32,
    pub window_seconds: u64,
}

impl Default for FileRateLimitConfig {
    fn default() -> Self {
        let defaults = RateLimitConfig::default();
        Self {
            max_executions: defaults.max_executions,
            window_seconds: defaults.window.as_secs(),
        }
    }
}

impl FileRateLimitConfig {
    pub fn to_rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig::new(
            self.max_executions,
            Duration::from_secs(self.window_seconds),
        )
    }
}
