//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application config.

mod coordinator;
mod llm;
mod logging;
mod output;
mod publisher;
mod strategy;

pub use coordinator::{FileCoordinatorConfig, FileRateLimitConfig};
pub use llm::FileLlmConfig;
pub use logging::FileLoggingConfig;
pub use output::{FileOutputConfig, FileOutputFormat};
pub use publisher::FilePublisherConfig;
pub use strategy::FileStrategyConfig;

use serde::{Deserialize, Serialize};
use taskforge_application::CoordinatorConfig;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigValidationError {
    #[error("{field} cannot be 0")]
    Zero { field: &'static str },

    #[error("model name cannot be empty")]
    EmptyModelName,

    #[error("publisher.jitter must be within 0.0..=1.0, got {0}")]
    JitterOutOfRange(f64),

    #[error("publisher.backoff_ms cannot be empty when max_attempts > 1")]
    EmptyBackoff,

    #[error("strategy.temperature must be within 0.0..=2.0, got {0}")]
    TemperatureOutOfRange(f32),
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub coordinator: FileCoordinatorConfig,
    pub rate_limit: FileRateLimitConfig,
    pub strategy: FileStrategyConfig,
    pub publisher: FilePublisherConfig,
    pub llm: FileLlmConfig,
    pub logging: FileLoggingConfig,
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning every problem found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        let counts = [
            ("coordinator.worker_pool_size", self.coordinator.worker_pool_size as u64),
            ("coordinator.queue_capacity", self.coordinator.queue_capacity as u64),
            ("rate_limit.max_executions", self.rate_limit.max_executions as u64),
            ("rate_limit.window_seconds", self.rate_limit.window_seconds),
            ("strategy.iterative_rounds", self.strategy.iterative_rounds as u64),
            (
                "strategy.multi_agent_parallel_steps",
                self.strategy.multi_agent_parallel_steps as u64,
            ),
            (
                "strategy.hybrid_parallel_steps",
                self.strategy.hybrid_parallel_steps as u64,
            ),
            ("strategy.max_tokens", self.strategy.max_tokens as u64),
            ("publisher.max_attempts", self.publisher.max_attempts as u64),
        ];
        errors.extend(
            counts
                .into_iter()
                .chain(self.strategy.timeouts())
                .filter(|(_, value)| *value == 0)
                .map(|(field, _)| ConfigValidationError::Zero { field }),
        );

        if self.coordinator.default_model.trim().is_empty() {
            errors.push(ConfigValidationError::EmptyModelName);
        }
        if !(0.0..=1.0).contains(&self.publisher.jitter) {
            errors.push(ConfigValidationError::JitterOutOfRange(self.publisher.jitter));
        }
        if self.publisher.max_attempts > 1 && self.publisher.backoff_ms.is_empty() {
            errors.push(ConfigValidationError::EmptyBackoff);
        }
        if !(0.0..=2.0).contains(&self.strategy.temperature) {
            errors.push(ConfigValidationError::TemperatureOutOfRange(
                self.strategy.temperature,
            ));
        }

        errors
    }

    /// Build the coordinator configuration these settings describe.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig::default()
            .with_worker_pool_size(self.coordinator.worker_pool_size)
            .with_queue_capacity(self.coordinator.queue_capacity)
            .with_default_model(self.coordinator.default_model.clone())
            .with_retries_consume_quota(self.coordinator.retries_consume_quota)
            .with_classify_on_create(self.coordinator.classify_on_create)
            .with_retained_logs(self.coordinator.retained_logs)
            .with_rate_limit(self.rate_limit.to_rate_limit())
            .with_strategy(self.strategy.to_strategy_config())
            .with_publisher(self.publisher.to_retry_policy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use taskforge_domain::ExecutionStrategy;

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[coordinator]
worker_pool_size = 8
default_model = "gpt-4o-mini"
retries_consume_quota = false

[rate_limit]
max_executions = 3
window_seconds = 60

[strategy]
iterative_rounds = 5
step_timeout = 30

[publisher]
max_attempts = 5
backoff_ms = [10, 20]
events_dir = "/tmp/taskforge-events"

[logging]
file = "/tmp/taskforge.log"
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.coordinator.worker_pool_size, 8);
        assert!(!config.coordinator.retries_consume_quota);
        assert_eq!(config.rate_limit.max_executions, 3);
        assert_eq!(config.strategy.iterative_rounds, 5);
        assert_eq!(config.publisher.backoff_ms, vec![10, 20]);
        assert!(config.logging.file.is_some());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let toml_str = r#"
[coordinator]
queue_capacity = 16
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.coordinator.queue_capacity, 16);
        // Defaults should apply
        assert_eq!(config.coordinator.worker_pool_size, 4);
        assert_eq!(config.rate_limit.window_seconds, 3600);
        assert_eq!(config.strategy.step_timeout, 300);
        assert!(config.output.color);
    }

    #[test]
    fn test_default_config_matches_application_defaults() {
        let config = FileConfig::default().coordinator_config();
        let expected = CoordinatorConfig::default();
        assert_eq!(config.worker_pool_size, expected.worker_pool_size);
        assert_eq!(config.queue_capacity, expected.queue_capacity);
        assert_eq!(config.rate_limit, expected.rate_limit);
        assert_eq!(config.strategy, expected.strategy);
        assert_eq!(config.publisher.max_attempts, 3);
        assert_eq!(
            config.publisher.backoff,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(500),
                Duration::from_secs(5)
            ]
        );
    }

    #[test]
    fn test_conversion_applies_overrides() {
        let mut file = FileConfig::default();
        file.rate_limit.max_executions = 2;
        file.strategy.multi_agent_timeout = 90;
        file.publisher.jitter = 0.0;

        let config = file.coordinator_config();
        assert_eq!(config.rate_limit.max_executions, 2);
        assert_eq!(
            config.strategy.timeout_for(ExecutionStrategy::HybridExecution),
            Duration::from_secs(90)
        );
        assert_eq!(config.publisher.jitter, 0.0);
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let mut config = FileConfig::default();
        config.coordinator.worker_pool_size = 0;
        config.coordinator.default_model = " ".to_string();
        config.strategy.step_timeout = 0;
        config.publisher.jitter = 1.5;
        config.publisher.backoff_ms.clear();

        let errors = config.validate();
        assert!(errors.contains(&ConfigValidationError::Zero {
            field: "coordinator.worker_pool_size"
        }));
        assert!(errors.contains(&ConfigValidationError::Zero {
            field: "strategy.step_timeout"
        }));
        assert!(errors.contains(&ConfigValidationError::EmptyModelName));
        assert!(errors.contains(&ConfigValidationError::JitterOutOfRange(1.5)));
        assert!(errors.contains(&ConfigValidationError::EmptyBackoff));
        assert_eq!(errors.len(), 5);
    }
}
