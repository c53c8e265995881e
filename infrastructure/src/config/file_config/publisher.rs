//! Event publication configuration from TOML (`[publisher]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use taskforge_application::RetryPolicy;

/// Raw publisher configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePublisherConfig {
    /// Attempts including the first
    pub max_attempts: u32,
    /// Delay before each retry, in milliseconds
    pub backoff_ms: Vec<u64>,
    pub jitter: f64,
    /// Write events as JSON lines under this directory instead of keeping
    /// them in memory.
    pub events_dir: Option<PathBuf>,
}

impl Default for FilePublisherConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            backoff_ms: policy
                .backoff
                .iter()
                .map(|d| d.as_millis() as u64)
                .collect(),
            jitter: policy.jitter,
            events_dir: None,
        }
    }
}

impl FilePublisherConfig {
    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_backoff(self.backoff_ms.iter().copied().map(Duration::from_millis).collect())
            .with_jitter(self.jitter)
    }
}
