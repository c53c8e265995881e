//! LLM endpoint configuration from TOML (`[llm]` section)

use serde::{Deserialize, Serialize};

/// Raw LLM endpoint configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLlmConfig {
    /// OpenAI-compatible API root (e.g. `https://api.openai.com/v1`)
    pub base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub price_per_1k_tokens: f64,
    pub request_timeout_secs: u64,
}

impl Default for FileLlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            price_per_1k_tokens: 0.005,
            request_timeout_secs: 120,
        }
    }
}

impl FileLlmConfig {
    /// API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}
