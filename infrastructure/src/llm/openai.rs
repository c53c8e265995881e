//! OpenAI-compatible chat completions client.
//!
//! Works against any endpoint that speaks the `/chat/completions` schema.
//! Cost is derived from the reported token count and a flat price per
//! thousand tokens.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use taskforge_application::ports::llm_client::{
    ChatMessage, LlmClient, LlmError, LlmRequest, LlmResponse,
};
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings for [`OpenAiCompatibleClient`].
#[derive(Clone)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: String,
    pub price_per_1k_tokens: f64,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("price_per_1k_tokens", &self.price_per_1k_tokens)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl OpenAiSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            price_per_1k_tokens: 0.0,
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_price_per_1k_tokens(mut self, price: f64) -> Self {
        self.price_per_1k_tokens = price.max(0.0);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    total_tokens: u64,
}

fn map_response(body: ChatCompletionResponse, price_per_1k: f64) -> Result<LlmResponse, LlmError> {
    let content = body
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::InvalidResponse("response has no message content".to_string()))?;
    let tokens = body.usage.map(|u| u.total_tokens).unwrap_or(0);
    let cost = tokens as f64 / 1000.0 * price_per_1k;
    Ok(LlmResponse::new(content, tokens, cost))
}

fn map_status(status: StatusCode, body: String) -> LlmError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited(body),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => LlmError::Timeout,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
            LlmError::Connection(format!("HTTP {}: {}", status, body))
        }
        _ => LlmError::RequestFailed(format!("HTTP {}: {}", status, body)),
    }
}

/// HTTP [`LlmClient`] for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    settings: OpenAiSettings,
}

impl OpenAiCompatibleClient {
    pub fn new(settings: OpenAiSettings) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| LlmError::Connection(e.to_string()))?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(model = %request.model, messages = request.messages.len(), "Sending chat completion");

        let response = self
            .client
            .post(self.settings.completions_url())
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(model = %request.model, status = %status, "Chat completion failed");
            return Err(map_status(status, text));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let mapped = map_response(parsed, self.settings.price_per_1k_tokens)?;
        debug!(
            model = %request.model,
            tokens = mapped.tokens_used,
            cost_usd = mapped.cost_usd,
            "Chat completion received"
        );
        Ok(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskforge_application::ports::llm_client::ChatRole;

    #[test]
    fn test_request_serializes_chat_schema() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let body = ChatCompletionRequest {
            model: "gpt-4o",
            messages: &messages,
            temperature: 0.2,
            max_tokens: 100,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 100);
        assert_eq!(messages[1].role, ChatRole::User);
    }

    #[test]
    fn test_cost_from_price_per_thousand_tokens() {
        let body: ChatCompletionResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "done"}}],
            "usage": {"prompt_tokens": 1200, "completion_tokens": 800, "total_tokens": 2000}
        }))
        .unwrap();
        let response = map_response(body, 0.01).unwrap();
        assert_eq!(response.content, "done");
        assert_eq!(response.tokens_used, 2000);
        assert!((response.cost_usd - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_empty_choices_is_invalid() {
        let body: ChatCompletionResponse =
            serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert!(matches!(
            map_response(body, 0.0),
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            LlmError::RateLimited(_)
        ));
        assert_eq!(
            map_status(StatusCode::GATEWAY_TIMEOUT, String::new()),
            LlmError::Timeout
        );
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, "bad key".to_string()),
            LlmError::RequestFailed(m) if m.contains("bad key")
        ));
    }

    #[test]
    fn test_url_join_tolerates_trailing_slash() {
        let settings = OpenAiSettings::new("k").with_base_url("http://localhost:8080/v1/");
        assert_eq!(
            settings.completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
        assert!(!format!("{:?}", settings).contains("\"k\""));
    }
}
