use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use super::{GenerationRequest, ProviderClient};
use crate::config::{ProviderConfig, RequestConfig};
use crate::error::{ProviderError, ProviderResult};

/// Client for Groq's OpenAI-compatible chat completions API. Text only.
#[derive(Clone)]
pub struct GroqClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_ms: u64,
}

impl GroqClient {
    /// Create a new Groq client
    pub fn new(config: &ProviderConfig, request_config: &RequestConfig) -> ProviderResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::Unavailable {
                message: "GROQ_API_KEY is not set".to_string(),
            })?;

        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.tier_timeout_ms))
            .build()
            .map_err(ProviderError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            timeout_ms: request_config.tier_timeout_ms,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ProviderClient for GroqClient {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn supports_vision(&self) -> bool {
        false
    }

    async fn generate(&self, request: GenerationRequest) -> ProviderResult<String> {
        if request.image.is_some() {
            return Err(ProviderError::Unavailable {
                message: "groq client does not accept images".to_string(),
            });
        }

        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(request.prompt)],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(model = %self.model, "Calling Groq");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    ProviderError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let parsed: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        parsed
            .first_content()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::InvalidResponse {
                message: "Response contained no choices".to_string(),
            })
    }
}
