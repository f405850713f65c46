use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

use super::types::{
    GeminiContent, GeminiGenerationConfig, GeminiPart, GeminiRequest, GeminiResponse,
};
use super::{GenerationRequest, ProviderClient};
use crate::config::{ProviderConfig, RequestConfig};
use crate::error::{ProviderError, ProviderResult};

/// Client for the Gemini `generateContent` API. Handles text and vision calls.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_ms: u64,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: &ProviderConfig, request_config: &RequestConfig) -> ProviderResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::Unavailable {
                message: "GEMINI_API_KEY is not set".to_string(),
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

    fn build_body(request: &GenerationRequest) -> GeminiRequest {
        let mut parts = vec![GeminiPart::text(&request.prompt)];
        if let Some(image) = &request.image {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
            parts.push(GeminiPart::inline(&image.mime_type, encoded));
        }

        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        }
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn supports_vision(&self) -> bool {
        true
    }

    async fn generate(&self, request: GenerationRequest) -> ProviderResult<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = Self::build_body(&request);
        let start = Instant::now();

        debug!(
            model = %self.model,
            vision = request.image.is_some(),
            "Calling Gemini"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
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

        let parsed: GeminiResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        debug!(
            model = %self.model,
            latency_ms = start.elapsed().as_millis(),
            "Gemini call returned"
        );

        parsed.first_text().ok_or_else(|| ProviderError::InvalidResponse {
            message: "Response contained no text candidates".to_string(),
        })
    }
}
