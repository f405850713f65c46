//! Generative model providers.
//!
//! Every backend is exposed through the single [`ProviderClient`] capability so the
//! fallback orchestrator never branches on concrete provider types.

mod gemini;
mod groq;
mod image;
mod types;

pub use gemini::GeminiClient;
pub use groq::GroqClient;
pub use image::{HttpImageLoader, ImageLoader};
#[cfg(test)]
pub use image::MockImageLoader;
pub use types::*;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderResult;

/// An image handed to a vision-capable provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Raw encoded image bytes.
    pub bytes: Vec<u8>,
    /// MIME type such as `image/jpeg`.
    pub mime_type: String,
}

impl ImageData {
    /// Create image data with an explicit MIME type.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }
}

/// One generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Present only for vision calls.
    pub image: Option<Arc<ImageData>>,
}

impl GenerationRequest {
    /// Create a text-only request.
    pub fn text(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            temperature,
            image: None,
        }
    }

    /// Attach an image to the request.
    pub fn with_image(mut self, image: Arc<ImageData>) -> Self {
        self.image = Some(image);
        self
    }
}

/// Uniform capability over one AI backend.
///
/// Implementations make exactly one network attempt per call and return the raw
/// completion text. Retrying is the caller's decision.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Stable identity used to tag results and log failures.
    fn name(&self) -> &'static str;

    /// Whether [`GenerationRequest::image`] is honoured.
    fn supports_vision(&self) -> bool;

    /// Run a single generation call.
    async fn generate(&self, request: GenerationRequest) -> ProviderResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_request_has_no_image() {
        let request = GenerationRequest::text("hello", 50, 0.7);
        assert_eq!(request.prompt, "hello");
        assert_eq!(request.max_tokens, 50);
        assert!(request.image.is_none());
    }

    #[test]
    fn test_with_image_attaches_shared_bytes() {
        let image = Arc::new(ImageData::new(vec![1, 2, 3], "image/png"));
        let request = GenerationRequest::text("look", 500, 0.3).with_image(image.clone());
        assert_eq!(request.image.as_deref(), Some(image.as_ref()));
    }
}
