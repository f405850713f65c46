use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::ImageData;
use crate::config::DEFAULT_MAX_IMAGE_BYTES;
use crate::error::{ProviderError, ProviderResult};

/// Resolves an uploaded image reference to bytes for vision providers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Fetch the image behind `url`.
    async fn load(&self, url: &str) -> ProviderResult<ImageData>;
}

/// Loads images over HTTP(S) from object storage.
#[derive(Clone)]
pub struct HttpImageLoader {
    client: Client,
    max_bytes: u64,
}

impl HttpImageLoader {
    /// Create a loader with the given download bound.
    pub fn new(timeout_ms: u64) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(ProviderError::Http)?;
        Ok(Self {
            client,
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        })
    }

    /// Reject images larger than `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn too_large(&self, url: &str) -> ProviderError {
        ProviderError::Image {
            message: format!("GET {} exceeds the {} byte image limit", url, self.max_bytes),
        }
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> ProviderResult<ImageData> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Image {
                message: format!("GET {} returned {}", url, status.as_u16()),
            });
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| "image/jpeg".to_string());

        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(self.too_large(url));
        }

        // Bodies without Content-Length are bounded while streaming.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(self.too_large(url));
            }
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(ProviderError::Image {
                message: format!("GET {} returned an empty body", url),
            });
        }

        Ok(ImageData::new(bytes, mime_type))
    }
}
