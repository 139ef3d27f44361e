use async_trait::async_trait;

use super::error::{GenerationError, Result};

/// An image sent to the generator alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64, no data-URL prefix.
    pub data: String,
}

/// Per-call output shape. `None` falls back to the generator's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    pub aspect_ratio: Option<String>,
    pub image_size: Option<String>,
}

/// Text + images in, one image out.
///
/// Implementations return the generated image as base64. Each call is
/// independent; callers own concurrency and persistence.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        images: &[InlineImage],
        options: &GenerateOptions,
    ) -> Result<String>;
}

/// Stands in when no API key is available. Every call fails with the reason
/// the real client could not be built.
#[derive(Debug, Clone)]
pub struct Unconfigured {
    reason: String,
}

impl Unconfigured {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ImageGenerator for Unconfigured {
    async fn generate(
        &self,
        _prompt: &str,
        _images: &[InlineImage],
        _options: &GenerateOptions,
    ) -> Result<String> {
        Err(GenerationError::NotConfigured(self.reason.clone()))
    }
}
