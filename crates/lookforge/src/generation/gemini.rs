//! REST client for Gemini-style `generateContent` image endpoints.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::client::{GenerateOptions, ImageGenerator, InlineImage};
use super::error::{GenerationError, Result};
use crate::config::{ApiConfig, GenerationConfig};

/// Maximum length for error bodies kept in errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_error_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let cut: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", cut)
    } else {
        body.to_string()
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor)
}

pub struct GeminiImageClient {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    max_retries: u32,
    retry_base_delay: Duration,
    defaults: GenerateOptions,
}

impl GeminiImageClient {
    pub fn new(api: &ApiConfig, generation: &GenerationConfig, api_key: SecretString) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(api.connect_timeout_secs))
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .map_err(GenerationError::Client)?;

        Ok(Self {
            client,
            endpoint: api.endpoint.clone(),
            api_key,
            max_retries: api.max_retries,
            retry_base_delay: Duration::from_millis(api.retry_base_delay_ms),
            defaults: GenerateOptions {
                aspect_ratio: Some(generation.aspect_ratio.clone()),
                image_size: Some(generation.image_size.clone()),
            },
        })
    }

    fn build_request(
        &self,
        prompt: &str,
        images: &[InlineImage],
        options: &GenerateOptions,
    ) -> GenerateContentRequest {
        let mut parts = Vec::with_capacity(images.len() + 1);
        parts.push(Part::Text {
            text: prompt.to_string(),
        });
        parts.extend(images.iter().map(|img| Part::InlineData {
            inline_data: InlineDataPayload {
                mime_type: img.mime_type.clone(),
                data: img.data.clone(),
            },
        }));

        let pick = |requested: &Option<String>, fallback: &Option<String>| {
            requested.clone().or_else(|| fallback.clone())
        };

        GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationSettings {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: ImageSettings {
                    aspect_ratio: pick(&options.aspect_ratio, &self.defaults.aspect_ratio),
                    image_size: pick(&options.image_size, &self.defaults.image_size),
                },
            },
        }
    }

    async fn send_once(&self, body: &GenerateContentRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(GenerationError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GenerationError::Http {
                status: status.as_u16(),
                body: truncate_error_body(&text),
            });
        }

        let text = response.text().await.map_err(GenerationError::Request)?;
        extract_image(&text)
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageClient {
    async fn generate(
        &self,
        prompt: &str,
        images: &[InlineImage],
        options: &GenerateOptions,
    ) -> Result<String> {
        let body = self.build_request(prompt, images, options);
        let attempts = self.max_retries + 1;

        let mut last = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_base_delay, attempt);
                debug!(
                    "Retry {}/{} after {}ms",
                    attempt,
                    self.max_retries,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            match self.send_once(&body).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    warn!("Image API attempt {} failed: {}", attempt + 1, e);
                    last = Some(e);
                }
            }
        }

        match last {
            Some(e) if attempts > 1 => Err(GenerationError::RetriesExhausted {
                attempts,
                last: Box::new(e),
            }),
            Some(e) => Err(e),
            None => Err(GenerationError::NoImage),
        }
    }
}

/// Pulls the first inline image out of a response body. Both `inlineData`
/// and `inline_data` spellings are accepted.
fn extract_image(body: &str) -> Result<String> {
    let parsed: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::ParseResponse(e.to_string()))?;

    let candidate = parsed
        .candidates
        .and_then(|c| c.into_iter().next())
        .ok_or_else(|| GenerationError::ParseResponse("no candidates in response".into()))?;

    let parts = candidate
        .content
        .map(|c| c.parts)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| GenerationError::ParseResponse("no parts in first candidate".into()))?;

    parts
        .into_iter()
        .find_map(|part| part.inline_data.and_then(|d| d.data).filter(|d| !d.is_empty()))
        .ok_or(GenerationError::NoImage)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationSettings,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineDataPayload },
}

#[derive(Serialize)]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    response_modalities: Vec<String>,
    image_config: ImageSettings,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_size: Option<String>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    #[serde(rename = "inlineData", alias = "inline_data")]
    inline_data: Option<InlineDataResponse>,
}

#[derive(Deserialize)]
struct InlineDataResponse {
    data: Option<String>,
}
