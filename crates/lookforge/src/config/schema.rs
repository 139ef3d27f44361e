use serde::{Deserialize, Serialize};

use crate::secrets::DEFAULT_API_KEY_ENV_VAR;

pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-3-pro-image-preview:generateContent";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub poses: PosesConfig,
    #[serde(default)]
    pub detail_page: DetailPageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Direct key value. Prefer `api_key_file` or `api_key_env_var` outside local runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: String,
    /// Extra attempts after the first failed call.
    #[serde(default)]
    pub max_retries: u32,
    /// Backoff base; attempt n waits `base * 2^(n-1)`.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_api_key_env_var() -> String {
    DEFAULT_API_KEY_ENV_VAR.to_string()
}

fn default_retry_base_delay_ms() -> u64 {
    2000
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            max_retries: 0,
            retry_base_delay_ms: default_retry_base_delay_ms(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_image_size")]
    pub image_size: String,
    /// Maximum number of image-API calls in flight per batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_aspect_ratio() -> String {
    "3:4".to_string()
}

fn default_image_size() -> String {
    "2K".to_string()
}

fn default_concurrency() -> usize {
    3
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: default_aspect_ratio(),
            image_size: default_image_size(),
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsConfig {
    #[serde(default = "default_sessions_dir")]
    pub dir: String,
}

fn default_sessions_dir() -> String {
    "output/sessions".to_string()
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dir: default_sessions_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PosesConfig {
    #[serde(default = "default_poses_dir")]
    pub dir: String,
}

fn default_poses_dir() -> String {
    "poses".to_string()
}

impl Default for PosesConfig {
    fn default() -> Self {
        Self {
            dir: default_poses_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailPageConfig {
    /// Final stitch width in pixels.
    #[serde(default = "default_detail_width")]
    pub width: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_detail_width() -> u32 {
    790
}

fn default_jpeg_quality() -> u8 {
    95
}

impl Default for DetailPageConfig {
    fn default() -> Self {
        Self {
            width: default_detail_width(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}
