use std::path::PathBuf;

use crate::config::Config;
use crate::generation::GenerateOptions;

/// Per-run tuning derived from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub concurrency: usize,
    pub generate: GenerateOptions,
    /// Pose reference pool for model images. `None` disables poses.
    pub poses_dir: Option<PathBuf>,
    pub page_width: u32,
    pub jpeg_quality: u8,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        let poses = config.poses.dir.trim();
        Self {
            concurrency: config.generation.concurrency.max(1),
            generate: GenerateOptions {
                aspect_ratio: Some(config.generation.aspect_ratio.clone()),
                image_size: Some(config.generation.image_size.clone()),
            },
            poses_dir: (!poses.is_empty()).then(|| PathBuf::from(poses)),
            page_width: config.detail_page.width,
            jpeg_quality: config.detail_page.jpeg_quality,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
