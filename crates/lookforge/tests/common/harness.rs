//! Test harness for isolated pipeline runs.
//!
//! The `TestHarness` struct provides:
//! - A temporary sessions root and pose directory
//! - A `PipelineContext` wired to a `MockGenerator`
//! - Shortcuts for loading sessions back from disk

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use lookforge::generation::{GenerateOptions, GenerationError, ImageGenerator, InlineImage};
use lookforge::pipeline::{
    DetailPagePipeline, ModelImagePipeline, PipelineConfig, PipelineContext, SwapFlavor,
    SwapPipeline,
};
use lookforge::session::{Session, SessionStore, SessionType};
use lookforge::worker::NoopProgress;

use super::builders::png_base64;

/// One call the mock received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub image_count: usize,
}

/// Image generator that returns a small real PNG and records every call.
///
/// Failures can be scripted by call number (1-based, in the order calls
/// reach the mock) or by a substring of the prompt.
#[derive(Default)]
pub struct MockGenerator {
    calls: AtomicUsize,
    fail_calls: Mutex<HashSet<usize>>,
    fail_prompt: Mutex<Option<String>>,
    recorded: Mutex<Vec<RecordedCall>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_call(&self, call: usize) {
        self.fail_calls.lock().unwrap().insert(call);
    }

    pub fn fail_when_prompt_contains(&self, needle: &str) {
        *self.fail_prompt.lock().unwrap() = Some(needle.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_calls.lock().unwrap().clear();
        *self.fail_prompt.lock().unwrap() = None;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for MockGenerator {
    async fn generate(
        &self,
        prompt: &str,
        images: &[InlineImage],
        _options: &GenerateOptions,
    ) -> Result<String, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorded.lock().unwrap().push(RecordedCall {
            prompt: prompt.to_string(),
            image_count: images.len(),
        });

        let by_number = self.fail_calls.lock().unwrap().contains(&call);
        let by_prompt = self
            .fail_prompt
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|needle| prompt.contains(needle));
        if by_number || by_prompt {
            return Err(GenerationError::Http {
                status: 503,
                body: format!("scripted failure on call {}", call),
            });
        }

        tokio::task::yield_now().await;
        Ok(png_base64(8, 6, [200, 40, 40]))
    }
}

/// Isolated environment for pipeline tests.
pub struct TestHarness {
    temp_dir: TempDir,
    pub sessions_dir: PathBuf,
    pub poses_dir: PathBuf,
    pub generator: Arc<MockGenerator>,
    pub ctx: PipelineContext,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_concurrency(3)
    }

    pub fn with_concurrency(concurrency: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let sessions_dir = temp_dir.path().join("sessions");
        let poses_dir = temp_dir.path().join("poses");
        std::fs::create_dir_all(&poses_dir).expect("Failed to create poses dir");

        let config = PipelineConfig {
            concurrency,
            poses_dir: Some(poses_dir.clone()),
            page_width: 40,
            ..PipelineConfig::default()
        };
        let generator = Arc::new(MockGenerator::new());
        let ctx = PipelineContext::new(
            SessionStore::new(&sessions_dir),
            generator.clone(),
            config,
        )
        .with_progress(Arc::new(NoopProgress));

        Self {
            temp_dir,
            sessions_dir,
            poses_dir,
            generator,
            ctx,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn store(&self) -> &SessionStore {
        &self.ctx.store
    }

    pub async fn create(&self, session_type: SessionType) -> Session {
        self.store()
            .create(session_type)
            .await
            .expect("Failed to create session")
    }

    pub async fn reload(&self, session: &Session) -> Session {
        self.store()
            .load(&session.session_id)
            .await
            .expect("Failed to load session")
    }

    pub fn session_file(&self, session: &Session, relative: impl AsRef<Path>) -> PathBuf {
        self.sessions_dir.join(&session.session_id).join(relative)
    }

    pub fn swap(&self, flavor: SwapFlavor) -> SwapPipeline {
        SwapPipeline::new(self.ctx.clone(), flavor)
    }

    pub fn models(&self) -> ModelImagePipeline {
        ModelImagePipeline::new(self.ctx.clone())
    }

    pub fn detail_page(&self) -> DetailPagePipeline {
        DetailPagePipeline::new(self.ctx.clone())
    }

    /// Drops one image into the pose pool.
    pub fn add_pose(&self, name: &str) -> PathBuf {
        let path = self.poses_dir.join(name);
        std::fs::write(&path, super::builders::png_bytes(4, 8, [0, 0, 0]))
            .expect("Failed to write pose");
        path
    }
}
