use std::sync::Arc;

use crate::generation::ImageGenerator;
use crate::session::{Session, SessionStore};
use crate::storage::FileStorage;
use crate::worker::{LogProgress, ProgressReporter};

use super::config::PipelineConfig;
use super::error::PipelineError;

/// Everything an orchestrator needs. Cheap to clone.
#[derive(Clone)]
pub struct PipelineContext {
    pub store: SessionStore,
    pub generator: Arc<dyn ImageGenerator>,
    pub config: Arc<PipelineConfig>,
    pub progress: Arc<dyn ProgressReporter>,
}

impl PipelineContext {
    pub fn new(
        store: SessionStore,
        generator: Arc<dyn ImageGenerator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            generator,
            config: Arc::new(config),
            progress: Arc::new(LogProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// File access rooted at the session's directory.
    pub fn files(&self, session: &Session) -> Result<FileStorage, PipelineError> {
        let dir = self.store.session_dir(&session.session_id)?;
        Ok(FileStorage::new(dir))
    }
}
