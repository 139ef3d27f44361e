use thiserror::Error;

use crate::error::{RasterError, SessionError, StorageError};
use crate::generation::GenerationError;
use crate::session::SessionType;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A precondition failed. Nothing was changed.
    #[error("{0}")]
    Validation(String),

    #[error("Nothing to generate: {0}")]
    NothingPending(String),

    #[error("No {kind} with index {index}")]
    UnknownIndex { kind: &'static str, index: u32 },

    #[error("No garment group '{0}'")]
    UnknownGroup(String),

    #[error("Session is a {actual} session, expected {expected}")]
    WrongSessionType {
        expected: SessionType,
        actual: SessionType,
    },

    #[error("Sections without a generated image: {missing:?}")]
    IncompleteSections { missing: Vec<u32> },

    #[error("Session failed: {0}")]
    Session(#[from] SessionError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Image processing failed: {0}")]
    Raster(#[from] RasterError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    /// True for errors caused by the request rather than by I/O or the API.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Validation(_)
                | PipelineError::NothingPending(_)
                | PipelineError::UnknownIndex { .. }
                | PipelineError::UnknownGroup(_)
                | PipelineError::WrongSessionType { .. }
                | PipelineError::IncompleteSections { .. }
        )
    }
}
