//! Session orchestrators.
//!
//! Each orchestrator loads nothing itself: callers hand it a `&mut Session`,
//! it validates, runs the pending work through the bounded runner, folds the
//! results back in, persists, and returns the full status view.

pub mod compositor;
pub mod config;
pub mod context;
pub mod error;
pub mod model_image;
pub mod pending;
pub mod status;
pub mod swap;
mod unit;
pub mod upload;

pub use compositor::{route_materials, DetailPagePipeline};
pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::PipelineError;
pub use model_image::{pick_pose, ModelImagePipeline};
pub use status::{
    BatchReport, DetailStatus, GroupStatus, RefEntry, SessionView, SubjectStatus, SwapStatus,
};
pub use swap::{RefRole, SwapFlavor, SwapPipeline};
pub use upload::UploadFile;
