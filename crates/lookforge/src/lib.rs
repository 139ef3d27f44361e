pub mod config;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod prompts;
pub mod raster;
pub mod sanitize;
pub mod secrets;
pub mod session;
pub mod storage;
pub mod worker;

pub use config::{load_config, load_config_or_default, Config};
pub use error::{ConfigError, LookforgeError, RasterError, Result, SessionError, StorageError};
pub use generation::{GeminiImageClient, GenerateOptions, GenerationError, ImageGenerator, InlineImage};
pub use pipeline::{
    DetailPagePipeline, ModelImagePipeline, PipelineConfig, PipelineContext, PipelineError,
    SessionView, SwapFlavor, SwapPipeline, UploadFile,
};
pub use secrets::{resolve_secret, SecretError, SecretSources};
pub use session::{Session, SessionStatus, SessionStore, SessionSummary, SessionType, Side};
pub use worker::{run_bounded, ProgressReporter};
