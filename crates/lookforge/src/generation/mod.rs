pub mod client;
pub mod error;
pub mod gemini;

pub use client::{GenerateOptions, ImageGenerator, InlineImage, Unconfigured};
pub use error::GenerationError;
pub use gemini::GeminiImageClient;
