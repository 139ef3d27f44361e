use std::path::{Path, PathBuf};

use crate::generation::InlineImage;
use crate::sanitize::redact_path;
use crate::storage::{mime_type_for, FileStorage};

use super::context::PipelineContext;
use super::error::PipelineError;

/// One generation call: prompt plus ordered input images in, one image
/// file out.
pub(crate) struct UnitRequest {
    pub prompt: String,
    /// Relative to the session directory, or absolute.
    pub inputs: Vec<PathBuf>,
    /// Relative to the session directory.
    pub output: PathBuf,
}

/// Runs one unit of work and returns the output path it wrote.
pub(crate) async fn run_unit(
    ctx: &PipelineContext,
    files: &FileStorage,
    request: UnitRequest,
) -> Result<PathBuf, PipelineError> {
    let mut images = Vec::with_capacity(request.inputs.len());
    for input in &request.inputs {
        images.push(inline_image(files, input).await?);
    }

    tracing::debug!(
        inputs = images.len(),
        output = %redact_path(&request.output),
        "calling image generator"
    );
    let data = ctx
        .generator
        .generate(&request.prompt, &images, &ctx.config.generate)
        .await?;

    files.write_base64(&request.output, &data).await?;
    tracing::info!(output = %redact_path(&request.output), "saved generated image");
    Ok(request.output)
}

async fn inline_image(files: &FileStorage, path: &Path) -> Result<InlineImage, PipelineError> {
    Ok(InlineImage {
        mime_type: mime_type_for(path),
        data: files.read_base64(path).await?,
    })
}
