use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::sanitize::extension_from_name;
use crate::storage::FileStorage;

/// One uploaded image: original file name plus base64 content. A `data:`
/// URL prefix on `data` is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    pub name: String,
    pub data: String,
}

impl UploadFile {
    /// Reads a local file into an upload payload.
    pub async fn from_path(path: &Path) -> Result<Self, StorageError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.jpg")
            .to_string();
        Ok(Self {
            name,
            data: STANDARD.encode(bytes),
        })
    }

    /// Lower-cased extension with dot, `.jpg` if the name has none.
    pub fn extension(&self) -> String {
        extension_from_name(&self.name)
    }
}

/// Writes the upload to `path` (relative to the session directory).
pub(crate) async fn store_upload(
    files: &FileStorage,
    path: &Path,
    upload: &UploadFile,
) -> Result<PathBuf, StorageError> {
    files.write_base64(path, &upload.data).await?;
    Ok(path.to_path_buf())
}
