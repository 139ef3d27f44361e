use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::StorageError;
use crate::sanitize::redact_path;

/// Strips a `data:<mime>;base64,` prefix if present.
pub fn strip_data_url(data: &str) -> &str {
    match data.split_once(',') {
        Some((head, body)) if head.starts_with("data:") => body,
        _ => data,
    }
}

/// MIME type for an image path, guessed from its extension. Anything that is
/// not recognisably an image is sent as JPEG.
pub fn mime_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| "image/jpeg".to_string())
}

/// File access rooted at one session directory.
///
/// Relative paths are resolved against the root; absolute paths are used
/// as-is.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    pub async fn write(&self, path: &Path, content: &[u8]) -> Result<PathBuf, StorageError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            self.ensure_directory(parent).await?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| StorageError::WriteFile {
                path: full.clone(),
                source: e,
            })?;
        log::debug!("Wrote {} bytes to {}", content.len(), redact_path(&full));
        Ok(full)
    }

    /// Decodes `data` (plain base64 or a data URL) and writes the bytes.
    pub async fn write_base64(&self, path: &Path, data: &str) -> Result<PathBuf, StorageError> {
        let bytes = STANDARD
            .decode(strip_data_url(data).trim())
            .map_err(|e| StorageError::InvalidBase64 {
                path: self.resolve(path),
                source: e,
            })?;
        self.write(path, &bytes).await
    }

    pub async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path);
        tokio::fs::read(&full)
            .await
            .map_err(|e| StorageError::ReadFile {
                path: full,
                source: e,
            })
    }

    pub async fn read_base64(&self, path: &Path) -> Result<String, StorageError> {
        let bytes = self.read(path).await?;
        Ok(STANDARD.encode(bytes))
    }

    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(self.resolve(path))
            .await
            .unwrap_or(false)
    }

    /// Removes a file, ignoring every failure. A missing file is not an error.
    pub async fn remove_best_effort(&self, path: &Path) {
        let full = self.resolve(path);
        match tokio::fs::remove_file(&full).await {
            Ok(()) => log::debug!("Removed {}", redact_path(&full)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::debug!("Could not remove {}: {}", redact_path(&full), e),
        }
    }

    async fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })
    }
}
