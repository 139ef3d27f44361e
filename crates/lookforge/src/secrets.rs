//! API key resolution.
//!
//! The image-generation key can come from three places, checked in order:
//!
//! 1. **Direct value** in the config file (`apiKey`), handy for local runs
//! 2. **File reference** (`apiKeyFile`), e.g. a mounted container secret
//! 3. **Environment variable** (`apiKeyEnvVar`, default `LOOKFORGE_API_KEY`)
//!
//! The resolved key is wrapped in [`SecretString`] so it never lands in
//! `Debug` output or log lines.

use secrecy::SecretString;

/// Environment variable consulted when the config names none.
pub const DEFAULT_API_KEY_ENV_VAR: &str = "LOOKFORGE_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API key source provided (need one of: apiKey, apiKeyFile, apiKeyEnvVar)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Secret file '{path}' is empty")]
    EmptyFile { path: String },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// The configured places a secret may be read from.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSources<'a> {
    pub direct: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSources<'a> {
    /// True if at least one non-empty source is configured.
    pub fn has_any(&self) -> bool {
        [self.direct, self.file, self.env_var]
            .iter()
            .any(|s| s.is_some_and(|v| !v.is_empty()))
    }
}

/// Resolves a secret from the first configured, non-empty source.
///
/// A configured source that fails (unreadable file, unset variable) is an
/// error; later sources are not consulted as a fallback.
pub fn resolve_secret(sources: SecretSources<'_>) -> Result<SecretString> {
    if let Some(value) = sources.direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = sources.file.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        let content =
            std::fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
                path: expanded.clone(),
                source: e,
            })?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SecretError::EmptyFile { path: expanded });
        }
        return Ok(SecretString::from(trimmed.to_string()));
    }

    if let Some(name) = sources.env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(name) {
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Expands a leading `~` to the current user's home directory.
///
/// `~user/path` is not supported.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
