use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::secrets::{resolve_secret, SecretSources};

/// Default config location: `<platform config dir>/lookforge/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lookforge").join("config.json"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Loads the config at `path`, or the defaults when the file does not exist.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!("No config at {:?}, using defaults", path);
        let config = Config::default();
        validate_config(&config)?;
        return Ok(config);
    }
    load_config(path)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Resolves the image-API key from the configured sources.
pub fn resolve_api_key(config: &Config) -> Result<SecretString, ConfigError> {
    let api = &config.api;
    let key = resolve_secret(SecretSources {
        direct: api.api_key.as_deref(),
        file: api.api_key_file.as_deref(),
        env_var: Some(api.api_key_env_var.as_str()),
    })?;
    Ok(key)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.api.endpoint.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "api.endpoint must not be empty".to_string(),
        });
    }

    if !config.api.endpoint.starts_with("http://") && !config.api.endpoint.starts_with("https://")
    {
        return Err(ConfigError::Validation {
            message: format!(
                "api.endpoint must be an http(s) URL: {}",
                config.api.endpoint
            ),
        });
    }

    if config.api.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "api.timeoutSecs must be at least 1".to_string(),
        });
    }

    if config.generation.concurrency == 0 {
        return Err(ConfigError::Validation {
            message: "generation.concurrency must be at least 1".to_string(),
        });
    }

    if config.sessions.dir.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "sessions.dir must not be empty".to_string(),
        });
    }

    if config.detail_page.width == 0 {
        return Err(ConfigError::Validation {
            message: "detailPage.width must be greater than 0".to_string(),
        });
    }

    if !(1..=100).contains(&config.detail_page.jpeg_quality) {
        return Err(ConfigError::Validation {
            message: format!(
                "detailPage.jpegQuality must be within 1..=100, got {}",
                config.detail_page.jpeg_quality
            ),
        });
    }

    Ok(())
}
