use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "VOXDUB_CONFIG";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Builds the effective configuration for the server process.
///
/// The file comes from `cli_path`, else `$VOXDUB_CONFIG`, else built-in
/// defaults are used. Environment overrides are applied last.
pub fn resolve_config(cli_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    let env = |key: &str| std::env::var(key).ok();
    let path = cli_path.or_else(|| env(CONFIG_ENV).map(PathBuf::from));

    let mut config = match path {
        Some(path) => {
            log::info!("Loading config from {}", path.display());
            load_config(&path)?
        }
        None => Config::default(),
    };

    apply_env_overrides(&mut config, env)?;
    validate_config(&config)?;
    Ok(config)
}

/// Applies `VOXDUB_*` overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("VOXDUB_PORT") {
        config.server.port = port.parse().map_err(|_| ConfigError::Validation {
            message: format!("VOXDUB_PORT is not a valid port: {}", port),
        })?;
    }
    if let Some(dir) = lookup("VOXDUB_DATA_DIR") {
        config.storage.data_dir = Some(PathBuf::from(dir));
    }
    if let Some(key) = lookup("VOXDUB_SPEECH_API_KEY") {
        config.transcription.api_key = Some(key);
    }
    if let Some(key) = lookup("VOXDUB_TRANSLATION_API_KEY") {
        config.translation.api_key = Some(key);
    }
    if let Some(key) = lookup("VOXDUB_TTS_API_KEY") {
        config.synthesis.api_key = Some(key);
    }
    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |message: String| Err(ConfigError::Validation { message });

    if config.version != "1.0" {
        return invalid(format!("Unsupported config version: {}", config.version));
    }
    if config.worker.count == 0 {
        return invalid("worker.count must be at least 1".to_string());
    }
    if config.worker.queue_capacity == 0 {
        return invalid("worker.queue_capacity must be at least 1".to_string());
    }
    if config.pipeline.stage_timeout_secs == 0 {
        return invalid("pipeline.stage_timeout_secs must be positive".to_string());
    }
    if config.pipeline.lazy_flush_interval_secs == 0 {
        return invalid("pipeline.lazy_flush_interval_secs must be positive".to_string());
    }
    if config.pipeline.placeholder_text.trim().is_empty() {
        return invalid("pipeline.placeholder_text must not be empty".to_string());
    }
    if config.retention.sweep_interval_secs == 0 {
        return invalid("retention.sweep_interval_secs must be positive".to_string());
    }
    if config.server.max_upload_mb == 0 {
        return invalid("server.max_upload_mb must be positive".to_string());
    }
    if config.server.recent_jobs_limit == 0 {
        return invalid("server.recent_jobs_limit must be at least 1".to_string());
    }

    for (name, url) in [
        ("transcription.base_url", &config.transcription.base_url),
        ("translation.base_url", &config.translation.base_url),
        ("synthesis.base_url", &config.synthesis.base_url),
    ] {
        if let Err(e) = reqwest::Url::parse(url) {
            return invalid(format!("{} is not a valid URL ({}): {}", name, url, e));
        }
    }

    if let Some(hint) = &config.transcription.language_hint {
        if !crate::sanitize::is_valid_language(hint) {
            return invalid(format!("transcription.language_hint is invalid: {}", hint));
        }
    }

    Ok(())
}
