use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, TranscriptFallback};

pub struct PipelineConfig {
    /// Parent of the per-job `processed/{id}` directories.
    pub processed_dir: PathBuf,
    pub stage_timeout: Duration,
    pub on_transcription_failure: TranscriptFallback,
    pub placeholder_text: String,
    pub language_hint: Option<String>,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            processed_dir: config.storage.processed_dir(),
            stage_timeout: Duration::from_secs(config.pipeline.stage_timeout_secs),
            on_transcription_failure: config.pipeline.on_transcription_failure,
            placeholder_text: config.pipeline.placeholder_text.clone(),
            language_hint: config.transcription.language_hint.clone(),
        }
    }
}
