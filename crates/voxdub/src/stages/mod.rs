//! Stage executors: one trait per pipeline step, each with a production
//! implementation backed by ffmpeg or an HTTP service.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

pub mod command;
pub mod error;
pub mod ffmpeg;
pub mod synthesizer;
#[cfg(test)]
pub(crate) mod testing;
pub mod transcriber;
pub mod translator;

pub use error::StageError;
pub use ffmpeg::{FfmpegAudioExtractor, FfmpegVideoMerger, FfprobeMediaProbe};
pub use synthesizer::HttpSpeechSynthesizer;
pub use transcriber::HttpTranscriber;
pub use translator::HttpTranslator;

use crate::config::Config;

/// Recognized speech. `language` is whatever the recognizer reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub language: Option<String>,
}

#[async_trait]
pub trait AudioExtractor: Send + Sync {
    async fn extract(&self, video: &Path, audio_out: &Path) -> Result<(), StageError>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<Transcript, StageError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// `source` of `None` asks the service to detect the language.
    async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<String, StageError>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str, audio_out: &Path)
        -> Result<(), StageError>;
}

#[async_trait]
pub trait VideoMerger: Send + Sync {
    async fn merge(&self, video: &Path, audio: &Path, out: &Path) -> Result<(), StageError>;
}

#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Container duration in seconds.
    async fn duration(&self, path: &Path) -> Result<f64, StageError>;
}

/// The full set of executors a pipeline runs with.
#[derive(Clone)]
pub struct Stages {
    pub extractor: Arc<dyn AudioExtractor>,
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub merger: Arc<dyn VideoMerger>,
}

impl Stages {
    /// Production executors: ffmpeg for media work, HTTP for the services.
    pub fn from_config(config: &Config) -> Self {
        let client = reqwest::Client::new();
        Self {
            extractor: Arc::new(FfmpegAudioExtractor::new(&config.tools.ffmpeg)),
            transcriber: Arc::new(HttpTranscriber::new(client.clone(), &config.transcription)),
            translator: Arc::new(HttpTranslator::new(client.clone(), &config.translation)),
            synthesizer: Arc::new(HttpSpeechSynthesizer::new(client, &config.synthesis)),
            merger: Arc::new(FfmpegVideoMerger::new(&config.tools.ffmpeg)),
        }
    }
}
