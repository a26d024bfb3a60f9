//! Stage fakes that carry the uploaded bytes through every step, so the
//! final output shows which input it came from.
//!
//! extract: video bytes -> audio file
//! transcribe: audio file contents -> text
//! translate: "[target] text"
//! synthesize: text -> audio file
//! merge: audio file -> output

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use voxdub::stages::{
    AudioExtractor, SpeechSynthesizer, StageError, Stages, Transcriber, Transcript, Translator,
    VideoMerger,
};

#[derive(Default)]
pub struct CopyExtractor {
    pub delay: Option<Duration>,
    running: AtomicUsize,
    pub max_running: AtomicUsize,
}

impl CopyExtractor {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }
}

#[async_trait]
impl AudioExtractor for CopyExtractor {
    async fn extract(&self, video: &Path, audio_out: &Path) -> Result<(), StageError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = tokio::fs::copy(video, audio_out)
            .await
            .map(|_| ())
            .map_err(|e| StageError::SourceUnreadable {
                path: video.to_path_buf(),
                source: e,
            });
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub enum TranscriberBehavior {
    ReadAudio,
    Fail,
    Empty,
}

pub struct FakeTranscriber {
    pub behavior: TranscriberBehavior,
    pub language: Option<&'static str>,
}

impl FakeTranscriber {
    pub fn reading() -> Self {
        Self {
            behavior: TranscriberBehavior::ReadAudio,
            language: Some("en"),
        }
    }

    pub fn failing() -> Self {
        Self {
            behavior: TranscriberBehavior::Fail,
            language: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            behavior: TranscriberBehavior::Empty,
            language: None,
        }
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &Path, _hint: Option<&str>) -> Result<Transcript, StageError> {
        let text = match self.behavior {
            TranscriberBehavior::ReadAudio => tokio::fs::read_to_string(audio)
                .await
                .map_err(|e| StageError::SourceUnreadable {
                    path: audio.to_path_buf(),
                    source: e,
                })?,
            TranscriberBehavior::Fail => {
                return Err(StageError::Api {
                    service: "speech recognition",
                    status: 503,
                    body: "recognizer offline".to_string(),
                })
            }
            TranscriberBehavior::Empty => String::new(),
        };
        Ok(Transcript {
            text,
            language: self.language.map(str::to_string),
        })
    }
}

#[derive(Default)]
pub struct TaggingTranslator {
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl Translator for TaggingTranslator {
    async fn translate(
        &self,
        text: &str,
        _source: Option<&str>,
        target: &str,
    ) -> Result<String, StageError> {
        self.calls.lock().unwrap().push(text.to_string());
        Ok(format!("[{target}] {text}"))
    }
}

pub struct TextSynthesizer {
    pub hang: bool,
}

#[async_trait]
impl SpeechSynthesizer for TextSynthesizer {
    async fn synthesize(&self, text: &str, _language: &str, audio_out: &Path) -> Result<(), StageError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        tokio::fs::write(audio_out, text)
            .await
            .map_err(|e| StageError::Io {
                path: audio_out.to_path_buf(),
                source: e,
            })
    }
}

pub struct CopyMerger;

#[async_trait]
impl VideoMerger for CopyMerger {
    async fn merge(&self, _video: &Path, audio: &Path, out: &Path) -> Result<(), StageError> {
        tokio::fs::copy(audio, out)
            .await
            .map(|_| ())
            .map_err(|e| StageError::Io {
                path: out.to_path_buf(),
                source: e,
            })
    }
}

/// Handles onto the fakes so tests can inspect them after a run.
pub struct FakeStages {
    pub extractor: Arc<CopyExtractor>,
    pub translator: Arc<TaggingTranslator>,
    pub stages: Stages,
}

impl FakeStages {
    pub fn new() -> Self {
        Self::build(CopyExtractor::default(), FakeTranscriber::reading(), false)
    }

    pub fn with_transcriber(transcriber: FakeTranscriber) -> Self {
        Self::build(CopyExtractor::default(), transcriber, false)
    }

    pub fn with_extractor(extractor: CopyExtractor) -> Self {
        Self::build(extractor, FakeTranscriber::reading(), false)
    }

    pub fn hanging_synthesis() -> Self {
        Self::build(CopyExtractor::default(), FakeTranscriber::reading(), true)
    }

    fn build(extractor: CopyExtractor, transcriber: FakeTranscriber, hang: bool) -> Self {
        let extractor = Arc::new(extractor);
        let translator = Arc::new(TaggingTranslator::default());
        let stages = Stages {
            extractor: extractor.clone(),
            transcriber: Arc::new(transcriber),
            translator: translator.clone(),
            synthesizer: Arc::new(TextSynthesizer { hang }),
            merger: Arc::new(CopyMerger),
        };
        Self {
            extractor,
            translator,
            stages,
        }
    }
}
