//! In-process stage fakes for unit tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{
    AudioExtractor, SpeechSynthesizer, StageError, Stages, Transcriber, Transcript, Translator,
    VideoMerger,
};

/// Writes a few bytes of "audio". With a gate, waits for one permit first.
#[derive(Default)]
pub struct FakeExtractor {
    pub gate: Option<Arc<Semaphore>>,
}

#[async_trait]
impl AudioExtractor for FakeExtractor {
    async fn extract(&self, _video: &Path, audio_out: &Path) -> Result<(), StageError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        tokio::fs::write(audio_out, b"pcm").await.unwrap();
        Ok(())
    }
}

/// Transcriber that follows a fixed script.
pub enum ScriptedTranscriber {
    /// Hears `text` in English.
    Text(&'static str),
    Fail,
    /// Never answers; only a stage timeout ends it.
    Hang,
    Panic,
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _audio: &Path, _hint: Option<&str>) -> Result<Transcript, StageError> {
        match self {
            Self::Text(text) => Ok(Transcript {
                text: text.to_string(),
                language: Some("en".to_string()),
            }),
            Self::Fail => Err(StageError::Api {
                service: "speech recognition",
                status: 500,
                body: "model crashed".to_string(),
            }),
            Self::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!()
            }
            Self::Panic => panic!("recognizer blew up"),
        }
    }
}

/// Prefixes the target language and remembers each `(text, source)` call.
#[derive(Default)]
pub struct RecordingTranslator {
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<(String, Option<String>)>>,
}

#[async_trait]
impl Translator for RecordingTranslator {
    async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<String, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((text.to_string(), source.map(str::to_string)));
        Ok(format!("[{target}] {text}"))
    }
}

pub struct FakeSynthesizer;

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, _language: &str, audio_out: &Path) -> Result<(), StageError> {
        tokio::fs::write(audio_out, text.as_bytes()).await.unwrap();
        Ok(())
    }
}

pub struct FakeMerger;

#[async_trait]
impl VideoMerger for FakeMerger {
    async fn merge(&self, _video: &Path, audio: &Path, out: &Path) -> Result<(), StageError> {
        tokio::fs::copy(audio, out).await.unwrap();
        Ok(())
    }
}

pub fn stages() -> Stages {
    Stages {
        extractor: Arc::new(FakeExtractor::default()),
        transcriber: Arc::new(ScriptedTranscriber::Text("hello world")),
        translator: Arc::new(RecordingTranslator::default()),
        synthesizer: Arc::new(FakeSynthesizer),
        merger: Arc::new(FakeMerger),
    }
}

/// Stages whose extraction blocks until `gate` hands out a permit.
pub fn gated_stages(gate: Arc<Semaphore>) -> Stages {
    Stages {
        extractor: Arc::new(FakeExtractor { gate: Some(gate) }),
        ..stages()
    }
}
