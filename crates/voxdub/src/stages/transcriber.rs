use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;

use super::error::StageError;
use super::{Transcriber, Transcript};
use crate::config::TranscriptionConfig;

const SERVICE: &str = "speech recognition";

/// Whisper-compatible `POST {base}/audio/transcriptions` client.
pub struct HttpTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
}

impl HttpTranscriber {
    pub fn new(client: reqwest::Client, config: &TranscriptionConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<Transcript, StageError> {
        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| StageError::SourceUnreadable {
                path: audio.to_path_buf(),
                source: e,
            })?;

        let file_part = multipart::Part::bytes(bytes)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| StageError::Http {
                service: SERVICE,
                source: e,
            })?;

        let mut form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .part("file", file_part);
        if let Some(language) = language_hint {
            form = form.text("language", language.to_string());
        }

        tracing::debug!(model = %self.model, hint = ?language_hint, "Sending audio for transcription");

        let mut request = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| StageError::Http {
            service: SERVICE,
            source: e,
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(StageError::Api {
                service: SERVICE,
                status,
                body,
            });
        }

        let parsed: VerboseTranscription = response.json().await.map_err(|e| StageError::Http {
            service: SERVICE,
            source: e,
        })?;

        let text = parsed.text.trim().to_string();
        tracing::info!(chars = text.len(), language = ?parsed.language, "Transcription completed");

        Ok(Transcript {
            text,
            language: parsed.language.filter(|l| !l.trim().is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transcriber(server: &MockServer, api_key: Option<&str>) -> HttpTranscriber {
        let config = TranscriptionConfig {
            base_url: format!("{}/v1/", server.uri()),
            api_key: api_key.map(str::to_string),
            ..Default::default()
        };
        HttpTranscriber::new(reqwest::Client::new(), &config)
    }

    fn audio_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("extracted_audio.wav");
        std::fs::write(&path, b"RIFF....WAVE").unwrap();
        path
    }

    #[tokio::test]
    async fn test_transcribe_parses_verbose_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "  hello world ",
                "language": "en",
                "duration": 1.5
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let transcript = transcriber(&server, Some("sk-test"))
            .transcribe(&audio_file(&dir), Some("en"))
            .await
            .unwrap();
        assert_eq!(transcript.text, "hello world");
        assert_eq!(transcript.language.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_transcribe_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = transcriber(&server, None)
            .transcribe(&audio_file(&dir), None)
            .await
            .unwrap_err();
        match err {
            StageError::Api { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "model crashed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_transcribe_missing_audio() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let err = transcriber(&server, None)
            .transcribe(&dir.path().join("nope.wav"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::SourceUnreadable { .. }));
    }

    #[tokio::test]
    async fn test_transcribe_without_language() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": ""
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let transcript = transcriber(&server, None)
            .transcribe(&audio_file(&dir), None)
            .await
            .unwrap();
        assert!(transcript.text.is_empty());
        assert!(transcript.language.is_none());
    }
}
