use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use super::error::StageError;
use super::SpeechSynthesizer;
use crate::config::SynthesisConfig;

const SERVICE: &str = "speech synthesis";

/// Text-to-speech client: `POST {base}/synthesize` returns raw WAV bytes.
pub struct HttpSpeechSynthesizer {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    voice: Option<String>,
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a str>,
    format: &'static str,
}

impl HttpSpeechSynthesizer {
    pub fn new(client: reqwest::Client, config: &SynthesisConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            voice: config.voice.clone(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        audio_out: &Path,
    ) -> Result<(), StageError> {
        let body = SynthesizeRequest {
            text,
            language,
            voice: self.voice.as_deref(),
            format: "wav",
        };

        let mut request = self
            .client
            .post(format!("{}/synthesize", self.base_url))
            .json(&body);
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

        let audio = response.bytes().await.map_err(|e| StageError::Http {
            service: SERVICE,
            source: e,
        })?;
        if audio.is_empty() {
            return Err(StageError::EmptyResponse { service: SERVICE });
        }

        tokio::fs::write(audio_out, &audio)
            .await
            .map_err(|e| StageError::Io {
                path: audio_out.to_path_buf(),
                source: e,
            })?;

        tracing::debug!(bytes = audio.len(), language, "Speech synthesized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn synthesizer(server: &MockServer, voice: Option<&str>) -> HttpSpeechSynthesizer {
        let config = SynthesisConfig {
            base_url: server.uri(),
            api_key: Some("tts-key".to_string()),
            voice: voice.map(str::to_string),
        };
        HttpSpeechSynthesizer::new(reqwest::Client::new(), &config)
    }

    #[tokio::test]
    async fn test_synthesize_writes_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/synthesize"))
            .and(header("authorization", "Bearer tts-key"))
            .and(body_json(serde_json::json!({
                "text": "bonjour",
                "language": "fr",
                "voice": "alice",
                "format": "wav"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFFfakeWAVE".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("translated_audio.wav");
        synthesizer(&server, Some("alice"))
            .synthesize("bonjour", "fr", &out)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"RIFFfakeWAVE");
    }

    #[tokio::test]
    async fn test_synthesize_empty_body_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("translated_audio.wav");
        let err = synthesizer(&server, None)
            .synthesize("bonjour", "fr", &out)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::EmptyResponse { .. }));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_synthesize_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = synthesizer(&server, None)
            .synthesize("hi", "en", &dir.path().join("a.wav"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
