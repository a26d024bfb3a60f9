use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::StageError;
use super::Translator;
use crate::config::TranslationConfig;

const SERVICE: &str = "translation";

/// LibreTranslate-compatible `POST {base}/translate` client.
pub struct HttpTranslator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText", default)]
    translated_text: Option<String>,
}

impl HttpTranslator {
    pub fn new(client: reqwest::Client, config: &TranslationConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<String, StageError> {
        let body = TranslateRequest {
            q: text,
            source: source.unwrap_or("auto"),
            target,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        tracing::debug!(
            source_language = body.source,
            target_language = target,
            chars = text.len(),
            "Requesting translation"
        );

        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| StageError::Http {
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

        let parsed: TranslateResponse = response.json().await.map_err(|e| StageError::Http {
            service: SERVICE,
            source: e,
        })?;

        match parsed.translated_text.map(|t| t.trim().to_string()) {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(StageError::EmptyResponse { service: SERVICE }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn translator(server: &MockServer, api_key: Option<&str>) -> HttpTranslator {
        let config = TranslationConfig {
            base_url: server.uri(),
            api_key: api_key.map(str::to_string),
        };
        HttpTranslator::new(reqwest::Client::new(), &config)
    }

    #[tokio::test]
    async fn test_translate_sends_libretranslate_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(body_json(serde_json::json!({
                "q": "hello",
                "source": "en",
                "target": "fr",
                "format": "text"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "translatedText": "bonjour" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let out = translator(&server, None)
            .translate("hello", Some("en"), "fr")
            .await
            .unwrap();
        assert_eq!(out, "bonjour");
    }

    #[tokio::test]
    async fn test_translate_auto_source_and_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "q": "hola",
                "source": "auto",
                "target": "en",
                "format": "text",
                "api_key": "k"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "translatedText": "hello" })),
            )
            .mount(&server)
            .await;

        let out = translator(&server, Some("k"))
            .translate("hola", None, "en")
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_translate_empty_result_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "translatedText": " " })),
            )
            .mount(&server)
            .await;

        let err = translator(&server, None)
            .translate("hello", None, "de")
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn test_translate_missing_field_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = translator(&server, None)
            .translate("hello", None, "de")
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn test_translate_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad language"))
            .mount(&server)
            .await;

        let err = translator(&server, None)
            .translate("hello", None, "xx")
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Api { status: 400, .. }));
    }
}
