//! Batch translation through the Google Cloud Translation v2 REST API.
//!
//! The module uses a trait-based design so the pipeline can be driven by any
//! backend:
//! - [`Translate`]: core trait, one call per batch of texts
//! - [`GoogleTranslator`]: the REST client
//!
//! # Wire contract
//!
//! One `POST {endpoint}?key={api_key}` per batch:
//!
//! ```text
//! request:  { "q": [..], "source": "es", "target": "en", "format": "text" }
//! response: { "data": { "translations": [ { "translatedText": ".." }, .. ] } }
//! ```
//!
//! The response must carry exactly one translation per input, in input
//! order. There are no retries: a failed batch fails the translation step.

use crate::config::TranslationConfig;
use crate::utils::truncate_for_log;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, instrument};

const SOURCE_LANGUAGE: &str = "es";
const TARGET_LANGUAGE: &str = "en";

#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("translation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("translation API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed translation response: {source}")]
    Malformed {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    #[error("expected {expected} translations, got {actual}")]
    CountMismatch {
        expected: usize,
        actual: usize,
        body: String,
    },
}

/// Translates a batch of texts, returning one output per input in order.
pub trait Translate {
    async fn translate_batch(&self, texts: &[String]) -> Result<Vec<String>, TranslationError>;
}

#[derive(Serialize, Debug)]
struct TranslateRequest<'a> {
    q: &'a [String],
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Deserialize, Debug)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize, Debug)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Deserialize, Debug)]
struct Translation {
    #[serde(rename = "translatedText", default)]
    translated_text: String,
}

/// Google Translate v2 client bound to one endpoint and API key.
pub struct GoogleTranslator {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl fmt::Debug for GoogleTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleTranslator")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl GoogleTranslator {
    pub fn new(
        config: &TranslationConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, TranslationError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: api_key.into(),
        })
    }
}

impl Translate for GoogleTranslator {
    #[instrument(level = "info", skip_all, fields(count = texts.len()))]
    async fn translate_batch(&self, texts: &[String]) -> Result<Vec<String>, TranslationError> {
        if texts.is_empty() {
            debug!("Nothing to translate");
            return Ok(Vec::new());
        }

        let t0 = Instant::now();
        let request = TranslateRequest {
            q: texts,
            source: SOURCE_LANGUAGE,
            target: TARGET_LANGUAGE,
            format: "text",
        };
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!(%status, body = %truncate_for_log(&body, 300), "Translation API error");
            return Err(TranslationError::Status { status, body });
        }

        let parsed: TranslateResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(source) => return Err(TranslationError::Malformed { source, body }),
        };
        let translations = parsed.data.translations;
        if translations.len() != texts.len() {
            return Err(TranslationError::CountMismatch {
                expected: texts.len(),
                actual: translations.len(),
                body,
            });
        }

        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Batch translated"
        );
        Ok(translations
            .into_iter()
            .map(|t| t.translated_text)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, method, path, query_param},
    };

    async fn translator(server: &MockServer) -> GoogleTranslator {
        let config = TranslationConfig {
            endpoint: format!("{}/language/translate/v2", server.uri()),
            ..TranslationConfig::default()
        };
        GoogleTranslator::new(&config, "secret").unwrap()
    }

    fn titles(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let out = translator(&server).await.translate_batch(&[]).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/language/translate/v2"))
            .and(query_param("key", "secret"))
            .and(body_json(json!({
                "q": ["Guerra y paz", "La guerra sigue"],
                "source": "es",
                "target": "en",
                "format": "text"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "translations": [
                    { "translatedText": "War and peace" },
                    { "translatedText": "The war continues" }
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let out = translator(&server)
            .await
            .translate_batch(&titles(&["Guerra y paz", "La guerra sigue"]))
            .await
            .unwrap();
        assert_eq!(out, vec!["War and peace", "The war continues"]);
    }

    #[tokio::test]
    async fn test_missing_translated_text_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "translations": [ { "detectedSourceLanguage": "es" } ] }
            })))
            .mount(&server)
            .await;

        let out = translator(&server)
            .await
            .translate_batch(&titles(&["Hola"]))
            .await
            .unwrap();
        assert_eq!(out, vec![String::new()]);
    }

    #[tokio::test]
    async fn test_count_mismatch_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "translations": [ { "translatedText": "Only one" } ] }
            })))
            .mount(&server)
            .await;

        let err = translator(&server)
            .await
            .translate_batch(&titles(&["uno", "dos"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TranslationError::CountMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let server = MockServer::start().await;
        let denied = r#"{"error":{"message":"API key not valid"}}"#;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string(denied))
            .mount(&server)
            .await;

        let err = translator(&server)
            .await
            .translate_batch(&titles(&["uno"]))
            .await
            .unwrap_err();
        match err {
            TranslationError::Status { status, body } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert!(body.contains("API key not valid"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_payload_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = translator(&server)
            .await
            .translate_batch(&titles(&["uno"]))
            .await
            .unwrap_err();
        assert!(matches!(err, TranslationError::Malformed { .. }));
    }
}
