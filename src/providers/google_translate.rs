use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::app_config::TranslationConfig;
use crate::errors::ProviderError;
use crate::language_utils;
use crate::providers::TranslationProvider;
use crate::text::pack_sentences;

/// Client for the public Google Translate `translate_a/single` endpoint.
///
/// The source language is auto-detected. Long texts are sent in sentence
/// packed chunks one after another and the results joined with spaces.
#[derive(Debug, Clone)]
pub struct GoogleTranslate {
    /// Service endpoint
    endpoint: String,
    /// HTTP client for making requests
    client: Client,
    /// Longest chunk sent in one request
    max_chunk_chars: usize,
}

impl GoogleTranslate {
    /// Create a client from the translation settings
    pub fn new(config: &TranslationConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            max_chunk_chars: config.max_chunk_chars,
        }
    }

    async fn translate_chunk(&self, chunk: &str, target_language: &str) -> Result<String, ProviderError> {
        let url = Url::parse_with_params(
            &self.endpoint,
            &[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target_language),
                ("dt", "t"),
                ("q", chunk),
            ],
        )
        .map_err(|e| ProviderError::RequestFailed(format!("Invalid translate endpoint {}: {}", self.endpoint, e)))?;

        let response = self.client.get(url).send().await?.error_for_status()?;
        let body: Value = response.json().await?;
        parse_translation(&body)
    }
}

/// Join the translated segments of a `translate_a/single` response.
///
/// The payload is a nested array whose first element lists
/// `[translated, original, ...]` pairs.
pub fn parse_translation(body: &Value) -> Result<String, ProviderError> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::ParseError("Missing translation segments".to_string()))?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    if translated.trim().is_empty() {
        return Err(ProviderError::EmptyResponse("Translation was empty".to_string()));
    }
    Ok(translated)
}

#[async_trait]
impl TranslationProvider for GoogleTranslate {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ProviderError> {
        let target = language_utils::provider_language_code(target_language)
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let chunks = pack_sentences(text, self.max_chunk_chars);
        debug!("Translating {} chunk(s) to {}", chunks.len(), target);

        let mut parts = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            parts.push(self.translate_chunk(chunk, &target).await?);
        }
        Ok(parts.join(" "))
    }
}
