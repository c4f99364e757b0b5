use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::future::try_join_all;
use log::{debug, warn};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::app_config::NarrationConfig;
use crate::errors::ProviderError;
use crate::language_utils;
use crate::media::ffmpeg::probe_media_duration;
use crate::providers::NarrationProvider;
use crate::text::pack_sentences;

/// Client for the public Google Translate text-to-speech endpoint.
///
/// The endpoint only accepts short inputs, so the text is packed into
/// sentence chunks, every chunk is requested concurrently and the MP3
/// buffers are concatenated in order.
#[derive(Debug, Clone)]
pub struct GoogleTts {
    /// TTS endpoint
    endpoint: String,
    /// HTTP client for making requests
    client: Client,
    /// Longest chunk sent in one request
    max_chunk_chars: usize,
    /// Request the slow speaking rate
    slow: bool,
    /// Duration reported when an audio file cannot be probed
    default_duration_secs: f64,
    /// ffprobe executable used for measuring
    ffprobe_path: String,
    /// Timeout for one ffprobe run
    probe_timeout: Duration,
}

impl GoogleTts {
    /// Create a client from the narration settings
    pub fn new(config: &NarrationConfig, ffprobe_path: impl Into<String>, probe_timeout: Duration) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            max_chunk_chars: config.max_chunk_chars,
            slow: config.slow,
            default_duration_secs: config.default_duration_secs,
            ffprobe_path: ffprobe_path.into(),
            probe_timeout,
        }
    }

    /// Request URL for one chunk
    pub fn chunk_url(&self, chunk: &str, language: &str) -> Result<Url, ProviderError> {
        let speed = if self.slow { "0.24" } else { "1" };
        let text_len = chunk.chars().count().to_string();

        Url::parse_with_params(
            &self.endpoint,
            &[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", language),
                ("total", "1"),
                ("idx", "0"),
                ("textlen", text_len.as_str()),
                ("client", "tw-ob"),
                ("prev", "input"),
                ("ttsspeed", speed),
            ],
        )
        .map_err(|e| ProviderError::RequestFailed(format!("Invalid TTS endpoint {}: {}", self.endpoint, e)))
    }

    async fn fetch_chunk(&self, url: Url) -> Result<Bytes, ProviderError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(ProviderError::EmptyResponse("TTS returned no audio".to_string()));
        }
        Ok(audio)
    }
}

#[async_trait]
impl NarrationProvider for GoogleTts {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Bytes, ProviderError> {
        let language = language_utils::provider_language_code(language)
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let chunks = pack_sentences(text, self.max_chunk_chars);
        if chunks.is_empty() {
            return Err(ProviderError::RequestFailed("Nothing to synthesize".to_string()));
        }
        debug!("Synthesizing {} TTS chunk(s) in {}", chunks.len(), language);

        let urls = chunks
            .iter()
            .map(|chunk| self.chunk_url(chunk, &language))
            .collect::<Result<Vec<_>, _>>()?;
        let buffers = try_join_all(urls.into_iter().map(|url| self.fetch_chunk(url))).await?;

        let mut audio = BytesMut::with_capacity(buffers.iter().map(Bytes::len).sum());
        for buffer in &buffers {
            audio.extend_from_slice(buffer);
        }
        Ok(audio.freeze())
    }

    async fn measure_duration(&self, audio: &Path) -> f64 {
        match probe_media_duration(&self.ffprobe_path, audio, self.probe_timeout).await {
            Ok(duration) if duration > 0.0 => duration,
            Ok(_) => {
                warn!("Narration {:?} reports no duration, using {}s", audio, self.default_duration_secs);
                self.default_duration_secs
            }
            Err(e) => {
                warn!("Could not measure narration {:?}, using {}s: {}", audio, self.default_duration_secs, e);
                self.default_duration_secs
            }
        }
    }
}
