/*!
 * Mock provider implementations for testing.
 *
 * These mocks let the pipeline run without network access:
 * - `MockNarrator::working(secs)` - Returns fixed audio bytes and a fixed duration
 * - `MockNarrator::failing()` - Synthesis always fails
 * - `MockTranslator::tagging()` - Prefixes text with the target language
 * - `MockTranslator::failing()` - Translation always fails
 * - `MockImageSource` - Serves registered URLs, answers 404 for the rest
 */

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::providers::{ImageSource, NarrationProvider, TranslationProvider};

/// Behavior mode for the mock narrator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NarratorBehavior {
    /// Always succeeds and reports the given duration
    Working { duration_secs: f64 },
    /// Synthesis always fails with an API error
    Failing,
}

/// Mock text-to-speech provider
#[derive(Debug, Clone)]
pub struct MockNarrator {
    /// Behavior mode
    behavior: NarratorBehavior,
    /// (text, language) of every synthesize call
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockNarrator {
    pub fn new(behavior: NarratorBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Narrator whose audio always lasts `duration_secs`
    pub fn working(duration_secs: f64) -> Self {
        Self::new(NarratorBehavior::Working { duration_secs })
    }

    /// Narrator that always fails to synthesize
    pub fn failing() -> Self {
        Self::new(NarratorBehavior::Failing)
    }

    /// Recorded synthesize calls
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl NarrationProvider for MockNarrator {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Bytes, ProviderError> {
        self.calls.lock().push((text.to_string(), language.to_string()));
        match self.behavior {
            NarratorBehavior::Working { .. } => Ok(Bytes::from_static(b"ID3mock-narration")),
            NarratorBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 503,
                message: "Mock TTS unavailable".to_string(),
            }),
        }
    }

    async fn measure_duration(&self, _audio: &Path) -> f64 {
        match self.behavior {
            NarratorBehavior::Working { duration_secs } => duration_secs,
            NarratorBehavior::Failing => 5.0,
        }
    }
}

/// Behavior mode for the mock translator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TranslatorBehavior {
    /// Returns `[<target>] <text>`
    Tagging,
    /// Returns the text unchanged
    Identity,
    /// Always fails with a connection error
    Failing,
}

/// Mock translation provider
#[derive(Debug, Clone)]
pub struct MockTranslator {
    /// Behavior mode
    behavior: TranslatorBehavior,
    /// Request counter
    request_count: Arc<AtomicUsize>,
}

impl MockTranslator {
    pub fn new(behavior: TranslatorBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Translator that tags text with the target language
    pub fn tagging() -> Self {
        Self::new(TranslatorBehavior::Tagging)
    }

    /// Translator that returns its input
    pub fn identity() -> Self {
        Self::new(TranslatorBehavior::Identity)
    }

    /// Translator that always fails
    pub fn failing() -> Self {
        Self::new(TranslatorBehavior::Failing)
    }

    /// Number of translate calls so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationProvider for MockTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            TranslatorBehavior::Tagging => Ok(format!("[{}] {}", target_language, text)),
            TranslatorBehavior::Identity => Ok(text.to_string()),
            TranslatorBehavior::Failing => Err(ProviderError::ConnectionError(
                "Mock translator offline".to_string(),
            )),
        }
    }
}

/// Mock image server keyed by URL
#[derive(Debug, Clone, Default)]
pub struct MockImageSource {
    /// Registered images
    images: Arc<Mutex<HashMap<String, Bytes>>>,
    /// Fetch count per URL
    fetches: Arc<Mutex<HashMap<String, usize>>>,
}

impl MockImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` at `url`
    pub fn with_image(self, url: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        self.images.lock().insert(url.into(), bytes.into());
        self
    }

    /// How many times `url` was requested
    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ImageSource for MockImageSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, ProviderError> {
        *self.fetches.lock().entry(url.to_string()).or_insert(0) += 1;
        match self.images.lock().get(url) {
            Some(bytes) if bytes.is_empty() => Err(ProviderError::EmptyResponse(format!("No image data at {}", url))),
            Some(bytes) => Ok(bytes.clone()),
            None => Err(ProviderError::ApiError {
                status_code: 404,
                message: format!("Not found: {}", url),
            }),
        }
    }
}

/// Encode a solid-colour PNG
pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Bytes {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageFormat::Png)
        .expect("encoding an in-memory PNG cannot fail");
    Bytes::from(buffer.into_inner())
}

/// Encode a GIF with `frames` solid frames of alternating colours
pub fn gif_bytes(width: u32, height: u32, frames: usize) -> Bytes {
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, Rgba, RgbaImage};

    let mut buffer = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buffer);
        for i in 0..frames {
            let shade = if i % 2 == 0 { 0 } else { 255 };
            let frame = Frame::from_parts(
                RgbaImage::from_pixel(width, height, Rgba([shade, shade, shade, 255])),
                0,
                0,
                Delay::from_numer_denom_ms(100, 1),
            );
            encoder
                .encode_frame(frame)
                .expect("encoding an in-memory GIF cannot fail");
        }
    }
    Bytes::from(buffer)
}
