/*!
 * Upstream collaborators of the video pipeline.
 *
 * Each external service sits behind an async trait so the pipeline can be
 * driven by real HTTP clients or by the in-crate mocks:
 * - `NarrationProvider`: text to speech (`google_tts`)
 * - `TranslationProvider`: caption and narration translation (`google_translate`)
 * - `ImageSource`: background and avatar downloads (`http_image`)
 */

use async_trait::async_trait;
use bytes::Bytes;
use log::warn;
use std::fmt::Debug;
use std::path::Path;

use crate::errors::ProviderError;

/// Text to speech.
///
/// Synthesis failures are fatal for a run. Measuring never fails: an audio
/// file that cannot be probed gets the provider's default duration.
#[async_trait]
pub trait NarrationProvider: Send + Sync + Debug {
    /// Synthesize `text` spoken in `language` into one encoded audio buffer
    async fn synthesize(&self, text: &str, language: &str) -> Result<Bytes, ProviderError>;

    /// Playback duration in seconds of an audio file previously written from `synthesize`
    async fn measure_duration(&self, audio: &Path) -> f64;
}

/// Text translation
#[async_trait]
pub trait TranslationProvider: Send + Sync + Debug {
    /// Translate `text` into `target_language`
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ProviderError>;
}

/// Translate, falling back to the original text on any failure
pub async fn translate_or_original(
    translator: &dyn TranslationProvider,
    text: &str,
    target_language: &str,
) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }
    match translator.translate(text, target_language).await {
        Ok(translated) if !translated.trim().is_empty() => translated,
        Ok(_) => {
            warn!("Empty translation to {}, keeping original text", target_language);
            text.to_string()
        }
        Err(e) => {
            warn!("Translation to {} failed, keeping original text: {}", target_language, e);
            text.to_string()
        }
    }
}

/// Remote image download
#[async_trait]
pub trait ImageSource: Send + Sync + Debug {
    /// Download the image at `url`
    async fn fetch(&self, url: &str) -> Result<Bytes, ProviderError>;

    /// Whether the bytes hold a multi-frame animation
    fn is_animated(&self, bytes: &[u8]) -> bool {
        crate::media::assets::is_animated_gif(bytes)
    }
}

pub mod google_translate;
pub mod google_tts;
pub mod http_image;
pub mod mock;

pub use google_translate::GoogleTranslate;
pub use google_tts::GoogleTts;
pub use http_image::HttpImageSource;
pub use mock::{MockImageSource, MockNarrator, MockTranslator};

/// A translator that returns its input unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTranslator;

#[async_trait]
impl TranslationProvider for PassthroughTranslator {
    async fn translate(&self, text: &str, _target_language: &str) -> Result<String, ProviderError> {
        Ok(text.to_string())
    }
}
