/*!
 * Tests for provider implementations that run without network access
 */

use serde_json::json;
use std::path::Path;
use std::time::Duration;

use ocity::app_config::NarrationConfig;
use ocity::errors::ProviderError;
use ocity::providers::google_translate::parse_translation;
use ocity::providers::{
    translate_or_original, GoogleTts, MockNarrator, MockTranslator, NarrationProvider, PassthroughTranslator,
    TranslationProvider,
};

/// Test that a failing translator leaves the text untouched
#[tokio::test]
async fn test_translateOrOriginal_withFailingTranslator_shouldKeepText() {
    let translator = MockTranslator::failing();
    let text = translate_or_original(&translator, "Hola mundo.", "en").await;

    assert_eq!(text, "Hola mundo.");
    assert_eq!(translator.request_count(), 1);
}

/// Test that blank text never reaches the translator
#[tokio::test]
async fn test_translateOrOriginal_withBlankText_shouldSkipTranslator() {
    let translator = MockTranslator::tagging();
    let text = translate_or_original(&translator, "  ", "en").await;

    assert_eq!(text, "  ");
    assert_eq!(translator.request_count(), 0);
}

/// Test that the passthrough translator returns its input
#[tokio::test]
async fn test_passthroughTranslator_shouldReturnInput() {
    let text = PassthroughTranslator.translate("Bonjour", "es").await.unwrap();
    assert_eq!(text, "Bonjour");
}

/// Test that the mock narrator records calls and reports its duration
#[tokio::test]
async fn test_mockNarrator_working_shouldRecordCalls() {
    let narrator = MockNarrator::working(3.5);
    let audio = narrator.synthesize("Hello.", "en").await.unwrap();

    assert!(!audio.is_empty());
    assert_eq!(narrator.measure_duration(Path::new("/tmp/none.mp3")).await, 3.5);
    assert_eq!(narrator.calls(), vec![("Hello.".to_string(), "en".to_string())]);
}

/// Test that the Google translate payload is joined segment by segment
#[test]
fn test_parseTranslation_withSegments_shouldJoinThem() {
    let body = json!([[["Good morning. ", "Buenos días. ", null], ["Welcome.", "Bienvenidos.", null]], null, "es"]);
    assert_eq!(parse_translation(&body).unwrap(), "Good morning. Welcome.");
}

/// Test that an empty translation payload is rejected
#[test]
fn test_parseTranslation_withEmptySegments_shouldBeEmptyResponse() {
    let body = json!([[], null, "es"]);
    assert!(matches!(parse_translation(&body), Err(ProviderError::EmptyResponse(_))));
}

/// Test that the TTS request carries the text, language and length
#[test]
fn test_googleTts_chunkUrl_shouldCarryQueryParameters() {
    let tts = GoogleTts::new(&NarrationConfig::default(), "ffprobe", Duration::from_secs(1));
    let url = tts.chunk_url("¿Qué tal?", "es").unwrap();
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

    assert!(pairs.contains(&("q".to_string(), "¿Qué tal?".to_string())));
    assert!(pairs.contains(&("tl".to_string(), "es".to_string())));
    assert!(pairs.contains(&("textlen".to_string(), "9".to_string())));
    assert!(pairs.contains(&("client".to_string(), "tw-ob".to_string())));
}

/// Test that blank narration text fails before any request
#[tokio::test]
async fn test_googleTts_synthesize_withBlankText_shouldFail() {
    let tts = GoogleTts::new(&NarrationConfig::default(), "ffprobe", Duration::from_secs(1));
    let result = tts.synthesize("   ", "es").await;
    assert!(matches!(result, Err(ProviderError::RequestFailed(_))));
}

/// Test that an unmeasurable narration falls back to the default duration
#[tokio::test]
async fn test_googleTts_measureDuration_withoutProbe_shouldUseDefault() {
    let tts = GoogleTts::new(
        &NarrationConfig::default(),
        "/nonexistent/ffprobe",
        Duration::from_secs(1),
    );
    let duration = tts.measure_duration(Path::new("/nonexistent/narration.mp3")).await;
    assert_eq!(duration, 5.0);
}
