/*!
 * # ocity - narrated heritage videos
 *
 * A Rust library that turns free text and a background image into a short
 * narrated video with translated captions and an avatar that changes pose
 * with every sentence.
 *
 * ## Features
 *
 * - Sentence segmentation with proportional timing against the real narration length
 * - Text to speech and caption translation through pluggable providers
 * - Two segment strategies: encoded clips (ffmpeg filter graphs) or composed stills
 * - Deterministic concatenation and muxing into one MP4
 * - Heritage record and batch entry points
 * - Run-scoped temp files released on every exit path
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `text`: Sentence splitting, duration allocation, caption wrapping and fonts
 * - `providers`: Narration, translation and image download clients:
 *   - `providers::google_tts`: Google Translate TTS client
 *   - `providers::google_translate`: Google Translate client
 *   - `providers::http_image`: HTTP image downloads
 *   - `providers::mock`: Offline providers for tests
 * - `media`: Segment rendering, ffmpeg invocation and assembly
 * - `pipeline`: The orchestrator and the heritage record format
 * - `file_utils`: Temp directory and run-scoped temp files
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod media;
pub mod pipeline;
pub mod providers;
pub mod text;

// Re-export main types for easier usage
pub use app_config::{Config, RenderStrategy};
pub use errors::{ErrorKind, PipelineError, ProviderError};
pub use media::FinalArtifact;
pub use pipeline::{HeritageRecord, LengthVariant, VideoPipeline, VideoResponse};
pub use text::{allocate_durations, split_sentences};
