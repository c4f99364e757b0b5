use anyhow::{anyhow, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration module
/// This module handles the pipeline configuration: collaborator endpoints,
/// fixed assets (avatar poses, default background), frame layout and the
/// temp directory. The whole struct is immutable once a pipeline is built.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Language used when a request does not name one
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Language the heritage records are written in
    #[serde(default = "default_native_language")]
    pub native_language: String,

    /// Target language value meaning "use the record's own language"
    #[serde(default = "default_local_language_sentinel")]
    pub local_language_sentinel: String,

    /// Maximum characters of record text fed to the pipeline
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// How every text unit of a run is rendered
    #[serde(default)]
    pub render_strategy: RenderStrategy,

    /// Segments rendered at the same time (order is always preserved)
    #[serde(default = "default_render_concurrency")]
    pub render_concurrency: usize,

    /// Caption translations in flight at the same time
    #[serde(default = "default_translation_concurrency")]
    pub translation_concurrency: usize,

    /// Narration (TTS) settings
    #[serde(default)]
    pub narration: NarrationConfig,

    /// Caption translation settings
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Avatar and background image settings
    #[serde(default)]
    pub assets: AssetConfig,

    /// Transcoder and frame layout settings
    #[serde(default)]
    pub media: MediaConfig,

    /// Caption text settings
    #[serde(default)]
    pub caption: CaptionConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Segment rendering strategy, fixed for a whole run
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RenderStrategy {
    /// Composited, encoded clip per unit (moving background, overlay filters)
    #[default]
    Clip,
    /// One still image per unit, held for the unit's duration
    Still,
}

impl std::fmt::Display for RenderStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clip => write!(f, "clip"),
            Self::Still => write!(f, "still"),
        }
    }
}

impl std::str::FromStr for RenderStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "clip" | "a" => Ok(Self::Clip),
            "still" | "b" => Ok(Self::Still),
            _ => Err(anyhow!("Invalid render strategy: {}", s)),
        }
    }
}

/// Caption translation backend
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationBackend {
    // @provider: Public Google Translate endpoint
    #[default]
    Google,
    // @provider: No translation, captions and narration keep the input text
    None,
}

impl TranslationBackend {
    // @returns: Capitalized backend name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Google => "Google Translate",
            Self::None => "No translation",
        }
    }
}

impl std::fmt::Display for TranslationBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Google => write!(f, "google"),
            Self::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for TranslationBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "none" | "off" => Ok(Self::None),
            _ => Err(anyhow!("Invalid translation backend: {}", s)),
        }
    }
}

/// Narration (TTS) configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NarrationConfig {
    /// TTS endpoint URL
    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,

    /// Longest text chunk sent in one TTS request
    #[serde(default = "default_tts_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Duration assumed when the narration cannot be measured
    #[serde(default = "default_narration_duration_secs")]
    pub default_duration_secs: f64,

    /// Request the slow speaking rate
    #[serde(default)]
    pub slow: bool,

    /// Translate the whole text to the target language before synthesis
    #[serde(default = "default_true")]
    pub translate_text: bool,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_tts_endpoint(),
            max_chunk_chars: default_tts_chunk_chars(),
            timeout_secs: default_timeout_secs(),
            default_duration_secs: default_narration_duration_secs(),
            slow: false,
            translate_text: true,
        }
    }
}

/// Translation configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Backend to use
    #[serde(default)]
    pub provider: TranslationBackend,

    /// Service endpoint URL
    #[serde(default = "default_translate_endpoint")]
    pub endpoint: String,

    /// Longest text chunk sent in one translation request
    #[serde(default = "default_translate_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationBackend::default(),
            endpoint: default_translate_endpoint(),
            max_chunk_chars: default_translate_chunk_chars(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Fixed image assets
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AssetConfig {
    /// Ordered avatar pose images; unit `i` uses pose `i mod len`
    #[serde(default = "default_avatar_urls")]
    pub avatar_urls: Vec<String>,

    /// Background used when a request has no image or its image cannot be fetched
    #[serde(default = "default_image_url")]
    pub default_image_url: String,

    /// Download attempts per image URL
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            avatar_urls: default_avatar_urls(),
            default_image_url: default_image_url(),
            fetch_attempts: default_fetch_attempts(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Transcoder and frame layout configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MediaConfig {
    /// ffmpeg executable
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// ffprobe executable
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// Temp directory shared by all runs of the process
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Output frame width in pixels
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,

    /// Output frame height in pixels
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,

    /// Output frame rate
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Avatar width after scaling (height keeps the aspect ratio)
    #[serde(default = "default_avatar_width")]
    pub avatar_width: u32,

    /// Avatar left edge
    #[serde(default = "default_avatar_x")]
    pub avatar_x: u32,

    /// Avatar top edge
    #[serde(default = "default_avatar_y")]
    pub avatar_y: u32,

    /// Placeholder background colour as RGB hex (`303030`)
    #[serde(default = "default_placeholder_color")]
    pub placeholder_color: String,

    /// Timeout for one ffmpeg/ffprobe invocation in seconds
    #[serde(default = "default_encode_timeout_secs")]
    pub encode_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            temp_dir: None,
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            frame_rate: default_frame_rate(),
            avatar_width: default_avatar_width(),
            avatar_x: default_avatar_x(),
            avatar_y: default_avatar_y(),
            placeholder_color: default_placeholder_color(),
            encode_timeout_secs: default_encode_timeout_secs(),
        }
    }
}

impl MediaConfig {
    /// Temp directory, `<system temp>/OcityTemp` unless configured
    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("OcityTemp"))
    }

    /// Placeholder colour as RGB bytes
    pub fn placeholder_rgb(&self) -> Result<[u8; 3]> {
        parse_hex_rgb(&self.placeholder_color)
    }
}

/// Caption configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptionConfig {
    /// TrueType/OpenType font used to measure and draw captions
    #[serde(default)]
    pub font_file: Option<PathBuf>,

    /// Font family handed to the transcoder when no font file is set
    #[serde(default = "default_font_family")]
    pub font_family: String,

    /// Font size in pixels
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// Width of the caption text box in pixels
    #[serde(default = "default_caption_max_width")]
    pub max_width: f32,

    /// Extra space between caption lines in pixels
    #[serde(default = "default_line_spacing")]
    pub line_spacing: u32,

    /// Padding of the caption box around the text in pixels
    #[serde(default = "default_box_border")]
    pub box_border: u32,

    /// Gap between the caption block and the bottom edge in pixels
    #[serde(default = "default_bottom_margin")]
    pub bottom_margin: u32,

    /// Opacity of the black caption box (0.0 to 1.0)
    #[serde(default = "default_box_opacity")]
    pub box_opacity: f32,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            font_file: None,
            font_family: default_font_family(),
            font_size: default_font_size(),
            max_width: default_caption_max_width(),
            line_spacing: default_line_spacing(),
            box_border: default_box_border(),
            bottom_margin: default_bottom_margin(),
            box_opacity: default_box_opacity(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching `log` filter
    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

fn parse_hex_rgb(value: &str) -> Result<[u8; 3]> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!("Invalid RGB hex colour: {}", value));
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

fn default_language() -> String {
    "es".to_string()
}

fn default_native_language() -> String {
    "es".to_string()
}

fn default_local_language_sentinel() -> String {
    "local".to_string()
}

fn default_max_text_chars() -> usize {
    130_000
}

fn default_render_concurrency() -> usize {
    1
}

fn default_translation_concurrency() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_tts_endpoint() -> String {
    "https://translate.google.com/translate_tts".to_string()
}

fn default_tts_chunk_chars() -> usize {
    // Longest text the TTS endpoint accepts in one request
    200
}

fn default_narration_duration_secs() -> f64 {
    5.0
}

fn default_translate_endpoint() -> String {
    "https://translate.googleapis.com/translate_a/single".to_string()
}

fn default_translate_chunk_chars() -> usize {
    4500
}

fn default_avatar_urls() -> Vec<String> {
    vec![
        "https://facturacion-electronica.ec/wp-content/uploads/2019/04/scratching_head_pc_800_clr_2723.png".to_string(),
        "https://pbs.twimg.com/media/BqQ5S0iCQAACkRA.png".to_string(),
    ]
}

fn default_image_url() -> String {
    "https://res.cloudinary.com/worldpackers/image/upload/c_limit,f_auto,q_auto,w_1140/ywx1rgzx6zwpavg3db1f".to_string()
}

fn default_fetch_attempts() -> u32 {
    2
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_frame_width() -> u32 {
    800
}

fn default_frame_height() -> u32 {
    600
}

fn default_frame_rate() -> u32 {
    30
}

fn default_avatar_width() -> u32 {
    300
}

fn default_avatar_x() -> u32 {
    500
}

fn default_avatar_y() -> u32 {
    200
}

fn default_placeholder_color() -> String {
    "303030".to_string()
}

fn default_encode_timeout_secs() -> u64 {
    300
}

fn default_font_family() -> String {
    "DejaVu Sans".to_string()
}

fn default_font_size() -> f32 {
    36.0
}

fn default_caption_max_width() -> f32 {
    700.0
}

fn default_line_spacing() -> u32 {
    15
}

fn default_box_border() -> u32 {
    10
}

fn default_bottom_margin() -> u32 {
    20
}

fn default_box_opacity() -> f32 {
    0.5
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::provider_language_code(&self.default_language)
            .map_err(|e| anyhow!("default_language: {}", e))?;
        crate::language_utils::provider_language_code(&self.native_language)
            .map_err(|e| anyhow!("native_language: {}", e))?;

        if self.local_language_sentinel.trim().is_empty() {
            return Err(anyhow!("local_language_sentinel must not be empty"));
        }
        if self.max_text_chars == 0 {
            return Err(anyhow!("max_text_chars must be positive"));
        }
        if self.render_concurrency == 0 || self.translation_concurrency == 0 {
            return Err(anyhow!("render_concurrency and translation_concurrency must be at least 1"));
        }

        if self.narration.max_chunk_chars < 2 {
            return Err(anyhow!("narration.max_chunk_chars must be at least 2"));
        }
        if !(self.narration.default_duration_secs.is_finite() && self.narration.default_duration_secs > 0.0) {
            return Err(anyhow!("narration.default_duration_secs must be a positive number"));
        }
        if self.translation.provider == TranslationBackend::Google && self.translation.max_chunk_chars == 0 {
            return Err(anyhow!("translation.max_chunk_chars must be positive"));
        }

        if self.assets.avatar_urls.iter().all(|url| url.trim().is_empty()) {
            return Err(anyhow!("At least one avatar URL is required"));
        }
        if self.assets.default_image_url.trim().is_empty() {
            return Err(anyhow!("assets.default_image_url must not be empty"));
        }
        if self.assets.fetch_attempts == 0 {
            return Err(anyhow!("assets.fetch_attempts must be at least 1"));
        }

        let media = &self.media;
        if media.frame_width == 0 || media.frame_height == 0 {
            return Err(anyhow!("Frame width/height must be non-zero"));
        }
        if media.frame_width % 2 != 0 || media.frame_height % 2 != 0 {
            // yuv420p output needs even dimensions
            return Err(anyhow!("Frame width/height must be even"));
        }
        if media.frame_rate == 0 {
            return Err(anyhow!("Frame rate must be non-zero"));
        }
        if media.avatar_width == 0 || media.avatar_width > media.frame_width {
            return Err(anyhow!("Avatar width must be between 1 and the frame width"));
        }
        media.placeholder_rgb()?;

        let caption = &self.caption;
        if !(caption.font_size > 0.0) {
            return Err(anyhow!("Caption font size must be positive"));
        }
        if !(caption.max_width > 0.0) || caption.max_width > media.frame_width as f32 {
            return Err(anyhow!("Caption max width must be between 1 and the frame width"));
        }
        if !(0.0..=1.0).contains(&caption.box_opacity) {
            return Err(anyhow!("Caption box opacity must be between 0 and 1"));
        }
        if let Some(font_file) = &caption.font_file {
            if !font_file.is_file() {
                return Err(anyhow!("Caption font file not found: {}", font_file.display()));
            }
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            default_language: default_language(),
            native_language: default_native_language(),
            local_language_sentinel: default_local_language_sentinel(),
            max_text_chars: default_max_text_chars(),
            render_strategy: RenderStrategy::default(),
            render_concurrency: default_render_concurrency(),
            translation_concurrency: default_translation_concurrency(),
            narration: NarrationConfig::default(),
            translation: TranslationConfig::default(),
            assets: AssetConfig::default(),
            media: MediaConfig::default(),
            caption: CaptionConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
