use anyhow::{Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::app_config::{Config, TranslationBackend};
use crate::errors::PipelineError;
use crate::file_utils::{RunScope, TempWorkspace};
use crate::language_utils;
use crate::media::assembler::MediaAssembler;
use crate::media::assets::{resolve_avatars, resolve_background, ResolvedAssets};
use crate::media::ffmpeg::{FfmpegTranscoder, Transcoder};
use crate::media::renderer::{FrameLayout, SegmentRenderer};
use crate::media::{FinalArtifact, NarrationAsset};
use crate::pipeline::record::{is_local_language, resolve_language, truncate_text, HeritageRecord, LengthVariant};
use crate::providers::{
    translate_or_original, GoogleTranslate, GoogleTts, HttpImageSource, ImageSource, NarrationProvider,
    PassthroughTranslator, TranslationProvider,
};
use crate::text::{allocate_durations, build_timeline, split_sentences, CaptionFont};

/// Lifecycle of one pipeline invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    NarrationReady,
    SegmentsReady,
    Assembled,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::NarrationReady => "narration-ready",
            Self::SegmentsReady => "segments-ready",
            Self::Assembled => "assembled",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Logs state transitions of one run under a short run id
#[derive(Debug)]
struct RunTracker {
    id: String,
    state: RunState,
}

impl RunTracker {
    fn start() -> Self {
        let id = Uuid::new_v4().simple().to_string()[..8].to_string();
        debug!("[run {}] {}", id, RunState::Idle);
        Self { id, state: RunState::Idle }
    }

    fn advance(&mut self, next: RunState) {
        debug!("[run {}] {} -> {}", self.id, self.state, next);
        self.state = next;
    }
}

/// JSON shape of a pipeline outcome, mirroring the HTTP responses of the service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideoResponse {
    pub fn success(video_url: impl Into<String>, video_count: Option<usize>) -> Self {
        Self {
            success: true,
            video_url: Some(video_url.into()),
            video_count,
            error: None,
        }
    }

    /// Failure payload and the status code it would be served with
    pub fn failure(error: &PipelineError) -> (u16, Self) {
        (
            error.status_code(),
            Self {
                success: false,
                video_url: None,
                video_count: None,
                error: Some(error.to_string()),
            },
        )
    }
}

/// The narrated video pipeline.
///
/// Holds its collaborators and an immutable configuration; every call is an
/// independent run with its own temp scope, so one pipeline may serve
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct VideoPipeline {
    config: Arc<Config>,
    narrator: Arc<dyn NarrationProvider>,
    translator: Arc<dyn TranslationProvider>,
    images: Arc<dyn ImageSource>,
    transcoder: Arc<dyn Transcoder>,
    assembler: MediaAssembler,
    workspace: TempWorkspace,
    layout: Arc<FrameLayout>,
    font: Option<Arc<CaptionFont>>,
}

impl VideoPipeline {
    /// Build a pipeline from explicit collaborators
    pub fn new(
        config: Config,
        narrator: Arc<dyn NarrationProvider>,
        translator: Arc<dyn TranslationProvider>,
        images: Arc<dyn ImageSource>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let layout = Arc::new(FrameLayout::from_config(&config)?);
        let font = match &config.caption.font_file {
            Some(path) => Some(CaptionFont::load(path, config.caption.font_size)?),
            None => CaptionFont::discover(None, config.caption.font_size),
        };
        match &font {
            Some(font) => debug!("Caption font: {:?}", font.path()),
            None => warn!("No caption font found, still frames will carry caption boxes without text"),
        }

        let workspace = TempWorkspace::new(config.media.resolved_temp_dir());
        let assembler = MediaAssembler::new(Arc::clone(&transcoder), config.media.frame_rate);

        Ok(Self {
            config: Arc::new(config),
            narrator,
            translator,
            images,
            transcoder,
            assembler,
            workspace,
            layout,
            font: font.map(Arc::new),
        })
    }

    /// Build a pipeline with the HTTP providers and ffmpeg
    pub fn from_config(config: Config) -> Result<Self> {
        let probe_timeout = Duration::from_secs(config.media.encode_timeout_secs);
        let narrator: Arc<dyn NarrationProvider> = Arc::new(GoogleTts::new(
            &config.narration,
            config.media.ffprobe_path.clone(),
            probe_timeout,
        ));
        let translator: Arc<dyn TranslationProvider> = match config.translation.provider {
            TranslationBackend::Google => Arc::new(GoogleTranslate::new(&config.translation)),
            TranslationBackend::None => Arc::new(PassthroughTranslator),
        };
        info!("Translation backend: {}", config.translation.provider.display_name());
        let images: Arc<dyn ImageSource> = Arc::new(HttpImageSource::new(&config.assets));
        let transcoder: Arc<dyn Transcoder> = Arc::new(FfmpegTranscoder::from_config(&config.media));

        Self::new(config, narrator, translator, images, transcoder)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn workspace(&self) -> &TempWorkspace {
        &self.workspace
    }

    /// Narrate `text` over `image_ref` with captions in `language`
    pub async fn generate_video(
        &self,
        text: &str,
        image_ref: Option<&str>,
        language: &str,
    ) -> Result<FinalArtifact, PipelineError> {
        self.generate(text, image_ref, language, true).await
    }

    async fn generate(
        &self,
        text: &str,
        image_ref: Option<&str>,
        language: &str,
        translate: bool,
    ) -> Result<FinalArtifact, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::InvalidInput("text is required".to_string()));
        }
        let language = language_utils::provider_language_code(language)
            .map_err(|e| PipelineError::InvalidInput(e.to_string()))?;

        self.workspace.ensure().await?;
        let scope = self.workspace.scope();
        let mut tracker = RunTracker::start();
        let language_name = language_utils::get_language_name(&language).unwrap_or_else(|_| language.clone());
        info!(
            "[run {}] Generating video for {} chars in {} ({})",
            tracker.id,
            text.chars().count(),
            language_name,
            language
        );

        let result = self.run(&mut tracker, text, image_ref, &language, translate, &scope).await;
        self.finish(&mut tracker, scope, result)
    }

    /// Narrate one heritage record
    pub async fn generate_video_from_record(
        &self,
        record: &HeritageRecord,
        target_language: &str,
        variant: LengthVariant,
    ) -> Result<FinalArtifact, PipelineError> {
        let text = record.text_for(variant)?;
        let text = truncate_text(text, self.config.max_text_chars);
        let image = record.resolve_image(&self.config.assets.default_image_url);
        let sentinel = &self.config.local_language_sentinel;
        let language = resolve_language(target_language, sentinel, &self.config.native_language);
        // Record text is already in the native language
        let translate = !is_local_language(target_language, sentinel);
        debug!("Record {} -> {} chars, image {}, language {}", record.label(), text.chars().count(), image, language);

        self.generate(&text, Some(&image), language, translate).await
    }

    /// Narrate every record in order and join the videos into one
    pub async fn generate_multi_video_from_records(
        &self,
        records: &[HeritageRecord],
        target_language: &str,
        variant: LengthVariant,
    ) -> Result<FinalArtifact, PipelineError> {
        self.generate_multi_video_with_progress(records, target_language, variant, |_| {})
            .await
    }

    /// Like `generate_multi_video_from_records`, calling `on_part_done` with
    /// the number of finished records after each one
    pub async fn generate_multi_video_with_progress<F>(
        &self,
        records: &[HeritageRecord],
        target_language: &str,
        variant: LengthVariant,
        on_part_done: F,
    ) -> Result<FinalArtifact, PipelineError>
    where
        F: Fn(usize) + Send + Sync,
    {
        if records.is_empty() {
            return Err(PipelineError::InvalidInput("at least one record is required".to_string()));
        }
        for record in records {
            record.text_for(variant)?;
        }

        self.workspace.ensure().await?;
        let scope = self.workspace.scope();
        let mut tracker = RunTracker::start();
        info!("[run {}] Generating {} video(s)", tracker.id, records.len());

        let result = self
            .run_multi(records, target_language, variant, &scope, &on_part_done)
            .await;
        if result.is_ok() {
            tracker.advance(RunState::Assembled);
        }
        self.finish(&mut tracker, scope, result)
    }

    async fn run_multi(
        &self,
        records: &[HeritageRecord],
        target_language: &str,
        variant: LengthVariant,
        scope: &RunScope,
        on_part_done: &(dyn Fn(usize) + Send + Sync),
    ) -> Result<FinalArtifact, PipelineError> {
        let mut parts = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let artifact = self
                .generate_video_from_record(record, target_language, variant)
                .await?;
            let part = scope.allocate(&format!("part-{}", index), "mp4");
            tokio::fs::write(&part, &artifact.bytes).await?;
            parts.push((part, artifact.duration_secs));
            on_part_done(index + 1);
        }
        self.assembler.concatenate_videos(&parts, scope).await
    }

    async fn run(
        &self,
        tracker: &mut RunTracker,
        text: &str,
        image_ref: Option<&str>,
        language: &str,
        translate: bool,
        scope: &RunScope,
    ) -> Result<FinalArtifact, PipelineError> {
        let assets = &self.config.assets;
        let (avatars, background) = tokio::try_join!(
            resolve_avatars(self.images.as_ref(), &assets.avatar_urls, assets.fetch_attempts, scope),
            resolve_background(
                self.images.as_ref(),
                image_ref,
                &assets.default_image_url,
                assets.fetch_attempts,
                scope,
            ),
        )?;

        let narration = self.narrate(text, language, translate, scope).await?;
        tracker.advance(RunState::NarrationReady);

        let units = split_sentences(text);
        let durations = allocate_durations(&units, narration.duration_secs)?;
        debug!("[run {}] {} unit(s) over {:.3}s", tracker.id, units.len(), narration.duration_secs);
        for unit in build_timeline(&units, &durations) {
            debug!(
                "[run {}] unit {} at {:.3}s..{:.3}s: {}",
                tracker.id,
                unit.index,
                unit.start_secs,
                unit.end_secs(),
                unit.text
            );
        }

        let captions: Vec<String> = if translate {
            stream::iter(units.iter())
                .map(|unit| translate_or_original(self.translator.as_ref(), unit, language))
                .buffered(self.config.translation_concurrency)
                .collect()
                .await
        } else {
            units.clone()
        };

        let renderer = SegmentRenderer::new(
            self.config.render_strategy,
            Arc::clone(&self.layout),
            self.font.clone(),
            Arc::clone(&self.transcoder),
            ResolvedAssets { background, avatars },
        );
        let segments = stream::iter(captions.iter().zip(&durations).enumerate())
            .map(|(index, (caption, &duration))| renderer.render(index, caption, duration, scope))
            .buffered(self.config.render_concurrency)
            .try_collect::<Vec<_>>()
            .await?;
        tracker.advance(RunState::SegmentsReady);

        let artifact = self.assembler.assemble(&segments, &narration, scope).await?;
        tracker.advance(RunState::Assembled);
        Ok(artifact)
    }

    async fn narrate(
        &self,
        text: &str,
        language: &str,
        translate: bool,
        scope: &RunScope,
    ) -> Result<NarrationAsset, PipelineError> {
        let spoken = if translate && self.config.narration.translate_text {
            translate_or_original(self.translator.as_ref(), text, language).await
        } else {
            text.to_string()
        };

        let audio = self
            .narrator
            .synthesize(&spoken, language)
            .await
            .map_err(|e| PipelineError::upstream("synthesizing narration", e))?;

        let path = scope.allocate("narration", "mp3");
        tokio::fs::write(&path, &audio).await?;
        let duration_secs = self.narrator.measure_duration(&path).await;

        Ok(NarrationAsset { path, duration_secs })
    }

    fn finish(
        &self,
        tracker: &mut RunTracker,
        scope: RunScope,
        result: Result<FinalArtifact, PipelineError>,
    ) -> Result<FinalArtifact, PipelineError> {
        let artifacts = scope.len();
        let failures = scope.release();
        if failures > 0 {
            warn!("[run {}] {} of {} temp file(s) could not be deleted", tracker.id, failures, artifacts);
        }

        match &result {
            Ok(artifact) => {
                tracker.advance(RunState::Done);
                info!(
                    "[run {}] Done: {} unit(s), {:.2}s, {} bytes",
                    tracker.id,
                    artifact.unit_count,
                    artifact.duration_secs,
                    artifact.bytes.len()
                );
            }
            Err(e) => {
                tracker.advance(RunState::Failed);
                error!("[run {}] Failed: {}", tracker.id, e);
            }
        }
        result
    }
}
