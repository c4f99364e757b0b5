use anyhow::Result;
use log::debug;
use std::path::Path;
use std::sync::Arc;

use crate::app_config::{Config, RenderStrategy};
use crate::errors::PipelineError;
use crate::file_utils::RunScope;
use crate::media::assets::{Background, ResolvedAssets};
use crate::media::ffmpeg::{escape_filter_path, ClipInput, ClipJob, Transcoder};
use crate::media::still::{StillCanvas, PLACEHOLDER_MARKER};
use crate::media::{pose_for_unit, Segment, SegmentKind};
use crate::text::caption::{escape_drawtext, wrap_caption, FixedAdvance, TextMeasure};
use crate::text::font::CaptionFont;

/// Frame geometry and caption styling shared by both strategies
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub avatar_width: u32,
    pub avatar_x: u32,
    pub avatar_y: u32,
    pub placeholder_rgb: [u8; 3],
    pub font_family: String,
    pub font_size: f32,
    pub max_caption_width: f32,
    pub line_spacing: u32,
    pub box_border: u32,
    pub bottom_margin: u32,
    pub box_opacity: f32,
}

impl FrameLayout {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            width: config.media.frame_width,
            height: config.media.frame_height,
            frame_rate: config.media.frame_rate,
            avatar_width: config.media.avatar_width,
            avatar_x: config.media.avatar_x,
            avatar_y: config.media.avatar_y,
            placeholder_rgb: config.media.placeholder_rgb()?,
            font_family: config.caption.font_family.clone(),
            font_size: config.caption.font_size,
            max_caption_width: config.caption.max_width,
            line_spacing: config.caption.line_spacing,
            box_border: config.caption.box_border,
            bottom_margin: config.caption.bottom_margin,
            box_opacity: config.caption.box_opacity,
        })
    }

    fn placeholder_hex(&self) -> String {
        let [r, g, b] = self.placeholder_rgb;
        format!("0x{:02x}{:02x}{:02x}", r, g, b)
    }
}

/// Turns one caption and its time budget into one segment file.
///
/// Built once per run after the assets are resolved; the strategy, font and
/// assets stay fixed for every unit of that run.
#[derive(Debug)]
pub struct SegmentRenderer {
    strategy: RenderStrategy,
    layout: Arc<FrameLayout>,
    font: Option<Arc<CaptionFont>>,
    transcoder: Arc<dyn Transcoder>,
    assets: ResolvedAssets,
}

impl SegmentRenderer {
    pub fn new(
        strategy: RenderStrategy,
        layout: Arc<FrameLayout>,
        font: Option<Arc<CaptionFont>>,
        transcoder: Arc<dyn Transcoder>,
        assets: ResolvedAssets,
    ) -> Self {
        Self {
            strategy,
            layout,
            font,
            transcoder,
            assets,
        }
    }

    pub fn strategy(&self) -> RenderStrategy {
        self.strategy
    }

    /// Wrap a caption to the caption box using the font, or a fixed advance without one
    pub fn caption_lines(&self, caption: &str) -> Vec<String> {
        match &self.font {
            Some(font) => wrap_caption(font.as_ref(), caption, self.layout.max_caption_width),
            None => {
                let measure = FixedAdvance::for_font_size(self.layout.font_size);
                wrap_caption(&measure as &dyn TextMeasure, caption, self.layout.max_caption_width)
            }
        }
    }

    /// Render unit `index`; any failure is reported against that unit
    pub async fn render(
        &self,
        index: usize,
        caption: &str,
        duration_secs: f64,
        scope: &RunScope,
    ) -> Result<Segment, PipelineError> {
        let pose = pose_for_unit(index, self.assets.avatars.len())
            .map(|i| self.assets.avatars[i].clone())
            .ok_or_else(|| PipelineError::RenderFailure {
                unit_index: index,
                reason: "no avatar pose available".to_string(),
            })?;
        let lines = self.caption_lines(caption);
        debug!("Rendering unit {} ({} line(s), {:.3}s)", index, lines.len(), duration_secs);

        match self.strategy {
            RenderStrategy::Clip => {
                let output = scope.allocate(&format!("clip-{}", index), "mp4");
                let job = self.clip_job(&pose, &lines, duration_secs);
                self.transcoder
                    .render_clip(&job, &output)
                    .await
                    .map_err(|e| PipelineError::RenderFailure {
                        unit_index: index,
                        reason: e.to_string(),
                    })?;
                Ok(Segment {
                    index,
                    path: output,
                    duration_secs,
                    kind: SegmentKind::Clip,
                })
            }
            RenderStrategy::Still => {
                let output = scope.allocate(&format!("still-{}", index), "png");
                let layout = Arc::clone(&self.layout);
                let font = self.font.clone();
                let background = self.assets.background.clone();
                let target = output.clone();

                tokio::task::spawn_blocking(move || {
                    StillCanvas::new(&layout, font.as_deref()).render_to_file(&background, &pose, &lines, &target)
                })
                .await
                .map_err(|e| PipelineError::RenderFailure {
                    unit_index: index,
                    reason: format!("still render task failed: {}", e),
                })?
                .map_err(|e| PipelineError::RenderFailure {
                    unit_index: index,
                    reason: format!("{:#}", e),
                })?;

                Ok(Segment {
                    index,
                    path: output,
                    duration_secs,
                    kind: SegmentKind::Still,
                })
            }
        }
    }

    /// Filter graph job for one clip: background, scaled pose overlay, boxed caption
    pub fn clip_job(&self, pose: &Path, lines: &[String], duration_secs: f64) -> ClipJob {
        let layout = &self.layout;
        let size = format!("{}:{}", layout.width, layout.height);
        let mut filters = Vec::new();

        let background_input = match &self.assets.background {
            Background::Image { path, animated } => {
                let looping = if *animated { "" } else { "loop=loop=-1:size=1," };
                filters.push(format!(
                    "[0:v]{}scale={},setsar=1,fps={}[bg]",
                    looping, size, layout.frame_rate
                ));
                ClipInput::File {
                    path: path.clone(),
                    stream_loop: *animated,
                }
            }
            Background::Placeholder => {
                filters.push(format!(
                    "[0:v]drawtext={}:text={}:expansion=none:fontsize={}:fontcolor=0xc8c8c8:x={}:y={}[bg]",
                    self.font_option(),
                    escape_drawtext(PLACEHOLDER_MARKER),
                    (layout.font_size * 0.75).round(),
                    layout.box_border * 2,
                    layout.box_border * 2
                ));
                ClipInput::Lavfi(format!(
                    "color=c={}:s={}x{}:r={}",
                    layout.placeholder_hex(),
                    layout.width,
                    layout.height,
                    layout.frame_rate
                ))
            }
        };

        filters.push(format!("[1:v]scale={}:-1[pose]", layout.avatar_width));
        filters.push(format!("[bg][pose]overlay={}:{}[comp]", layout.avatar_x, layout.avatar_y));

        if lines.is_empty() {
            filters.push("[comp]null[out]".to_string());
        } else {
            filters.push(format!(
                "[comp]drawtext={}:text={}:expansion=none:fontsize={}:fontcolor=white:box=1:boxcolor=black@{}:boxborderw={}:line_spacing={}:x=(w-text_w)/2:y=h-text_h-{}[out]",
                self.font_option(),
                escape_drawtext(&lines.join("\n")),
                layout.font_size.round(),
                layout.box_opacity,
                layout.box_border,
                layout.line_spacing,
                layout.bottom_margin
            ));
        }

        ClipJob {
            inputs: vec![
                background_input,
                ClipInput::File {
                    path: pose.to_path_buf(),
                    stream_loop: false,
                },
            ],
            filter_graph: filters.join(";"),
            output_label: "out".to_string(),
            duration_secs,
            frame_rate: layout.frame_rate,
        }
    }

    fn font_option(&self) -> String {
        match &self.font {
            Some(font) => format!("fontfile={}", escape_filter_path(font.path())),
            None => format!("font={}", escape_drawtext(&self.layout.font_family)),
        }
    }
}
