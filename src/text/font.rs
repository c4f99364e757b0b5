use anyhow::{anyhow, Context, Result};
use fontdue::{Font, FontSettings, Metrics};
use log::debug;
use std::path::{Path, PathBuf};

use crate::text::caption::TextMeasure;

// @module: Caption font loading and glyph metrics

// @const: Fonts tried when no font file is configured
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// A parsed font at a fixed pixel size.
///
/// Immutable after loading, so one instance is shared by every segment of a run.
pub struct CaptionFont {
    font: Font,
    px: f32,
    path: PathBuf,
}

impl std::fmt::Debug for CaptionFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionFont")
            .field("path", &self.path)
            .field("px", &self.px)
            .finish()
    }
}

impl CaptionFont {
    /// Load a TrueType/OpenType font file
    pub fn load(path: &Path, px: f32) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read font file: {:?}", path))?;
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| anyhow!("Failed to parse font {:?}: {}", path, e))?;

        Ok(Self {
            font,
            px,
            path: path.to_path_buf(),
        })
    }

    /// Load the configured font, or the first usable well-known system font
    pub fn discover(configured: Option<&Path>, px: f32) -> Option<Self> {
        let candidates = configured
            .map(Path::to_path_buf)
            .into_iter()
            .chain(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from));

        for candidate in candidates {
            if !candidate.is_file() {
                continue;
            }
            match Self::load(&candidate, px) {
                Ok(font) => return Some(font),
                Err(e) => debug!("Skipping font {:?}: {}", candidate, e),
            }
        }
        None
    }

    /// Path the font was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pixel size
    pub fn px(&self) -> f32 {
        self.px
    }

    /// Distance from the top of a line to the baseline
    pub fn ascent(&self) -> f32 {
        self.font
            .horizontal_line_metrics(self.px)
            .map(|m| m.ascent)
            .unwrap_or(self.px * 0.8)
    }

    /// Height of one line without extra spacing
    pub fn line_height(&self) -> f32 {
        self.font
            .horizontal_line_metrics(self.px)
            .map(|m| m.ascent - m.descent)
            .unwrap_or(self.px)
    }

    /// Coverage bitmap of one glyph
    pub fn rasterize(&self, ch: char) -> (Metrics, Vec<u8>) {
        self.font.rasterize(ch, self.px)
    }

    /// Kerning adjustment between two glyphs
    pub fn kern(&self, left: char, right: char) -> f32 {
        self.font.horizontal_kern(left, right, self.px).unwrap_or(0.0)
    }
}

impl TextMeasure for CaptionFont {
    fn width(&self, text: &str) -> f32 {
        let mut width = 0.0;
        let mut previous: Option<char> = None;
        for ch in text.chars() {
            if let Some(prev) = previous {
                width += self.kern(prev, ch);
            }
            width += self.font.metrics(ch, self.px).advance_width;
            previous = Some(ch);
        }
        width
    }
}
