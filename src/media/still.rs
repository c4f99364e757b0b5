use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::path::Path;

use crate::media::assets::Background;
use crate::media::renderer::FrameLayout;
use crate::text::caption::{FixedAdvance, TextMeasure};
use crate::text::font::CaptionFont;

// @module: Still-frame composition

// @const: Marker drawn on placeholder backgrounds
pub const PLACEHOLDER_MARKER: &str = "image unavailable";

/// Draws background, avatar pose and boxed caption into one RGBA frame
pub struct StillCanvas<'a> {
    layout: &'a FrameLayout,
    font: Option<&'a CaptionFont>,
}

impl<'a> StillCanvas<'a> {
    pub fn new(layout: &'a FrameLayout, font: Option<&'a CaptionFont>) -> Self {
        Self { layout, font }
    }

    /// Compose the frame and write it as PNG
    pub fn render_to_file(&self, background: &Background, avatar: &Path, lines: &[String], output: &Path) -> Result<()> {
        let frame = self.compose(background, avatar, lines)?;
        frame
            .save_with_format(output, image::ImageFormat::Png)
            .with_context(|| format!("Failed to write still frame {:?}", output))
    }

    /// Compose the frame in memory
    pub fn compose(&self, background: &Background, avatar: &Path, lines: &[String]) -> Result<RgbaImage> {
        let mut frame = self.background_frame(background)?;

        let pose = image::open(avatar)
            .with_context(|| format!("Failed to decode avatar {:?}", avatar))?;
        let ratio = self.layout.avatar_width as f32 / pose.width().max(1) as f32;
        let pose_height = ((pose.height() as f32 * ratio).round() as u32).max(1);
        let pose = pose.resize_exact(self.layout.avatar_width, pose_height, FilterType::Triangle);
        imageops::overlay(&mut frame, &pose.to_rgba8(), self.layout.avatar_x as i64, self.layout.avatar_y as i64);

        self.draw_caption(&mut frame, lines);
        Ok(frame)
    }

    fn background_frame(&self, background: &Background) -> Result<RgbaImage> {
        let (width, height) = (self.layout.width, self.layout.height);
        match background {
            Background::Image { path, .. } => {
                let image = image::open(path)
                    .with_context(|| format!("Failed to decode background {:?}", path))?;
                Ok(image.resize_exact(width, height, FilterType::Triangle).to_rgba8())
            }
            Background::Placeholder => {
                let [r, g, b] = self.layout.placeholder_rgb;
                let mut frame = RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255]));
                self.draw_placeholder_marker(&mut frame);
                Ok(frame)
            }
        }
    }

    fn draw_placeholder_marker(&self, frame: &mut RgbaImage) {
        let grey = Rgba([200, 200, 200, 255]);
        match self.font {
            Some(font) => {
                let margin = self.layout.box_border as f32 * 2.0;
                self.draw_text_line(frame, font, PLACEHOLDER_MARKER, margin, margin + font.ascent(), grey);
            }
            None => {
                // No font to write with, cross the frame out instead
                let (w, h) = (frame.width() as i64, frame.height() as i64);
                let steps = w.max(h);
                for i in 0..steps {
                    let x = i * w / steps;
                    let y = i * h / steps;
                    put_blended(frame, x, y, grey, 1.0);
                    put_blended(frame, w - 1 - x, y, grey, 1.0);
                }
            }
        }
    }

    fn draw_caption(&self, frame: &mut RgbaImage, lines: &[String]) {
        if lines.is_empty() {
            return;
        }
        let layout = self.layout;
        let fallback = FixedAdvance::for_font_size(layout.font_size);
        let measure: &dyn TextMeasure = match self.font {
            Some(font) => font,
            None => &fallback,
        };
        let line_height = self.font.map(CaptionFont::line_height).unwrap_or(layout.font_size);
        let spacing = layout.line_spacing as f32;
        let border = layout.box_border as f32;

        let widths: Vec<f32> = lines.iter().map(|line| measure.width(line)).collect();
        let block_width = widths.iter().cloned().fold(0.0_f32, f32::max);
        let block_height = lines.len() as f32 * line_height + (lines.len() - 1) as f32 * spacing;
        let top = layout.height as f32 - layout.bottom_margin as f32 - block_height;
        let left = (layout.width as f32 - block_width) / 2.0;

        fill_rect(
            frame,
            (left - border) as i64,
            (top - border) as i64,
            (block_width + 2.0 * border).ceil() as i64,
            (block_height + 2.0 * border).ceil() as i64,
            Rgba([0, 0, 0, 255]),
            layout.box_opacity,
        );

        let Some(font) = self.font else {
            return;
        };
        let white = Rgba([255, 255, 255, 255]);
        for (i, (line, width)) in lines.iter().zip(&widths).enumerate() {
            let x = (layout.width as f32 - width) / 2.0;
            let baseline = top + font.ascent() + i as f32 * (line_height + spacing);
            self.draw_text_line(frame, font, line, x, baseline, white);
        }
    }

    fn draw_text_line(&self, frame: &mut RgbaImage, font: &CaptionFont, text: &str, x: f32, baseline: f32, color: Rgba<u8>) {
        let mut pen_x = x;
        let mut previous: Option<char> = None;
        for ch in text.chars() {
            if let Some(prev) = previous {
                pen_x += font.kern(prev, ch);
            }
            let (metrics, coverage) = font.rasterize(ch);
            let glyph_left = (pen_x + metrics.xmin as f32).round() as i64;
            let glyph_top = (baseline - metrics.height as f32 - metrics.ymin as f32).round() as i64;

            for row in 0..metrics.height {
                for col in 0..metrics.width {
                    let alpha = coverage[row * metrics.width + col] as f32 / 255.0;
                    if alpha > 0.0 {
                        put_blended(frame, glyph_left + col as i64, glyph_top + row as i64, color, alpha);
                    }
                }
            }
            pen_x += metrics.advance_width;
            previous = Some(ch);
        }
    }
}

fn fill_rect(frame: &mut RgbaImage, x: i64, y: i64, width: i64, height: i64, color: Rgba<u8>, alpha: f32) {
    for py in y.max(0)..(y + height).min(frame.height() as i64) {
        for px in x.max(0)..(x + width).min(frame.width() as i64) {
            put_blended(frame, px, py, color, alpha);
        }
    }
}

fn put_blended(frame: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, alpha: f32) {
    if x < 0 || y < 0 || x >= frame.width() as i64 || y >= frame.height() as i64 {
        return;
    }
    let pixel = frame.get_pixel_mut(x as u32, y as u32);
    let alpha = alpha.clamp(0.0, 1.0);
    for channel in 0..3 {
        let base = pixel.0[channel] as f32;
        pixel.0[channel] = (base * (1.0 - alpha) + color.0[channel] as f32 * alpha).round() as u8;
    }
    pixel.0[3] = 255;
}
