/*!
 * Media side of the pipeline.
 *
 * - `ffmpeg`: the transcoder seam and its ffmpeg/ffprobe implementation
 * - `manifest`: concat demuxer manifests
 * - `assets`: avatar and background download with fallbacks
 * - `still`: still-frame composition for the still strategy
 * - `renderer`: one text unit to one timed segment
 * - `assembler`: segments plus narration to the final artifact
 */

use std::path::PathBuf;

pub mod assembler;
pub mod assets;
pub mod ffmpeg;
pub mod manifest;
pub mod renderer;
pub mod still;

pub use assembler::MediaAssembler;
pub use assets::{Background, ResolvedAssets};
pub use ffmpeg::{FfmpegTranscoder, Transcoder};
pub use manifest::ConcatManifest;
pub use renderer::SegmentRenderer;

// @const: MIME type of every final artifact
pub const VIDEO_MIME_TYPE: &str = "video/mp4";

/// What a segment file contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Encoded clip already trimmed to its duration
    Clip,
    /// Single PNG frame held for its duration during assembly
    Still,
}

/// One rendered text unit
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    // @field: Index of the text unit
    pub index: usize,

    // @field: Rendered file inside the run scope
    pub path: PathBuf,

    // @field: Display time in seconds
    pub duration_secs: f64,

    // @field: Clip or still
    pub kind: SegmentKind,
}

/// Narration audio written to disk and its measured length
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationAsset {
    // @field: Audio file inside the run scope
    pub path: PathBuf,

    // @field: Measured duration, the ground truth for the time budget
    pub duration_secs: f64,
}

/// The finished video, the only output that outlives a run
#[derive(Debug, Clone)]
pub struct FinalArtifact {
    // @field: Encoded MP4
    pub bytes: bytes::Bytes,

    // @field: Always `video/mp4`
    pub mime_type: String,

    // @field: Number of text units (or videos, for a batch)
    pub unit_count: usize,

    // @field: Playback duration in seconds
    pub duration_secs: f64,
}

/// Avatar pose for a unit: `index mod pose_count`
pub fn pose_for_unit(index: usize, pose_count: usize) -> Option<usize> {
    if pose_count == 0 {
        None
    } else {
        Some(index % pose_count)
    }
}
