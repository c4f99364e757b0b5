use async_trait::async_trait;
use log::{debug, error, warn};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::app_config::MediaConfig;
use crate::errors::TranscodeError;

// @module: External transcoder seam and the ffmpeg implementation

/// One input of a clip render
#[derive(Debug, Clone, PartialEq)]
pub enum ClipInput {
    /// A media file; `stream_loop` replays an animation for as long as needed
    File { path: PathBuf, stream_loop: bool },
    /// A `lavfi` source graph such as `color=c=0x303030:s=800x600:r=30`
    Lavfi(String),
}

/// Everything needed to encode one timed clip
#[derive(Debug, Clone, PartialEq)]
pub struct ClipJob {
    // @field: Inputs referenced as `[0:v]`, `[1:v]`, ... by the graph
    pub inputs: Vec<ClipInput>,

    // @field: `-filter_complex` graph
    pub filter_graph: String,

    // @field: Graph output pad mapped to the clip, without brackets
    pub output_label: String,

    // @field: Clip length in seconds
    pub duration_secs: f64,

    // @field: Output frame rate
    pub frame_rate: u32,
}

/// How concatenated inputs are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatMode {
    /// Inputs share one encoding, copy the streams
    StreamCopy,
    /// Inputs are still frames or mixed, re-encode at `frame_rate`
    Encode { frame_rate: u32 },
}

/// The operations the pipeline needs from a transcoding engine
#[async_trait]
pub trait Transcoder: Send + Sync + Debug {
    /// Encode a silent clip described by `job` into `output`
    async fn render_clip(&self, job: &ClipJob, output: &Path) -> Result<(), TranscodeError>;

    /// Concatenate the files listed in a concat manifest into `output`
    async fn concat(&self, manifest: &Path, mode: ConcatMode, output: &Path) -> Result<(), TranscodeError>;

    /// Mux a video track and an audio track, stopping at the shorter one
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), TranscodeError>;

    /// Container duration in seconds, `None` when it cannot be read
    async fn probe_duration(&self, media: &Path) -> Option<f64>;
}

/// Transcoder backed by the `ffmpeg` and `ffprobe` executables
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    ffprobe_path: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            timeout,
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(
            &config.ffmpeg_path,
            &config.ffprobe_path,
            Duration::from_secs(config.encode_timeout_secs),
        )
    }

    /// Arguments of a clip render, without the executable
    pub fn clip_args(job: &ClipJob, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into()];
        for input in &job.inputs {
            match input {
                ClipInput::File { path, stream_loop } => {
                    if *stream_loop {
                        args.extend(["-stream_loop".into(), "-1".into()]);
                    }
                    args.extend(["-i".into(), path.to_string_lossy().to_string()]);
                }
                ClipInput::Lavfi(graph) => {
                    args.extend(["-f".into(), "lavfi".into(), "-i".into(), graph.clone()]);
                }
            }
        }
        args.extend([
            "-filter_complex".into(),
            job.filter_graph.clone(),
            "-map".into(),
            format!("[{}]", job.output_label),
            "-t".into(),
            format!("{:.3}", job.duration_secs),
            "-r".into(),
            job.frame_rate.to_string(),
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-an".into(),
            output.to_string_lossy().to_string(),
        ]);
        args
    }

    /// Arguments of a concat run, without the executable
    pub fn concat_args(manifest: &Path, mode: ConcatMode, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            manifest.to_string_lossy().to_string(),
        ];
        match mode {
            ConcatMode::StreamCopy => args.extend(["-c".into(), "copy".into()]),
            ConcatMode::Encode { frame_rate } => args.extend([
                "-vf".into(),
                format!("fps={},format=yuv420p", frame_rate),
                "-r".into(),
                frame_rate.to_string(),
                "-c:v".into(),
                "libx264".into(),
                "-pix_fmt".into(),
                "yuv420p".into(),
                "-an".into(),
            ]),
        }
        args.push(output.to_string_lossy().to_string());
        args
    }

    /// Arguments of a mux run, without the executable
    pub fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-hide_banner".into(),
            "-i".into(),
            video.to_string_lossy().to_string(),
            "-i".into(),
            audio.to_string_lossy().to_string(),
            "-map".into(),
            "0:v:0".into(),
            "-map".into(),
            "1:a:0".into(),
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            "aac".into(),
            "-shortest".into(),
            output.to_string_lossy().to_string(),
        ]
    }

    async fn run_ffmpeg(&self, args: Vec<String>) -> Result<(), TranscodeError> {
        debug!("{} {}", self.ffmpeg_path, args.join(" "));
        run_with_timeout(&self.ffmpeg_path, &args, self.timeout).await?;
        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn render_clip(&self, job: &ClipJob, output: &Path) -> Result<(), TranscodeError> {
        self.run_ffmpeg(Self::clip_args(job, output)).await
    }

    async fn concat(&self, manifest: &Path, mode: ConcatMode, output: &Path) -> Result<(), TranscodeError> {
        self.run_ffmpeg(Self::concat_args(manifest, mode, output)).await
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), TranscodeError> {
        self.run_ffmpeg(Self::mux_args(video, audio, output)).await
    }

    async fn probe_duration(&self, media: &Path) -> Option<f64> {
        match probe_media_duration(&self.ffprobe_path, media, self.timeout).await {
            Ok(duration) => Some(duration),
            Err(e) => {
                warn!("Could not probe {:?}: {}", media, e);
                None
            }
        }
    }
}

/// Read the container duration of a media file with ffprobe
pub async fn probe_media_duration(ffprobe_path: &str, media: &Path, timeout: Duration) -> Result<f64, TranscodeError> {
    let args = vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        media.to_string_lossy().to_string(),
    ];
    let stdout = run_with_timeout(ffprobe_path, &args, timeout).await?;
    let text = String::from_utf8_lossy(&stdout);
    let value = text.trim();

    value
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| TranscodeError::Probe(format!("'{}' is not a duration", value)))
}

/// Run a program, kill it when `timeout` elapses, and return its stdout
async fn run_with_timeout(program: &str, args: &[String], timeout: Duration) -> Result<Vec<u8>, TranscodeError> {
    // Add timeout to prevent hanging on problematic inputs
    let child_future = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::select! {
        result = child_future => {
            result.map_err(|source| TranscodeError::Spawn {
                program: program.to_string(),
                source,
            })?
        },
        _ = tokio::time::sleep(timeout) => {
            return Err(TranscodeError::Timeout {
                program: program.to_string(),
                secs: timeout.as_secs(),
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let filtered = filter_ffmpeg_stderr(&stderr);
        error!("{} failed: {}", program, filtered);
        return Err(TranscodeError::Failed {
            program: program.to_string(),
            stderr: filtered,
        });
    }
    Ok(output.stdout)
}

/// Filter ffmpeg stderr to only show meaningful error lines, stripping the
/// version banner, build configuration, and stream metadata noise.
pub fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let noise_prefixes = [
        "ffmpeg version",
        "ffprobe version",
        "built with",
        "configuration:",
        "libav",
        "libsw",
        "libpostproc",
        "Input #",
        "Metadata:",
        "Duration:",
        "Chapter",
        "Stream #",
        "encoder",
        "Output #",
        "Stream mapping:",
        "Press [q]",
        "frame=",
        "size=",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !noise_prefixes.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}

/// Escape a file path used as a filter option value (`fontfile=...`)
pub fn escape_filter_path(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    let mut escaped = String::with_capacity(normalized.len() + 12);
    for ch in normalized.chars() {
        match ch {
            ':' => escaped.push_str("\\\\:"),
            '\'' => escaped.push_str("\\\\\\'"),
            ',' => escaped.push_str("\\,"),
            ';' => escaped.push_str("\\;"),
            '[' => escaped.push_str("\\["),
            ']' => escaped.push_str("\\]"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
