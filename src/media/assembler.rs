use bytes::Bytes;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::PipelineError;
use crate::file_utils::RunScope;
use crate::media::ffmpeg::{ConcatMode, Transcoder};
use crate::media::manifest::ConcatManifest;
use crate::media::{FinalArtifact, NarrationAsset, Segment, SegmentKind, VIDEO_MIME_TYPE};

/// Joins rendered segments into one silent track and muxes the narration over it.
///
/// Every intermediate (manifest, silent track, muxed file) is allocated from
/// the caller's run scope; the result is handed back in memory only.
#[derive(Debug, Clone)]
pub struct MediaAssembler {
    transcoder: Arc<dyn Transcoder>,
    frame_rate: u32,
}

impl MediaAssembler {
    pub fn new(transcoder: Arc<dyn Transcoder>, frame_rate: u32) -> Self {
        Self { transcoder, frame_rate }
    }

    /// Manifest, concat mode and planned length for segments in order
    pub fn manifest_for(&self, segments: &[Segment]) -> (ConcatManifest, ConcatMode, f64) {
        let mut manifest = ConcatManifest::new();
        let mut all_clips = true;
        let mut planned = 0.0;
        for segment in segments {
            match segment.kind {
                SegmentKind::Clip => manifest.push_file(&segment.path),
                SegmentKind::Still => {
                    all_clips = false;
                    manifest.push_timed(&segment.path, segment.duration_secs);
                }
            }
            planned += segment.duration_secs;
        }
        let mode = if all_clips {
            ConcatMode::StreamCopy
        } else {
            ConcatMode::Encode {
                frame_rate: self.frame_rate,
            }
        };
        (manifest, mode, planned)
    }

    /// Concatenate `segments`, mux `narration`, and return the finished video
    pub async fn assemble(
        &self,
        segments: &[Segment],
        narration: &NarrationAsset,
        scope: &RunScope,
    ) -> Result<FinalArtifact, PipelineError> {
        if segments.is_empty() {
            return Err(PipelineError::AssemblyFailure("no segments to assemble".to_string()));
        }
        let mut ordered = segments.to_vec();
        ordered.sort_by_key(|segment| segment.index);

        let (manifest, mode, planned) = self.manifest_for(&ordered);

        let manifest_path = self.write_manifest(&manifest, scope).await?;
        let silent = scope.allocate("silent", "mp4");
        self.transcoder
            .concat(&manifest_path, mode, &silent)
            .await
            .map_err(|e| PipelineError::AssemblyFailure(format!("concatenation failed: {}", e)))?;

        let muxed = scope.allocate("final", "mp4");
        self.transcoder
            .mux(&silent, &narration.path, &muxed)
            .await
            .map_err(|e| PipelineError::AssemblyFailure(format!("muxing failed: {}", e)))?;

        let bytes = read_output(&muxed).await?;
        // The mux stops at the shorter stream
        let duration_secs = planned.min(narration.duration_secs);
        info!(
            "Assembled {} segment(s) into {:.2}s of video ({} bytes)",
            ordered.len(),
            duration_secs,
            bytes.len()
        );

        Ok(FinalArtifact {
            bytes,
            mime_type: VIDEO_MIME_TYPE.to_string(),
            unit_count: ordered.len(),
            duration_secs,
        })
    }

    /// Join finished videos back to back without re-encoding
    pub async fn concatenate_videos(
        &self,
        parts: &[(PathBuf, f64)],
        scope: &RunScope,
    ) -> Result<FinalArtifact, PipelineError> {
        if parts.is_empty() {
            return Err(PipelineError::AssemblyFailure("no videos to concatenate".to_string()));
        }
        let mut manifest = ConcatManifest::new();
        for (path, _) in parts {
            manifest.push_file(path);
        }
        let manifest_path = self.write_manifest(&manifest, scope).await?;
        let combined = scope.allocate("combined", "mp4");
        self.transcoder
            .concat(&manifest_path, ConcatMode::StreamCopy, &combined)
            .await
            .map_err(|e| PipelineError::AssemblyFailure(format!("video concatenation failed: {}", e)))?;

        let bytes = read_output(&combined).await?;
        Ok(FinalArtifact {
            bytes,
            mime_type: VIDEO_MIME_TYPE.to_string(),
            unit_count: parts.len(),
            duration_secs: parts.iter().map(|(_, d)| d).sum(),
        })
    }

    async fn write_manifest(&self, manifest: &ConcatManifest, scope: &RunScope) -> Result<PathBuf, PipelineError> {
        let path = scope.allocate("concat", "txt");
        tokio::fs::write(&path, manifest.render()).await?;
        debug!("Wrote concat manifest with {} entries to {:?}", manifest.len(), path);
        Ok(path)
    }
}

async fn read_output(path: &Path) -> Result<Bytes, PipelineError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PipelineError::AssemblyFailure(format!("cannot read {:?}: {}", path, e)))?;
    if bytes.is_empty() {
        return Err(PipelineError::AssemblyFailure(format!("{:?} is empty", path)));
    }
    Ok(Bytes::from(bytes))
}
