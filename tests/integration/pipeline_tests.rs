/*!
 * End-to-end tests of single video generation against mock collaborators
 */

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ocity::app_config::RenderStrategy;
use ocity::errors::{ErrorKind, PipelineError};
use ocity::media::ffmpeg::{ClipInput, ConcatMode};
use ocity::pipeline::{HeritageRecord, LengthVariant, VideoPipeline, VideoResponse};
use ocity::providers::mock::png_bytes;
use ocity::providers::{MockImageSource, MockNarrator, MockTranslator};

use crate::common::mock_transcoder::{manifest_durations, manifest_files};
use crate::common::{self, RecordingTranscoder, TestHarness};

const TWO_SENTENCES: &str = "Hello world. This is a test!";

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-6, "expected {}, got {}", expected, actual);
}

/// Test the full clip pipeline on two sentences
#[tokio::test]
async fn test_generateVideo_withTwoSentences_shouldRenderTwoTimedClips() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(10.0), MockTranslator::tagging())?;

    let artifact = harness
        .pipeline
        .generate_video(TWO_SENTENCES, Some(common::BACKGROUND_URL), "en")
        .await?;

    assert_eq!(artifact.unit_count, 2);
    assert_eq!(artifact.mime_type, "video/mp4");
    assert_close(artifact.duration_secs, 10.0);
    assert!(artifact.bytes.starts_with(b"clip["));
    assert!(artifact.bytes.ends_with(b"ID3mock-narration"));

    let jobs = harness.transcoder.clip_jobs();
    assert_eq!(jobs.len(), 2);
    assert_close(jobs[0].duration_secs, 12.0 / 27.0 * 10.0);
    assert_close(jobs[1].duration_secs, 15.0 / 27.0 * 10.0);
    assert!(jobs[0].filter_graph.contains(r"\[en\] Hello world."));
    assert!(jobs[1].filter_graph.contains(r"\[en\] This is a test!"));

    let manifests = harness.transcoder.manifests();
    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0].1, ConcatMode::StreamCopy);
    assert_eq!(manifest_files(&manifests[0].0).len(), 2);
    assert_eq!(harness.transcoder.mux_calls(), 1);
    Ok(())
}

/// Test that the narration is translated once and spoken in the target language
#[tokio::test]
async fn test_generateVideo_shouldNarrateTranslatedText() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(4.0), MockTranslator::tagging())?;

    harness.pipeline.generate_video(TWO_SENTENCES, None, "fr").await?;

    assert_eq!(
        harness.narrator.calls(),
        vec![(format!("[fr] {}", TWO_SENTENCES), "fr".to_string())]
    );
    // Whole text for the narration plus one call per caption
    assert_eq!(harness.translator.request_count(), 3);
    Ok(())
}

/// Test that avatar poses alternate between consecutive units
#[tokio::test]
async fn test_generateVideo_withThreeUnits_shouldAlternatePoses() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(6.0), MockTranslator::identity())?;

    harness
        .pipeline
        .generate_video("One. Two. Three.", Some(common::BACKGROUND_URL), "en")
        .await?;

    let poses: Vec<String> = harness
        .transcoder
        .clip_jobs()
        .iter()
        .map(|job| match &job.inputs[1] {
            ClipInput::File { path, .. } => path.file_name().unwrap().to_string_lossy().to_string(),
            other => panic!("unexpected pose input {:?}", other),
        })
        .collect();

    assert_eq!(poses.len(), 3);
    assert!(poses[0].starts_with("avatar-0"));
    assert!(poses[1].starts_with("avatar-1"));
    assert!(poses[2].starts_with("avatar-0"));
    Ok(())
}

/// Test that text without sentence punctuation is one unit spanning the narration
#[tokio::test]
async fn test_generateVideo_withoutPunctuation_shouldUseSingleUnit() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(7.0), MockTranslator::identity())?;

    let artifact = harness
        .pipeline
        .generate_video("no punctuation here", None, "es")
        .await?;

    assert_eq!(artifact.unit_count, 1);
    let jobs = harness.transcoder.clip_jobs();
    assert_eq!(jobs.len(), 1);
    assert_close(jobs[0].duration_secs, 7.0);
    Ok(())
}

/// Test that running the same request twice gives the same timing
#[tokio::test]
async fn test_generateVideo_repeated_shouldBeDeterministic() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(9.0), MockTranslator::identity())?;

    let first = harness.pipeline.generate_video(TWO_SENTENCES, None, "en").await?;
    let second = harness.pipeline.generate_video(TWO_SENTENCES, None, "en").await?;

    assert_eq!(first.unit_count, second.unit_count);
    assert_close(first.duration_secs, second.duration_secs);
    assert_eq!(first.bytes, second.bytes);

    let jobs = harness.transcoder.clip_jobs();
    assert_eq!(jobs.len(), 4);
    assert_close(jobs[0].duration_secs, jobs[2].duration_secs);
    assert_close(jobs[1].duration_secs, jobs[3].duration_secs);
    Ok(())
}

/// Test that an unreachable background and default image fall back to the placeholder
#[tokio::test]
async fn test_generateVideo_withUnreachableImages_shouldUsePlaceholder() -> Result<()> {
    let images = MockImageSource::new()
        .with_image(common::AVATAR_URLS[0], png_bytes(20, 30, [255, 0, 0, 255]))
        .with_image(common::AVATAR_URLS[1], png_bytes(20, 30, [0, 0, 255, 255]));
    let harness = TestHarness::with_images(
        RenderStrategy::Clip,
        MockNarrator::working(5.0),
        MockTranslator::identity(),
        images,
    )?;

    let artifact = harness
        .pipeline
        .generate_video(TWO_SENTENCES, Some("https://images.test/404.png"), "en")
        .await?;

    assert_eq!(artifact.unit_count, 2);
    let jobs = harness.transcoder.clip_jobs();
    assert!(matches!(&jobs[0].inputs[0], ClipInput::Lavfi(graph) if graph.starts_with("color=c=0x303030")));
    assert!(jobs[0].filter_graph.contains("image unavailable"));
    assert_eq!(harness.images.fetch_count("https://images.test/404.png"), 2);
    assert_eq!(harness.images.fetch_count(common::DEFAULT_IMAGE_URL), 2);
    Ok(())
}

/// Test that a failing caption translation keeps the original caption
#[tokio::test]
async fn test_generateVideo_withFailingTranslator_shouldKeepOriginalCaptions() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(3.0), MockTranslator::failing())?;

    harness.pipeline.generate_video("Hola. Adiós.", None, "en").await?;

    let jobs = harness.transcoder.clip_jobs();
    assert!(jobs[0].filter_graph.contains("Hola."));
    assert!(jobs[1].filter_graph.contains("Adiós."));
    assert_eq!(harness.narrator.calls()[0].0, "Hola. Adiós.");
    Ok(())
}

/// Test the still strategy: PNG frames held for their durations, then re-encoded
#[tokio::test]
async fn test_generateVideo_withStillStrategy_shouldConcatTimedFrames() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Still, MockNarrator::working(10.0), MockTranslator::identity())?;

    let artifact = harness
        .pipeline
        .generate_video(TWO_SENTENCES, Some(common::BACKGROUND_URL), "en")
        .await?;

    assert_eq!(artifact.unit_count, 2);
    assert!(harness.transcoder.clip_jobs().is_empty());

    let manifests = harness.transcoder.manifests();
    assert_eq!(manifests.len(), 1);
    let (manifest, mode) = &manifests[0];
    assert_eq!(*mode, ConcatMode::Encode { frame_rate: 30 });

    let durations = manifest_durations(manifest);
    assert_eq!(durations.len(), 2);
    assert_close(durations[0], 12.0 / 27.0 * 10.0);
    assert_close(durations[1], 15.0 / 27.0 * 10.0);

    let files = manifest_files(manifest);
    assert_eq!(files.len(), 3);
    assert!(files.iter().all(|f| f.ends_with(".png")));
    assert_eq!(files[1], files[2]);
    Ok(())
}

/// Test that every temp file is gone after a successful run
#[tokio::test]
async fn test_generateVideo_afterSuccess_shouldLeaveNoTempFiles() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Still, MockNarrator::working(2.0), MockTranslator::identity())?;

    harness
        .pipeline
        .generate_video(TWO_SENTENCES, Some(common::BACKGROUND_URL), "en")
        .await?;

    assert!(harness.leftover_files().is_empty(), "leftover: {:?}", harness.leftover_files());
    Ok(())
}

/// Test that blank text is rejected before any collaborator is called
#[tokio::test]
async fn test_generateVideo_withEmptyText_shouldBeInvalidInput() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(2.0), MockTranslator::identity())?;

    let error = harness.pipeline.generate_video("  \n", None, "en").await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::InvalidInput);
    assert_eq!(error.status_code(), 400);
    assert!(harness.narrator.calls().is_empty());
    assert_eq!(harness.images.fetch_count(common::AVATAR_URLS[0]), 0);

    let (status, response) = VideoResponse::failure(&error);
    assert_eq!(status, 400);
    assert!(!response.success);
    Ok(())
}

/// Test that an unknown language is rejected
#[tokio::test]
async fn test_generateVideo_withUnknownLanguage_shouldBeInvalidInput() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(2.0), MockTranslator::identity())?;

    let error = harness.pipeline.generate_video("Hi.", None, "zz").await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::InvalidInput);
    Ok(())
}

/// Test that a narration failure aborts the run and cleans up downloads
#[tokio::test]
async fn test_generateVideo_withFailingNarrator_shouldFailUpstreamAndClean() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::failing(), MockTranslator::identity())?;

    let error = harness
        .pipeline
        .generate_video(TWO_SENTENCES, Some(common::BACKGROUND_URL), "en")
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::UpstreamFailure);
    assert_eq!(error.status_code(), 500);
    assert!(harness.transcoder.clip_jobs().is_empty());
    assert!(harness.leftover_files().is_empty(), "leftover: {:?}", harness.leftover_files());
    Ok(())
}

/// Test that no usable avatar pose aborts the run
#[tokio::test]
async fn test_generateVideo_withoutAvatars_shouldFailUpstream() -> Result<()> {
    let images = MockImageSource::new().with_image(common::DEFAULT_IMAGE_URL, png_bytes(8, 8, [0, 0, 0, 255]));
    let harness = TestHarness::with_images(
        RenderStrategy::Clip,
        MockNarrator::working(2.0),
        MockTranslator::identity(),
        images,
    )?;

    let error = harness.pipeline.generate_video(TWO_SENTENCES, None, "en").await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::UpstreamFailure);
    assert!(harness.leftover_files().is_empty());
    Ok(())
}

/// Test that a failing clip is reported with its unit index and nothing is left behind
#[tokio::test]
async fn test_generateVideo_withFailingClip_shouldReportUnitIndex() -> Result<()> {
    let harness = TestHarness::with_parts(
        RenderStrategy::Clip,
        MockNarrator::working(4.0),
        MockTranslator::identity(),
        common::stocked_images(),
        RecordingTranscoder::new().failing_clip_at(1),
    )?;

    let error = harness
        .pipeline
        .generate_video("One. Two. Three.", None, "en")
        .await
        .unwrap_err();

    match error {
        PipelineError::RenderFailure { unit_index, ref reason } => {
            assert_eq!(unit_index, 1);
            assert!(reason.contains("drawtext"));
        }
        other => panic!("expected a render failure, got {:?}", other),
    }
    assert!(harness.transcoder.manifests().is_empty());
    assert!(harness.leftover_files().is_empty(), "leftover: {:?}", harness.leftover_files());
    Ok(())
}

/// Test that a mux failure is an assembly failure
#[tokio::test]
async fn test_generateVideo_withFailingMux_shouldBeAssemblyFailure() -> Result<()> {
    let harness = TestHarness::with_parts(
        RenderStrategy::Clip,
        MockNarrator::working(4.0),
        MockTranslator::identity(),
        common::stocked_images(),
        RecordingTranscoder::new().failing_mux(),
    )?;

    let error = harness.pipeline.generate_video(TWO_SENTENCES, None, "en").await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::AssemblyFailure);
    assert!(harness.leftover_files().is_empty());
    Ok(())
}

/// Test that a record in its own language is narrated natively with a cleaned image URL
#[tokio::test]
async fn test_generateVideoFromRecord_withLocalLanguage_shouldUseNativeLanguage() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(5.0), MockTranslator::tagging())?;
    let record: HeritageRecord = serde_json::from_value(serde_json::json!({
        "id": "mill",
        "description": { "local": { "short": "Un molino. Muy antiguo." } },
        "image": format!("{}?w=1200", common::BACKGROUND_URL),
    }))?;

    let artifact = harness
        .pipeline
        .generate_video_from_record(&record, "local", LengthVariant::Short)
        .await?;

    assert_eq!(artifact.unit_count, 2);
    assert_eq!(harness.narrator.calls()[0].1, "es");
    assert_eq!(harness.images.fetch_count(common::BACKGROUND_URL), 1);
    Ok(())
}

/// Test that a record without the requested text is rejected
#[tokio::test]
async fn test_generateVideoFromRecord_withMissingVariant_shouldBeInvalidInput() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(5.0), MockTranslator::tagging())?;
    let record: HeritageRecord = serde_json::from_value(serde_json::json!({
        "description": { "local": { "short": "Solo corto." } }
    }))?;

    let error = harness
        .pipeline
        .generate_video_from_record(&record, "en", LengthVariant::Extended)
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::InvalidInput);
    assert!(harness.narrator.calls().is_empty());
    Ok(())
}

/// Test that a relative temp directory still yields concat lists ffmpeg can resolve
#[tokio::test]
async fn test_generateVideo_withRelativeTempDir_shouldListAbsoluteEntries() -> Result<()> {
    common::init_test_logging();
    let relative = PathBuf::from("target").join(format!("ocity-relative-{}", uuid::Uuid::new_v4().simple()));
    let config = common::test_config(&relative, RenderStrategy::Clip);
    let transcoder = RecordingTranscoder::new();
    let pipeline = VideoPipeline::new(
        config,
        Arc::new(MockNarrator::working(10.0)),
        Arc::new(MockTranslator::identity()),
        Arc::new(common::stocked_images()),
        Arc::new(transcoder.clone()),
    )?;

    let result = pipeline
        .generate_video(TWO_SENTENCES, Some(common::BACKGROUND_URL), "en")
        .await;
    let expected_dir = std::env::current_dir()?.join(&relative);
    let _ = std::fs::remove_dir_all(&relative);

    let artifact = result?;
    assert_eq!(artifact.unit_count, 2);
    assert_eq!(pipeline.workspace().dir(), expected_dir.as_path());

    let manifests = transcoder.manifests();
    assert_eq!(manifests.len(), 1);
    let entries = manifest_files(&manifests[0].0);
    assert_eq!(entries.len(), 2);
    for entry in entries {
        let entry = Path::new(&entry);
        assert!(entry.is_absolute(), "relative concat entry {:?}", entry);
        assert!(entry.starts_with(&expected_dir));
    }
    Ok(())
}

/// Test that the local language sentinel narrates and captions without translating
#[tokio::test]
async fn test_generateVideoFromRecord_withLocalLanguage_shouldSkipTranslation() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(5.0), MockTranslator::tagging())?;
    let record: HeritageRecord = serde_json::from_value(serde_json::json!({
        "id": "mill",
        "description": { "local": { "short": "Un molino. Muy antiguo." } },
    }))?;

    harness
        .pipeline
        .generate_video_from_record(&record, "LOCAL", LengthVariant::Short)
        .await?;

    assert_eq!(harness.translator.request_count(), 0);
    assert_eq!(
        harness.narrator.calls(),
        vec![("Un molino. Muy antiguo.".to_string(), "es".to_string())]
    );
    let jobs = harness.transcoder.clip_jobs();
    assert_eq!(jobs.len(), 2);
    assert!(jobs[0].filter_graph.contains("Un molino."));
    assert!(jobs.iter().all(|job| !job.filter_graph.contains(r"\[es\]")));
    Ok(())
}

/// Test that an explicit native language code is still translated
#[tokio::test]
async fn test_generateVideoFromRecord_withExplicitLanguage_shouldTranslate() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(5.0), MockTranslator::tagging())?;
    let record: HeritageRecord = serde_json::from_value(serde_json::json!({
        "description": { "local": { "short": "Un molino. Muy antiguo." } },
    }))?;

    harness
        .pipeline
        .generate_video_from_record(&record, "es", LengthVariant::Short)
        .await?;

    // Narration plus one caption per unit
    assert_eq!(harness.translator.request_count(), 3);
    Ok(())
}
