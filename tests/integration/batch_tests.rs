/*!
 * Integration tests for multi-record video generation
 */

use anyhow::Result;
use parking_lot::Mutex;

use ocity::app_config::RenderStrategy;
use ocity::errors::ErrorKind;
use ocity::media::ffmpeg::ConcatMode;
use ocity::pipeline::{HeritageRecord, LengthVariant};
use ocity::providers::{MockNarrator, MockTranslator};

use crate::common::mock_transcoder::manifest_files;
use crate::common::{self, RecordingTranscoder, TestHarness};

fn record(id: &str, text: &str, image: Option<&str>) -> HeritageRecord {
    let mut value = serde_json::json!({
        "id": id,
        "description": { "local": { "extended": text } },
    });
    if let Some(image) = image {
        value["image"] = serde_json::Value::String(image.to_string());
    }
    serde_json::from_value(value).unwrap_or_default()
}

fn three_records() -> Vec<HeritageRecord> {
    vec![
        record("church", "Una iglesia. Muy bonita.", Some(common::BACKGROUND_URL)),
        record("bridge", "Un puente romano.", None),
        record("tower", "Una torre. Alta. Antigua.", Some(common::BACKGROUND_URL)),
    ]
}

/// Test that three records become one video made of three parts in order
#[tokio::test]
async fn test_generateMultiVideo_withThreeRecords_shouldConcatenateParts() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(4.0), MockTranslator::tagging())?;

    let artifact = harness
        .pipeline
        .generate_multi_video_from_records(&three_records(), "en", LengthVariant::Extended)
        .await?;

    assert_eq!(artifact.unit_count, 3);
    assert_eq!(artifact.mime_type, "video/mp4");
    assert!((artifact.duration_secs - 12.0).abs() < 1e-6);

    // One concat per record plus the final join
    let manifests = harness.transcoder.manifests();
    assert_eq!(manifests.len(), 4);
    let (final_manifest, mode) = &manifests[3];
    assert_eq!(*mode, ConcatMode::StreamCopy);
    let parts = manifest_files(final_manifest);
    assert_eq!(parts.len(), 3);
    for (index, part) in parts.iter().enumerate() {
        assert!(part.contains(&format!("part-{}-", index)), "unexpected part {}", part);
    }

    let narrated: Vec<String> = harness.narrator.calls().into_iter().map(|(text, _)| text).collect();
    assert_eq!(
        narrated,
        vec![
            "[en] Una iglesia. Muy bonita.",
            "[en] Un puente romano.",
            "[en] Una torre. Alta. Antigua.",
        ]
    );
    Ok(())
}

/// Test that a record without an image gets the default background
#[tokio::test]
async fn test_generateMultiVideo_withMissingImage_shouldUseDefaultForThatRecord() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(4.0), MockTranslator::identity())?;

    harness
        .pipeline
        .generate_multi_video_from_records(&three_records(), "en", LengthVariant::Extended)
        .await?;

    assert_eq!(harness.images.fetch_count(common::DEFAULT_IMAGE_URL), 1);
    assert_eq!(harness.images.fetch_count(common::BACKGROUND_URL), 2);
    Ok(())
}

/// Test that progress is reported after every finished record
#[tokio::test]
async fn test_generateMultiVideo_withProgress_shouldReportEachPart() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Still, MockNarrator::working(2.0), MockTranslator::identity())?;
    let reported = Mutex::new(Vec::new());

    harness
        .pipeline
        .generate_multi_video_with_progress(&three_records(), "local", LengthVariant::Extended, |done| {
            reported.lock().push(done)
        })
        .await?;

    assert_eq!(*reported.lock(), vec![1, 2, 3]);
    assert!(harness.narrator.calls().iter().all(|(_, language)| language == "es"));
    assert!(harness.leftover_files().is_empty(), "leftover: {:?}", harness.leftover_files());
    Ok(())
}

/// Test that an empty batch is rejected
#[tokio::test]
async fn test_generateMultiVideo_withNoRecords_shouldBeInvalidInput() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(4.0), MockTranslator::identity())?;

    let error = harness
        .pipeline
        .generate_multi_video_from_records(&[], "en", LengthVariant::Extended)
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::InvalidInput);
    assert_eq!(error.status_code(), 400);
    Ok(())
}

/// Test that one malformed record rejects the batch before any work starts
#[tokio::test]
async fn test_generateMultiVideo_withMalformedRecord_shouldFailBeforeNarrating() -> Result<()> {
    let harness = TestHarness::new(RenderStrategy::Clip, MockNarrator::working(4.0), MockTranslator::identity())?;
    let mut records = three_records();
    records.push(HeritageRecord::default());

    let error = harness
        .pipeline
        .generate_multi_video_from_records(&records, "en", LengthVariant::Extended)
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::InvalidInput);
    assert!(harness.narrator.calls().is_empty());
    Ok(())
}

/// Test that a failure in a later record removes the parts already written
#[tokio::test]
async fn test_generateMultiVideo_withFailingSecondRecord_shouldCleanEverything() -> Result<()> {
    // The first record has two units, so clip call 2 belongs to the second record
    let harness = TestHarness::with_parts(
        RenderStrategy::Clip,
        MockNarrator::working(4.0),
        MockTranslator::identity(),
        common::stocked_images(),
        RecordingTranscoder::new().failing_clip_at(2),
    )?;

    let error = harness
        .pipeline
        .generate_multi_video_from_records(&three_records(), "en", LengthVariant::Extended)
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::RenderFailure);
    assert_eq!(harness.narrator.calls().len(), 2);
    assert!(harness.leftover_files().is_empty(), "leftover: {:?}", harness.leftover_files());
    Ok(())
}
