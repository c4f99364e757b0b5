/*!
 * Tests for heritage records and their helpers
 */

use ocity::errors::ErrorKind;
use ocity::pipeline::record::{is_local_language, resolve_language, strip_query, truncate_text};
use ocity::pipeline::{HeritageRecord, LengthVariant};

fn record_json() -> &'static str {
    r#"{
        "id": "site-42",
        "name": "Old Mill",
        "description": {
            "local": {
                "short": "Un molino. Muy antiguo.",
                "extended": "Un molino harinero del siglo XVIII."
            }
        },
        "image": "https://images.test/mill.jpg?w=1200&q=80"
    }"#
}

/// Test that a catalogue record deserializes with its length variants
#[test]
fn test_heritageRecord_fromJson_shouldExposeVariants() {
    let record: HeritageRecord = serde_json::from_str(record_json()).unwrap();

    assert_eq!(record.text_for(LengthVariant::Short).unwrap(), "Un molino. Muy antiguo.");
    assert_eq!(
        record.text_for(LengthVariant::Extended).unwrap(),
        "Un molino harinero del siglo XVIII."
    );
    assert_eq!(record.label(), "site-42");
}

/// Test that the image URL loses its query string
#[test]
fn test_resolveImage_withQuery_shouldStripIt() {
    let record: HeritageRecord = serde_json::from_str(record_json()).unwrap();
    assert_eq!(record.resolve_image("https://default.test/x.png"), "https://images.test/mill.jpg");
}

/// Test that a record without an image uses the default URL
#[test]
fn test_resolveImage_withoutImage_shouldUseDefault() {
    let record: HeritageRecord = serde_json::from_str(r#"{"description": {"local": {"extended": "x"}}}"#).unwrap();
    assert_eq!(record.resolve_image("https://default.test/x.png"), "https://default.test/x.png");
    assert_eq!(record.label(), "<unnamed>");
}

/// Test that a missing variant is a caller error
#[test]
fn test_textFor_withMissingVariant_shouldBeInvalidInput() {
    let record: HeritageRecord =
        serde_json::from_str(r#"{"name": "Bridge", "description": {"local": {"extended": "x"}}}"#).unwrap();

    let error = record.text_for(LengthVariant::Short).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidInput);
    assert!(error.to_string().contains("Bridge"));
}

/// Test that a blank variant is treated as missing
#[test]
fn test_textFor_withBlankText_shouldBeInvalidInput() {
    let record: HeritageRecord = serde_json::from_str(r#"{"description": {"local": {"short": "  "}}}"#).unwrap();
    assert!(record.text_for(LengthVariant::Short).is_err());
}

/// Test that a record without a description still parses
#[test]
fn test_heritageRecord_withoutDescription_shouldParseEmpty() {
    let record: HeritageRecord = serde_json::from_str("{}").unwrap();
    assert!(record.description.local.is_empty());
}

/// Test the accepted length variant names
#[test]
fn test_lengthVariant_fromStr_shouldAcceptAliases() {
    assert_eq!("short".parse::<LengthVariant>().unwrap(), LengthVariant::Short);
    assert_eq!("Long".parse::<LengthVariant>().unwrap(), LengthVariant::Extended);
    assert_eq!(LengthVariant::default(), LengthVariant::Extended);
    assert!("medium".parse::<LengthVariant>().is_err());
}

/// Test that truncation adds an ellipsis only when text was cut
#[test]
fn test_truncateText_withLongText_shouldAppendEllipsis() {
    assert_eq!(truncate_text("abcdef", 4), "abcd...");
    assert_eq!(truncate_text("abcd", 4), "abcd");
}

/// Test query stripping keeps URLs without a query intact
#[test]
fn test_stripQuery_shouldCutAtFirstQuestionMark() {
    assert_eq!(strip_query("https://a.test/p.png?x=1?y=2"), "https://a.test/p.png");
    assert_eq!(strip_query("https://a.test/p.png"), "https://a.test/p.png");
}

/// Test that the local sentinel maps to the native language
#[test]
fn test_resolveLanguage_withSentinel_shouldUseNative() {
    assert_eq!(resolve_language("local", "local", "es"), "es");
    assert_eq!(resolve_language("LOCAL", "local", "es"), "es");
    assert_eq!(resolve_language("fr", "local", "es"), "fr");
}

/// Test that only the sentinel itself counts as the record's own language
#[test]
fn test_isLocalLanguage_shouldMatchSentinelOnly() {
    assert!(is_local_language(" Local ", "local"));
    assert!(!is_local_language("es", "local"));
    assert!(!is_local_language("", "local"));
}
