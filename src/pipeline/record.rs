use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::PipelineError;

// @module: Heritage records, the structured input of the pipeline

/// A heritage site description as served by the catalogue
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HeritageRecord {
    // @field: Catalogue id, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    // @field: Display name, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    // @field: Texts per length variant
    #[serde(default)]
    pub description: Description,

    // @field: Background image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Description texts of a record
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Description {
    // @field: Texts in the record's own language, keyed by length variant
    #[serde(default)]
    pub local: BTreeMap<String, String>,
}

/// Which description text of a record is narrated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthVariant {
    Short,
    #[default]
    Extended,
}

impl LengthVariant {
    /// Key under `description.local`
    pub fn key(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Extended => "extended",
        }
    }
}

impl std::fmt::Display for LengthVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for LengthVariant {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "extended" | "long" => Ok(Self::Extended),
            other => Err(PipelineError::InvalidInput(format!("unknown length variant '{}'", other))),
        }
    }
}

impl HeritageRecord {
    /// Text for `variant`; missing or blank text is a caller error
    pub fn text_for(&self, variant: LengthVariant) -> Result<&str, PipelineError> {
        self.description
            .local
            .get(variant.key())
            .map(String::as_str)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                PipelineError::InvalidInput(format!(
                    "record {} has no description.local.{} text",
                    self.label(),
                    variant.key()
                ))
            })
    }

    /// Id or name for log and error messages
    pub fn label(&self) -> String {
        self.id
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| "<unnamed>".to_string())
    }

    /// Background URL: the record's image without its query string, or `default_url`
    pub fn resolve_image(&self, default_url: &str) -> String {
        let url = self
            .image
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(default_url);
        strip_query(url).to_string()
    }
}

/// Everything before the first `?`
pub fn strip_query(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}

/// Cut text to `max_chars` characters, marking a cut with `...`
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Map the "use the record's own language" sentinel to the native language
/// Whether `target` asks for the record's own language
pub fn is_local_language(target: &str, sentinel: &str) -> bool {
    target.trim().eq_ignore_ascii_case(sentinel)
}

pub fn resolve_language<'a>(target: &'a str, sentinel: &str, native: &'a str) -> &'a str {
    if is_local_language(target, sentinel) {
        native
    } else {
        target
    }
}
