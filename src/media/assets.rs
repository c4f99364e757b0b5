use bytes::Bytes;
use futures::future::join_all;
use image::{AnimationDecoder, ImageFormat};
use log::{debug, info, warn};
use std::io::Cursor;
use std::path::PathBuf;

use crate::errors::{PipelineError, ProviderError};
use crate::file_utils::RunScope;
use crate::providers::ImageSource;

// @module: Avatar and background resolution with fallbacks

/// Background of every segment in a run
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    /// Downloaded image inside the run scope
    Image { path: PathBuf, animated: bool },
    /// Flat colour frame marked "image unavailable"
    Placeholder,
}

impl Background {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder)
    }
}

/// Everything downloaded before rendering starts
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAssets {
    // @field: Background shared by all segments
    pub background: Background,

    // @field: Usable avatar poses in configured order
    pub avatars: Vec<PathBuf>,
}

/// Whether the bytes are a GIF with more than one frame
pub fn is_animated_gif(bytes: &[u8]) -> bool {
    if !matches!(image::guess_format(bytes), Ok(ImageFormat::Gif)) {
        return false;
    }
    match image::codecs::gif::GifDecoder::new(Cursor::new(bytes)) {
        Ok(decoder) => decoder.into_frames().take(2).filter(Result::is_ok).count() > 1,
        Err(e) => {
            debug!("Unreadable GIF: {}", e);
            false
        }
    }
}

/// Download an image, trying up to `attempts` times. Bodies that are not a
/// recognised image format count as failed attempts.
pub async fn fetch_image(
    source: &dyn ImageSource,
    url: &str,
    attempts: u32,
) -> Result<(Bytes, ImageFormat), ProviderError> {
    let attempts = attempts.max(1);
    let mut last_error = ProviderError::EmptyResponse(format!("No attempt made for {}", url));

    for attempt in 1..=attempts {
        let result = source.fetch(url).await.and_then(|bytes| {
            let format = image::guess_format(&bytes)
                .map_err(|e| ProviderError::ParseError(format!("{} is not an image: {}", url, e)))?;
            Ok((bytes, format))
        });
        match result {
            Ok(image) => return Ok(image),
            Err(e) => {
                warn!("Image fetch {}/{} failed for {}: {}", attempt, attempts, url, e);
                last_error = e;
            }
        }
    }
    Err(last_error)
}

async fn store_image(scope: &RunScope, prefix: &str, bytes: &[u8], format: ImageFormat) -> Result<PathBuf, PipelineError> {
    let extension = format.extensions_str().first().copied().unwrap_or("img");
    let path = scope.allocate(prefix, extension);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Download every avatar pose concurrently, keeping configured order.
///
/// Poses that fail to download are skipped. Zero usable poses aborts the run.
pub async fn resolve_avatars(
    source: &dyn ImageSource,
    urls: &[String],
    attempts: u32,
    scope: &RunScope,
) -> Result<Vec<PathBuf>, PipelineError> {
    let downloads = join_all(
        urls.iter()
            .filter(|url| !url.trim().is_empty())
            .map(|url| fetch_image(source, url, attempts)),
    )
    .await;

    let mut avatars = Vec::new();
    for (index, download) in downloads.into_iter().enumerate() {
        match download {
            Ok((bytes, format)) => {
                avatars.push(store_image(scope, &format!("avatar-{}", index), &bytes, format).await?);
            }
            Err(e) => warn!("Skipping avatar pose {}: {}", index, e),
        }
    }

    if avatars.is_empty() {
        return Err(PipelineError::upstream(
            "downloading avatar poses",
            ProviderError::EmptyResponse("no usable avatar images".to_string()),
        ));
    }
    debug!("Resolved {} avatar pose(s)", avatars.len());
    Ok(avatars)
}

/// Resolve the background: requested image, then the default image, then the
/// placeholder frame. Never fails for network reasons.
pub async fn resolve_background(
    source: &dyn ImageSource,
    requested: Option<&str>,
    default_url: &str,
    attempts: u32,
    scope: &RunScope,
) -> Result<Background, PipelineError> {
    let candidates = requested
        .filter(|url| !url.trim().is_empty())
        .into_iter()
        .chain(std::iter::once(default_url))
        .filter(|url| !url.trim().is_empty());

    let mut tried = Vec::new();
    for url in candidates {
        if tried.contains(&url) {
            continue;
        }
        tried.push(url);

        match fetch_image(source, url, attempts).await {
            Ok((bytes, format)) => {
                let animated = source.is_animated(&bytes);
                let path = store_image(scope, "background", &bytes, format).await?;
                if tried.len() > 1 {
                    info!("Using default background image");
                }
                return Ok(Background::Image { path, animated });
            }
            Err(e) => warn!("Background {} unavailable: {}", url, e),
        }
    }

    warn!("No background image could be fetched, using placeholder frame");
    Ok(Background::Placeholder)
}
