use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;

use crate::app_config::AssetConfig;
use crate::errors::ProviderError;
use crate::providers::ImageSource;

/// Plain HTTP(S) image downloader
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    /// HTTP client for making requests
    client: Client,
}

impl HttpImageSource {
    pub fn new(config: &AssetConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, ProviderError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(ProviderError::EmptyResponse(format!("No image data at {}", url)));
        }
        Ok(body)
    }
}
