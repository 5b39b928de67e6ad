//! Source image download.
//!
//! Every source URL is requested independently; one failing image never
//! aborts the batch. [`fetch_all`] waits for every attempt to settle before
//! returning, because the grid is planned from the number of images that
//! actually arrived.

use crate::config::CollageConfig;
use crate::error::{FetchError, TileError};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::{debug, warn};

/// Capability to retrieve the raw bytes behind an image location.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Check if the input string looks like an HTTP(S) URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// [`ImageFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_bytes: usize,
}

impl HttpFetcher {
    /// Build a fetcher with the timeout and size limit from `config`.
    pub fn new(config: &CollageConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            timeout_secs: config.fetch_timeout_secs,
            max_bytes: config.max_image_bytes,
        })
    }

    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if !is_url(url) {
            return Err(FetchError::InvalidUrl);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes as u64 {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let capacity = response
            .content_length()
            .map_or(0, |len| len as usize)
            .min(self.max_bytes);
        let mut bytes = Vec::with_capacity(capacity);
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| self.classify(e))?;
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!("Fetched {} ({} bytes)", url, bytes.len());
        Ok(bytes)
    }
}

/// Download every URL, at most `concurrency` at a time.
///
/// The result has one entry per input URL, in input order.
pub async fn fetch_all(
    fetcher: &dyn ImageFetcher,
    urls: &[String],
    concurrency: usize,
) -> Vec<Result<Vec<u8>, TileError>> {
    stream::iter(urls.iter().cloned().enumerate().map(|(index, url)| async move {
        fetcher.fetch(&url).await.map_err(|e| {
            warn!("Image {}: fetch of {} failed: {}", index, url, e);
            TileError::FetchFailed {
                index,
                url,
                detail: e.to_string(),
            }
        })
    }))
    .buffered(concurrency.max(1))
    .collect()
    .await
}
