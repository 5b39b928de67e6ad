//! Caller-side cover selection.
//!
//! Memory create and edit flows both want the same thing: a collage when
//! the service can make one, otherwise the first uploaded image plus a
//! non-fatal warning for the user. [`resolve_cover_image`] is that policy;
//! [`CollageClient`] calls the HTTP endpoint and applies it.

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Warning surfaced to the user when the cover falls back to the first image.
pub const FALLBACK_WARNING: &str = "collage could not be created, images were still saved";

/// The cover image chosen for a memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverImage {
    /// The collage (or, for one image, that image) returned by the service.
    Collage(String),
    /// The service failed; this is the first source image.
    Fallback(String),
    /// No images at all.
    None,
}

impl CoverImage {
    pub fn url(&self) -> Option<&str> {
        match self {
            CoverImage::Collage(url) | CoverImage::Fallback(url) => Some(url),
            CoverImage::None => None,
        }
    }

    /// Whether the user should see [`FALLBACK_WARNING`].
    pub fn is_degraded(&self) -> bool {
        matches!(self, CoverImage::Fallback(_))
    }

    pub fn warning(&self) -> Option<&'static str> {
        self.is_degraded().then_some(FALLBACK_WARNING)
    }
}

/// Pick the cover from the outcome of a collage request.
pub fn resolve_cover_image(
    result: Result<String, ClientError>,
    source_urls: &[String],
) -> CoverImage {
    match result {
        Ok(url) => CoverImage::Collage(url),
        Err(e) => match source_urls.first() {
            Some(first) => {
                warn!("Collage unavailable, using first image as cover: {}", e);
                CoverImage::Fallback(first.clone())
            }
            None => {
                warn!("Collage unavailable and no source images: {}", e);
                CoverImage::None
            }
        },
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CollageRequestBody<'a> {
    image_urls: &'a [String],
    memory_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollageResponseBody {
    collage_url: Option<String>,
}

/// HTTP client for the collage endpoint.
#[derive(Debug, Clone)]
pub struct CollageClient {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
    api_key: Option<String>,
}

impl CollageClient {
    /// `endpoint` is the full URL of `POST /create-memory-collage`.
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout_secs,
            api_key: None,
        }
    }

    /// Send `key` as bearer token and `apikey` header.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Ask the service for a collage and return its URL.
    pub async fn request_collage(
        &self,
        image_urls: &[String],
        memory_id: &str,
        title: Option<&str>,
    ) -> Result<String, ClientError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&CollageRequestBody {
                image_urls,
                memory_id,
                title,
            });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key).header("apikey", key);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: CollageResponseBody = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.classify(e)
            } else {
                ClientError::MalformedResponse(e.to_string())
            }
        })?;
        let url = body
            .collage_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ClientError::MalformedResponse("missing collageUrl".into()))?;
        debug!("Collage for {} ready at {}", memory_id, url);
        Ok(url)
    }

    /// Request a collage and fall back to the first image on any failure.
    ///
    /// Zero images yields [`CoverImage::None`] and one image is used as-is;
    /// neither calls the service.
    pub async fn cover_image(
        &self,
        image_urls: &[String],
        memory_id: &str,
        title: Option<&str>,
    ) -> CoverImage {
        match image_urls {
            [] => CoverImage::None,
            [only] => CoverImage::Collage(only.clone()),
            _ => resolve_cover_image(
                self.request_collage(image_urls, memory_id, title).await,
                image_urls,
            ),
        }
    }

    fn classify(&self, e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}
