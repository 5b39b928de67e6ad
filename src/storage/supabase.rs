//! Supabase Storage backend over its REST API.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | upload    | `POST {url}/storage/v1/object/{bucket}/{path}` with `x-upsert: false` |
//! | public    | `{url}/storage/v1/object/public/{bucket}/{path}` |
//! | sign      | `POST {url}/storage/v1/object/sign/{bucket}/{path}` with `{"expiresIn": ttl}` |
//!
//! Requests authenticate with the service-role key, sent both as a bearer
//! token and as the `apikey` header.

use super::{trim_base, ObjectStorage};
use crate::error::StorageError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Default bucket holding memory images and collages.
pub const DEFAULT_BUCKET: &str = "memory-images";

#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

#[derive(Deserialize, Default)]
struct StorageErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "statusCode")]
    status_code: Option<String>,
}

impl SupabaseStorage {
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StorageError::Transport {
                path: String::new(),
                reason: e.to_string(),
            })?;
        let base_url: String = base_url.into();
        let base_url = trim_base(&base_url).to_string();
        Ok(Self {
            client,
            base_url,
            service_key: service_key.into(),
            bucket: bucket.into(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(&self, kind: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}{}/{}",
            self.base_url, kind, self.bucket, path
        )
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    fn transport(path: &str, e: reqwest::Error) -> StorageError {
        StorageError::Transport {
            path: path.to_string(),
            reason: e.to_string(),
        }
    }

    async fn rejection(path: &str, response: reqwest::Response) -> StorageError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body: StorageErrorBody = serde_json::from_str(&text).unwrap_or_default();

        let duplicate = status == StatusCode::CONFLICT
            || body.status_code.as_deref() == Some("409")
            || body
                .error
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case("duplicate"))
            || body
                .message
                .as_deref()
                .is_some_and(|m| m.contains("already exists"));
        if duplicate {
            return StorageError::AlreadyExists {
                path: path.to_string(),
            };
        }

        StorageError::Rejected {
            path: path.to_string(),
            status: status.as_u16(),
            message: body.message.or(body.error).unwrap_or(text),
        }
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let len = bytes.len();
        let response = self
            .authorized(self.client.post(self.object_url("", path)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| Self::transport(path, e))?;

        if !response.status().is_success() {
            return Err(Self::rejection(path, response).await);
        }
        info!("Uploaded {} bytes to {}/{}", len, self.bucket, path);
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        self.object_url("public/", path)
    }

    async fn create_signed_url(&self, path: &str, ttl_secs: u64) -> Result<String, StorageError> {
        let response = self
            .authorized(self.client.post(self.object_url("sign/", path)))
            .json(&serde_json::json!({ "expiresIn": ttl_secs }))
            .send()
            .await
            .map_err(|e| Self::transport(path, e))?;

        if !response.status().is_success() {
            return Err(Self::rejection(path, response).await);
        }

        let signed: SignedUrlResponse =
            response
                .json()
                .await
                .map_err(|e| StorageError::MalformedResponse {
                    path: path.to_string(),
                    detail: e.to_string(),
                })?;
        debug!("Signed {} for {}s", path, ttl_secs);
        Ok(format!("{}/storage/v1{}", self.base_url, signed.signed_url))
    }
}
