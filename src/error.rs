//! Error types for the memory-collage library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CollageError`]: **fatal**, the collage cannot be produced at all
//!   (no images supplied, every download failed, the result could not be
//!   stored). Returned as `Err(CollageError)` from
//!   [`crate::compose::Compositor::create_collage`].
//!
//! * [`TileError`]: **non-fatal**, a single source image failed to download
//!   or decode. Collected in [`crate::output::CollageOutput::tile_errors`];
//!   the affected tile is left blank and the collage is still published as
//!   long as at least one image was fetched.
//!
//! Storage backends, the image codec and the caller-side client have their
//! own narrower error types ([`StorageError`], [`CodecError`],
//! [`ClientError`]) which the orchestrator folds into [`CollageError`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the compositor.
///
/// Per-image failures use [`TileError`] and are stored in
/// [`crate::output::CollageOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum CollageError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The request carried no source images.
    #[error("No images provided")]
    NoImages,

    /// The owner identifier cannot be used as a storage path segment.
    #[error("Invalid memoryId '{owner_id}': expected 1-128 characters from [A-Za-z0-9_-]")]
    InvalidOwnerId { owner_id: String },

    /// The request body could not be interpreted.
    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Every source image failed to download; there is nothing to render.
    #[error("All {total} source images failed to download.\nFirst error: {first_error}")]
    AllFetchesFailed { total: usize, first_error: String },

    /// The finished canvas could not be encoded.
    #[error("Failed to encode collage: {0}")]
    EncodeFailed(String),

    /// The encoded collage could not be written to (or signed by) storage.
    #[error("Failed to upload collage to '{path}': {reason}")]
    PublishFailed { path: String, reason: String },

    /// The whole operation exceeded the caller-imposed deadline.
    #[error("Collage creation timed out after {secs}s")]
    Timeout { secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured caption font could not be read or parsed.
    #[error("Failed to load caption font '{path}': {detail}")]
    FontLoadFailed { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CollageError {
    /// Whether the error was caused by the request rather than the service.
    ///
    /// Client errors map to HTTP 400 and are never worth retrying.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CollageError::NoImages
                | CollageError::InvalidOwnerId { .. }
                | CollageError::InvalidRequest(_)
        )
    }
}

/// A non-fatal error for a single source image.
///
/// `index` is the 0-based position of the image in the request.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum TileError {
    /// Download failed (network error, non-success status, oversize body).
    #[error("Image {index}: failed to fetch '{url}': {detail}")]
    FetchFailed {
        index: usize,
        url: String,
        detail: String,
    },

    /// Bytes were downloaded but could not be decoded into a bitmap.
    #[error("Image {index}: failed to decode: {detail}")]
    DecodeFailed { index: usize, detail: String },
}

impl TileError {
    /// Position of the failing image in the request.
    pub fn index(&self) -> usize {
        match self {
            TileError::FetchFailed { index, .. } | TileError::DecodeFailed { index, .. } => *index,
        }
    }
}

/// Errors raised by an [`crate::pipeline::fetch::ImageFetcher`] for one URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The string is not an HTTP/HTTPS URL.
    #[error("not a valid HTTP/HTTPS URL")]
    InvalidUrl,

    /// The server answered with a non-success status.
    #[error("HTTP {status}")]
    Status { status: u16 },

    /// No complete response within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The body exceeds the configured size limit.
    #[error("body larger than {limit} bytes")]
    TooLarge { limit: usize },

    /// Connection or protocol failure.
    #[error("{0}")]
    Transport(String),
}

/// Errors raised by an [`crate::pipeline::codec::ImageCodec`].
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CodecError(pub String);

impl From<image::ImageError> for CodecError {
    fn from(e: image::ImageError) -> Self {
        CodecError(e.to_string())
    }
}

/// Errors raised by an [`crate::storage::ObjectStorage`] backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An object already exists at the destination and overwrite is disabled.
    #[error("Object '{path}' already exists")]
    AlreadyExists { path: String },

    /// The storage service answered with a non-success status.
    #[error("Storage rejected the request for '{path}' (HTTP {status}): {message}")]
    Rejected {
        path: String,
        status: u16,
        message: String,
    },

    /// The storage service could not be reached.
    #[error("Storage request for '{path}' failed: {reason}")]
    Transport { path: String, reason: String },

    /// The storage service answered with a body we could not interpret.
    #[error("Unexpected storage response for '{path}': {detail}")]
    MalformedResponse { path: String, detail: String },

    /// Local filesystem failure.
    #[error("Storage I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backend does not implement the requested operation.
    #[error("Operation '{operation}' is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },
}

/// Errors raised by [`crate::cover::CollageClient`] when calling the endpoint.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint did not answer within the caller's deadline.
    #[error("Collage request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The endpoint could not be reached.
    #[error("Collage request failed: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("Collage endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The endpoint answered 200 without a usable `collageUrl`.
    #[error("Collage endpoint returned an unexpected body: {0}")]
    MalformedResponse(String),
}
