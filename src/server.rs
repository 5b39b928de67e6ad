//! HTTP boundary for the compositor.
//!
//! | Route | Method | Response |
//! |-------|--------|----------|
//! | `/create-memory-collage` | `POST` | `200 {collageUrl}`, `400 {error}`, `500 {error, details}` |
//! | `/health` | `GET` | `200 {status, version}` |
//! | `{media route}/*` | `GET` | stored objects, when a media directory is mounted |
//!
//! Every response, including `OPTIONS` preflights on any path, carries
//! permissive CORS headers so browser clients can call the endpoint directly.

use crate::compose::Compositor;
use crate::error::CollageError;
use crate::output::CollageRequest;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub compositor: Arc<Compositor>,
    /// Deadline for one collage operation.
    pub timeout: Duration,
    /// Route prefix and directory of locally stored objects served over HTTP.
    pub media: Option<(String, PathBuf)>,
}

impl AppState {
    pub fn new(compositor: Compositor) -> Self {
        let timeout = Duration::from_secs(compositor.config().operation_timeout_secs);
        Self {
            compositor: Arc::new(compositor),
            timeout,
            media: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Serve the files under `dir` at `route` (e.g. `/media`).
    pub fn with_media(mut self, route: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.media = Some((route.into(), dir.into()));
        self
    }
}

/// Path component of `public_base_url`, used as the media route.
///
/// `http://localhost:8080/media/` gives `/media`; a bare origin gives `/`.
pub fn media_route(public_base_url: &str) -> Result<String, CollageError> {
    let url = reqwest::Url::parse(public_base_url).map_err(|e| {
        CollageError::Internal(format!("Invalid public base URL {}: {}", public_base_url, e))
    })?;
    let path = url.path().trim_end_matches('/');
    Ok(if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    })
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ]);

    let mut router = Router::new()
        .route("/create-memory-collage", post(create_memory_collage))
        .route("/health", get(health));

    if let Some((ref route, ref dir)) = state.media {
        info!("Serving {} at {}", dir.display(), route);
        let files = ServeDir::new(dir);
        router = if route == "/" {
            router.fallback_service(files)
        } else {
            router.nest_service(route, files)
        };
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Converts a [`CollageError`] into the endpoint's JSON error shape.
pub struct AppError(CollageError);

impl From<CollageError> for AppError {
    fn from(e: CollageError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            CollageError::NoImages => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "No images provided" }),
            ),
            CollageError::InvalidOwnerId { .. } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid memoryId" }),
            ),
            CollageError::InvalidRequest(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid request body", "details": details }),
            ),
            other => {
                error!(error = %other, "Collage creation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to create collage", "details": other.to_string() }),
                )
            }
        };
        if status.is_client_error() {
            warn!(status = %status, error = %self.0, "Rejected collage request");
        }
        (status, Json(body)).into_response()
    }
}

/// Parse the endpoint body. `imageUrls` must be a non-empty array of strings.
fn parse_request(body: &[u8]) -> Result<CollageRequest, CollageError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| CollageError::InvalidRequest(e.to_string()))?;

    let images: Vec<String> = match value.get("imageUrls") {
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or(CollageError::NoImages)?,
        _ => return Err(CollageError::NoImages),
    };

    let memory_id = value
        .get("memoryId")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let title = value
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(CollageRequest::new(images, memory_id, title))
}

async fn create_memory_collage(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let request = parse_request(&body)?;
    info!(
        "Collage requested for memory {} with {} images",
        request.owner_id,
        request.source_images.len()
    );

    let output = tokio::time::timeout(state.timeout, state.compositor.create_collage(&request))
        .await
        .map_err(|_| CollageError::Timeout {
            secs: state.timeout.as_secs(),
        })??
        .ok_or(CollageError::NoImages)?;

    Ok(Json(json!({ "collageUrl": output.location })))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_full_body() {
        let req = parse_request(
            br#"{"imageUrls":["https://a","https://b"],"memoryId":"m1","title":"Beach"}"#,
        )
        .unwrap();
        assert_eq!(req.source_images, vec!["https://a", "https://b"]);
        assert_eq!(req.owner_id, "m1");
        assert_eq!(req.caption.as_deref(), Some("Beach"));
    }

    #[test]
    fn parse_rejects_missing_or_empty_images() {
        for body in [
            r#"{"memoryId":"m1"}"#,
            r#"{"imageUrls":[],"memoryId":"m1"}"#,
            r#"{"imageUrls":"https://a","memoryId":"m1"}"#,
            r#"{"imageUrls":[1,2],"memoryId":"m1"}"#,
            r#"[]"#,
        ] {
            assert!(
                matches!(parse_request(body.as_bytes()), Err(CollageError::NoImages)),
                "{body}"
            );
        }
    }

    #[test]
    fn parse_rejects_malformed_json() {
        assert!(matches!(
            parse_request(b"{not json"),
            Err(CollageError::InvalidRequest(_))
        ));
    }

    #[test]
    fn missing_memory_id_becomes_empty() {
        let req = parse_request(br#"{"imageUrls":["https://a","https://b"]}"#).unwrap();
        assert_eq!(req.owner_id, "");
        assert_eq!(req.caption, None);
    }

    #[test]
    fn media_route_is_the_base_url_path() {
        assert_eq!(media_route("http://localhost:8080/media").unwrap(), "/media");
        assert_eq!(media_route("http://localhost:8080/media/").unwrap(), "/media");
        assert_eq!(media_route("https://cdn.test/a/b").unwrap(), "/a/b");
        assert_eq!(media_route("http://localhost:8080").unwrap(), "/");
        assert!(media_route("not a url").is_err());
    }

    #[test]
    fn server_errors_map_to_500() {
        let resp = AppError(CollageError::Timeout { secs: 60 }).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let resp = AppError(CollageError::NoImages).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
