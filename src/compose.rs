//! Collage composition entry point.
//!
//! [`Compositor::create_collage`] turns a memory's image URLs into one cover
//! image: download the sources, lay them out on a grid, draw the caption,
//! encode as JPEG and publish the result to object storage.
//!
//! Per-image failures are absorbed (see [`crate::error::TileError`]); only
//! conditions that leave nothing to publish are returned as
//! [`CollageError`].

use crate::config::CollageConfig;
use crate::error::{CollageError, TileError};
use crate::output::{CollageOutput, CollageRequest, CollageStats};
use crate::pipeline::caption::CaptionFont;
use crate::pipeline::codec::{ImageCodec, RasterCodec};
use crate::pipeline::fetch::{fetch_all, HttpFetcher, ImageFetcher};
use crate::pipeline::render::{render_collage_blocking, SourceImage};
use crate::storage::{collage_object_path, validate_owner_id, ObjectStorage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Composes and publishes collages.
///
/// Holds its collaborators behind trait objects; cheap to share via `Arc`
/// across request handlers.
#[derive(Clone)]
pub struct Compositor {
    config: CollageConfig,
    fetcher: Arc<dyn ImageFetcher>,
    codec: Arc<dyn ImageCodec>,
    storage: Arc<dyn ObjectStorage>,
    font: Option<Arc<CaptionFont>>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("config", &self.config)
            .field("storage", &self.storage.name())
            .field("font", &self.font)
            .finish()
    }
}

impl Compositor {
    /// Build a compositor with the HTTP fetcher and JPEG codec.
    ///
    /// Resolves the caption font up front; a configured font that fails to
    /// load is an error.
    pub fn new(
        config: CollageConfig,
        storage: Arc<dyn ObjectStorage>,
    ) -> Result<Self, CollageError> {
        let fetcher = HttpFetcher::new(&config)
            .map_err(|e| CollageError::Internal(format!("HTTP client setup failed: {}", e)))?;
        let font = Some(Arc::new(CaptionFont::resolve(&config)?));
        Ok(Self {
            codec: Arc::new(RasterCodec::new(config.jpeg_quality)),
            fetcher: Arc::new(fetcher),
            storage,
            font,
            config,
        })
    }

    /// Replace the image fetcher.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the image codec.
    pub fn with_codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Replace the caption font; `None` disables captions.
    pub fn with_font(mut self, font: Option<CaptionFont>) -> Self {
        self.font = font.map(Arc::new);
        self
    }

    pub fn config(&self) -> &CollageConfig {
        &self.config
    }

    /// Produce the cover image for `request`.
    ///
    /// # Returns
    /// * `Ok(None)` when the request has no images.
    /// * `Ok(Some(output))` with the source URL itself when there is exactly
    ///   one image (nothing is fetched or stored).
    /// * `Ok(Some(output))` with the published collage's location otherwise,
    ///   even if some images failed (see `output.tile_errors`).
    ///
    /// # Errors
    /// * [`CollageError::InvalidOwnerId`] when the owner id is unusable as a
    ///   path segment.
    /// * [`CollageError::AllFetchesFailed`] when no image could be downloaded.
    /// * [`CollageError::EncodeFailed`] / [`CollageError::PublishFailed`] when
    ///   the collage could not be produced or stored.
    pub async fn create_collage(
        &self,
        request: &CollageRequest,
    ) -> Result<Option<CollageOutput>, CollageError> {
        let total_start = Instant::now();
        let requested = request.source_images.len();

        // ── Step 1: Trivial requests ─────────────────────────────────────────
        if requested == 0 {
            debug!("No source images; nothing to compose");
            return Ok(None);
        }

        if requested == 1 {
            debug!("Single source image; passing it through unchanged");
            return Ok(Some(CollageOutput {
                location: request.source_images[0].clone(),
                object_path: None,
                tile_errors: Vec::new(),
                stats: CollageStats {
                    requested,
                    total_duration_ms: total_start.elapsed().as_millis() as u64,
                    ..Default::default()
                },
            }));
        }
        validate_owner_id(&request.owner_id)?;

        info!(
            "Composing collage for {} from {} images",
            request.owner_id, requested
        );

        // ── Step 2: Fetch sources ────────────────────────────────────────────
        let fetch_start = Instant::now();
        let results = fetch_all(
            self.fetcher.as_ref(),
            &request.source_images,
            self.config.fetch_concurrency,
        )
        .await;
        let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;

        let mut tile_errors: Vec<TileError> = Vec::new();
        let mut fetched: Vec<SourceImage> = Vec::with_capacity(results.len());
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(bytes) => fetched.push((index, bytes)),
                Err(e) => tile_errors.push(e),
            }
        }
        let fetch_failures = tile_errors.len();

        if fetched.is_empty() {
            let first_error = tile_errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(CollageError::AllFetchesFailed {
                total: requested,
                first_error,
            });
        }
        debug!(
            "Fetched {}/{} images in {}ms",
            fetched.len(),
            requested,
            fetch_duration_ms
        );

        // ── Step 3: Render ───────────────────────────────────────────────────
        let fetched_count = fetched.len();
        let caption = match (request.caption_text(), &self.font) {
            (Some(text), Some(font)) => Some((Arc::clone(font), text.to_string())),
            (Some(_), None) => {
                warn!("Caption requested but captions are disabled; skipping it");
                None
            }
            _ => None,
        };
        let render_start = Instant::now();
        let rendered = render_collage_blocking(
            Arc::clone(&self.codec),
            fetched,
            caption,
            self.config.clone(),
        )
        .await?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        let decode_failures = rendered.tile_errors.len();
        tile_errors.extend(rendered.tile_errors);
        tile_errors.sort_by_key(TileError::index);

        // ── Step 4: Publish ──────────────────────────────────────────────────
        let millis = chrono::Utc::now().timestamp_millis();
        let object_path =
            collage_object_path(&request.owner_id, millis, rendered.image.extension());
        let encoded_bytes = rendered.image.bytes.len();

        let publish_start = Instant::now();
        self.storage
            .upload(&object_path, rendered.image.bytes, rendered.image.mime_type)
            .await
            .map_err(|e| CollageError::PublishFailed {
                path: object_path.clone(),
                reason: e.to_string(),
            })?;

        let location = match self.config.signed_url_ttl_secs {
            Some(ttl) => self
                .storage
                .create_signed_url(&object_path, ttl)
                .await
                .map_err(|e| CollageError::PublishFailed {
                    path: object_path.clone(),
                    reason: e.to_string(),
                })?,
            None => self.storage.public_url(&object_path),
        };
        let publish_duration_ms = publish_start.elapsed().as_millis() as u64;

        // ── Step 5: Stats ────────────────────────────────────────────────────
        let stats = CollageStats {
            requested,
            fetched: fetched_count,
            fetch_failures,
            decode_failures,
            tiles_drawn: rendered.tiles_drawn,
            dropped: rendered.dropped,
            encoded_bytes,
            fetch_duration_ms,
            render_duration_ms,
            publish_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Collage published to {} via {}: {}/{} tiles in a {}x{} grid, {} failed, {}ms total",
            object_path,
            self.storage.name(),
            stats.tiles_drawn,
            requested,
            rendered.layout.columns,
            rendered.layout.rows,
            tile_errors.len(),
            stats.total_duration_ms
        );

        Ok(Some(CollageOutput {
            location,
            object_path: Some(object_path),
            tile_errors,
            stats,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, StorageError};
    use crate::storage::LocalStorage;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MapFetcher {
        images: HashMap<String, Vec<u8>>,
        calls: AtomicUsize,
    }

    impl MapFetcher {
        fn new(entries: &[(&str, Vec<u8>)]) -> Self {
            Self {
                images: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.images
                .get(url)
                .cloned()
                .ok_or(FetchError::Status { status: 404 })
        }
    }

    struct RejectingStorage;

    #[async_trait]
    impl ObjectStorage for RejectingStorage {
        fn name(&self) -> &'static str {
            "rejecting"
        }
        async fn upload(&self, path: &str, _: Vec<u8>, _: &str) -> Result<(), StorageError> {
            Err(StorageError::AlreadyExists {
                path: path.to_string(),
            })
        }
        fn public_url(&self, path: &str) -> String {
            format!("mem://{path}")
        }
        async fn create_signed_url(&self, path: &str, _: u64) -> Result<String, StorageError> {
            Ok(format!("mem://{path}?signed"))
        }
    }

    fn png(color: [u8; 3]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(16, 12, Rgba([color[0], color[1], color[2], 255]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://img/{i}.png")).collect()
    }

    fn compositor(
        dir: &std::path::Path,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Compositor {
        let storage = Arc::new(LocalStorage::new(dir, "http://cdn"));
        Compositor::new(CollageConfig::default(), storage)
            .unwrap()
            .with_fetcher(fetcher)
            .with_font(None)
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn create_collage_future_is_send() {
        let dir = tempfile::tempdir().unwrap();
        let c = compositor(dir.path(), Arc::new(MapFetcher::new(&[])));
        let request = CollageRequest::new(urls(3), "m1", None);
        let future = c.create_collage(&request);
        assert_send(&future);
    }

    #[tokio::test]
    async fn empty_request_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let c = compositor(dir.path(), Arc::new(MapFetcher::new(&[])));
        let out = c
            .create_collage(&CollageRequest::new(vec![], "m1", None))
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn single_image_passes_through_without_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(MapFetcher::new(&[]));
        let c = compositor(dir.path(), fetcher.clone());
        let out = c
            .create_collage(&CollageRequest::new(
                vec!["https://img/only.jpg".into()],
                "m1",
                Some("Beach".into()),
            ))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(out.location, "https://img/only.jpg");
        assert!(!out.is_composite());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn single_image_skips_owner_id_check() {
        let dir = tempfile::tempdir().unwrap();
        let c = compositor(dir.path(), Arc::new(MapFetcher::new(&[])));
        for owner in ["", "../not/a/segment"] {
            let out = c
                .create_collage(&CollageRequest::new(
                    vec!["https://img/only.jpg".into()],
                    owner,
                    None,
                ))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(out.location, "https://img/only.jpg");
        }
    }

    #[tokio::test]
    async fn composes_and_publishes_under_owner_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let all = urls(4);
        let entries: Vec<(&str, Vec<u8>)> =
            all.iter().map(|u| (u.as_str(), png([200, 0, 0]))).collect();
        let c = compositor(dir.path(), Arc::new(MapFetcher::new(&entries)));

        let out = c
            .create_collage(&CollageRequest::new(all, "m1", Some("Beach Day".into())))
            .await
            .unwrap()
            .unwrap();

        let path = out.object_path.clone().unwrap();
        assert!(path.starts_with("m1/collage-m1-"), "{path}");
        assert!(path.ends_with(".jpg"));
        assert_eq!(out.location, format!("http://cdn/{path}"));
        assert!(out.tile_errors.is_empty());
        assert_eq!(out.stats.tiles_drawn, 4);
        assert_eq!(out.stats.fetched, 4);

        let stored = std::fs::read(dir.path().join(&path)).unwrap();
        let img = image::load_from_memory(&stored).unwrap();
        assert_eq!((img.width(), img.height()), (800, 600));
    }

    #[tokio::test]
    async fn failed_fetches_are_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let all = urls(4);
        let entries: Vec<(&str, Vec<u8>)> = all
            .iter()
            .take(3)
            .map(|u| (u.as_str(), png([0, 0, 200])))
            .collect();
        let c = compositor(dir.path(), Arc::new(MapFetcher::new(&entries)));

        let out = c
            .create_collage(&CollageRequest::new(all, "m1", None))
            .await
            .unwrap()
            .unwrap();

        assert!(out.is_composite());
        assert_eq!(out.stats.fetch_failures, 1);
        assert_eq!(out.stats.tiles_drawn, 3);
        assert_eq!(out.tile_errors.len(), 1);
        assert_eq!(out.tile_errors[0].index(), 3);
    }

    #[tokio::test]
    async fn all_fetches_failing_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let c = compositor(dir.path(), Arc::new(MapFetcher::new(&[])));
        let err = c
            .create_collage(&CollageRequest::new(urls(3), "m1", None))
            .await
            .unwrap_err();
        match err {
            CollageError::AllFetchesFailed { total, first_error } => {
                assert_eq!(total, 3);
                assert!(first_error.contains("HTTP 404"), "{first_error}");
            }
            other => panic!("expected AllFetchesFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_owner_id_is_rejected_before_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(MapFetcher::new(&[]));
        let c = compositor(dir.path(), fetcher.clone());
        let err = c
            .create_collage(&CollageRequest::new(urls(2), "../escape", None))
            .await
            .unwrap_err();
        assert!(matches!(err, CollageError::InvalidOwnerId { .. }));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn storage_conflict_is_a_publish_failure() {
        let all = urls(2);
        let entries: Vec<(&str, Vec<u8>)> =
            all.iter().map(|u| (u.as_str(), png([0, 200, 0]))).collect();
        let c = Compositor::new(CollageConfig::default(), Arc::new(RejectingStorage))
            .unwrap()
            .with_fetcher(Arc::new(MapFetcher::new(&entries)))
            .with_font(None);

        let err = c
            .create_collage(&CollageRequest::new(all, "m1", None))
            .await
            .unwrap_err();
        assert!(matches!(err, CollageError::PublishFailed { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn local_storage_cannot_sign() {
        let dir = tempfile::tempdir().unwrap();
        let all = urls(2);
        let entries: Vec<(&str, Vec<u8>)> =
            all.iter().map(|u| (u.as_str(), png([9, 9, 9]))).collect();
        let config = CollageConfig::builder()
            .signed_url_ttl_secs(600)
            .build()
            .unwrap();
        let c = Compositor::new(config, Arc::new(LocalStorage::new(dir.path(), "http://cdn")))
            .unwrap()
            .with_fetcher(Arc::new(MapFetcher::new(&entries)))
            .with_font(None);

        let err = c
            .create_collage(&CollageRequest::new(all, "m1", None))
            .await
            .unwrap_err();
        assert!(matches!(err, CollageError::PublishFailed { .. }));
    }
}
