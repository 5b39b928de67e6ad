//! # memory-collage
//!
//! Compose a memory's photos into a single cover image.
//!
//! A memory in the journal can carry any number of photos, but lists and
//! cards show one cover. This crate downloads the photos, tiles them on an
//! 800×600 canvas, writes the memory's title along the bottom, stores the
//! JPEG in object storage and hands back its URL.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image URLs
//!  │
//!  ├─ 1. Fetch    download every source concurrently; failures are per image
//!  ├─ 2. Layout   1×1 … 3×3 grid chosen from the fetched count
//!  ├─ 3. Render   scale-to-fit + centre each image, overlay caption
//!  │              (CPU-bound, spawn_blocking)
//!  ├─ 4. Encode   JPEG, quality 90
//!  └─ 5. Publish  `{memoryId}/collage-{memoryId}-{millis}.jpg`, never overwritten
//! ```
//!
//! One image is returned as-is and zero images is a no-op. Callers that
//! cannot get a collage fall back to the first photo via
//! [`cover::resolve_cover_image`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use memory_collage::{CollageConfig, CollageRequest, Compositor, LocalStorage};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = Arc::new(LocalStorage::new("./media", "http://localhost:8080/media"));
//!     let compositor = Compositor::new(CollageConfig::default(), storage)?;
//!     let request = CollageRequest::new(
//!         vec![
//!             "https://example.com/a.jpg".into(),
//!             "https://example.com/b.jpg".into(),
//!         ],
//!         "m1",
//!         Some("Beach Day".into()),
//!     );
//!     if let Some(output) = compositor.create_collage(&request).await? {
//!         println!("{}", output.location);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `memory-collage` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod compose;
pub mod config;
pub mod cover;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use compose::Compositor;
pub use config::{parse_hex_color, CollageConfig, CollageConfigBuilder};
pub use cover::{resolve_cover_image, CollageClient, CoverImage, FALLBACK_WARNING};
pub use error::{ClientError, CodecError, CollageError, FetchError, StorageError, TileError};
pub use output::{CollageOutput, CollageRequest, CollageStats};
pub use pipeline::layout::{plan_layout, Rect, TileLayout};
pub use server::{create_router, media_route, AppState};
pub use storage::{LocalStorage, ObjectStorage, SupabaseStorage};
