//! Request and result types for collage composition.

use crate::error::TileError;
use serde::{Deserialize, Serialize};

/// One collage request: the memory's images in display order, the memory
/// identifier used to namespace the stored object, and an optional caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollageRequest {
    /// Image URLs in the order they should appear (left-to-right, top-to-bottom).
    pub source_images: Vec<String>,
    /// Owning memory identifier; becomes the storage path prefix.
    pub owner_id: String,
    /// Caption rendered along the bottom edge; empty strings are ignored.
    pub caption: Option<String>,
}

impl CollageRequest {
    pub fn new(
        source_images: Vec<String>,
        owner_id: impl Into<String>,
        caption: Option<String>,
    ) -> Self {
        Self {
            source_images,
            owner_id: owner_id.into(),
            caption,
        }
    }

    /// The caption to draw, if any non-blank caption was supplied.
    pub fn caption_text(&self) -> Option<&str> {
        self.caption
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// Result of a successful [`crate::compose::Compositor::create_collage`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollageOutput {
    /// Retrievable location of the cover image.
    pub location: String,
    /// Storage path of the published collage; `None` when the single source
    /// image was passed through unchanged.
    pub object_path: Option<String>,
    /// Per-image failures absorbed while composing.
    pub tile_errors: Vec<TileError>,
    /// Counters and timings.
    pub stats: CollageStats,
}

impl CollageOutput {
    /// Whether a new image was rendered and published.
    pub fn is_composite(&self) -> bool {
        self.object_path.is_some()
    }
}

/// Counters and timings for one collage operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollageStats {
    /// Number of source images in the request.
    pub requested: usize,
    /// Source images downloaded successfully.
    pub fetched: usize,
    /// Source images that failed to download.
    pub fetch_failures: usize,
    /// Downloaded images that failed to decode (left as blank tiles).
    pub decode_failures: usize,
    /// Tiles with an image drawn into them.
    pub tiles_drawn: usize,
    /// Fetched images beyond the grid capacity, not drawn.
    pub dropped: usize,
    /// Size of the encoded collage.
    pub encoded_bytes: usize,
    pub fetch_duration_ms: u64,
    pub render_duration_ms: u64,
    pub publish_duration_ms: u64,
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_captions_are_ignored() {
        let req = CollageRequest::new(vec![], "m1", Some("   ".into()));
        assert_eq!(req.caption_text(), None);
        let req = CollageRequest::new(vec![], "m1", Some(" Beach Day ".into()));
        assert_eq!(req.caption_text(), Some("Beach Day"));
        let req = CollageRequest::new(vec![], "m1", None);
        assert_eq!(req.caption_text(), None);
    }
}
