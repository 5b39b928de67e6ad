//! Tile rendering: place each fetched image into its grid tile, overlay the
//! caption and encode the canvas.
//!
//! Decoding, scaling and JPEG encoding are CPU-bound, so
//! [`render_collage_blocking`] runs the whole stage on the blocking thread
//! pool via `tokio::task::spawn_blocking`.
//!
//! Each image is scaled by `min(tile_w / w, tile_h / h)` so it fits its tile
//! without cropping, then centred inside the tile. A bitmap that fails to
//! decode leaves its tile showing the background colour.

use crate::config::CollageConfig;
use crate::error::{CollageError, TileError};
use crate::pipeline::caption::{draw_caption, CaptionFont};
use crate::pipeline::codec::{EncodedImage, ImageCodec};
use crate::pipeline::layout::{plan_layout, Rect, TileLayout};
use image::RgbaImage;
use std::sync::Arc;
use tracing::{debug, warn};

/// A fetched source image: its index in the request and its raw bytes.
pub type SourceImage = (usize, Vec<u8>);

/// Output of the render stage.
#[derive(Debug)]
pub struct RenderedCollage {
    pub image: EncodedImage,
    pub layout: TileLayout,
    /// Tiles with an image drawn into them.
    pub tiles_drawn: usize,
    /// Images beyond the grid capacity that were not placed.
    pub dropped: usize,
    /// Decode failures, one per blank tile.
    pub tile_errors: Vec<TileError>,
}

/// Scale a `width`×`height` bitmap to fit inside `tile`, preserving its
/// aspect ratio, and centre it.
///
/// Returns `None` for zero-sized bitmaps. The result is never smaller than
/// 1×1 and never extends past `tile`.
pub fn fit_within(width: u32, height: u32, tile: Rect) -> Option<Rect> {
    if width == 0 || height == 0 || tile.width == 0 || tile.height == 0 {
        return None;
    }
    let scale = f64::min(
        tile.width as f64 / width as f64,
        tile.height as f64 / height as f64,
    );
    let scaled_w = ((width as f64 * scale).round() as u32).clamp(1, tile.width);
    let scaled_h = ((height as f64 * scale).round() as u32).clamp(1, tile.height);
    Some(Rect::new(
        tile.x + (tile.width - scaled_w) / 2,
        tile.y + (tile.height - scaled_h) / 2,
        scaled_w,
        scaled_h,
    ))
}

/// Render the collage for `images` (in request order) and encode it.
///
/// The grid is planned from `images.len()`; only the first
/// `min(capacity, max_tiles)` images are placed.
pub fn render_collage(
    codec: &dyn ImageCodec,
    images: &[SourceImage],
    caption: Option<(&CaptionFont, &str)>,
    config: &CollageConfig,
) -> Result<RenderedCollage, CollageError> {
    let layout = plan_layout(images.len().min(config.max_tiles));
    let tiles = layout.tile_rects(config);
    let placed = images.len().min(tiles.len()).min(config.max_tiles);
    let dropped = images.len() - placed;
    if dropped > 0 {
        warn!(
            "{} images exceed the {}-tile grid and are left out of the collage",
            dropped,
            tiles.len()
        );
    }

    let mut canvas =
        RgbaImage::from_pixel(config.canvas_width, config.canvas_height, config.background);
    let mut tile_errors = Vec::new();
    let mut tiles_drawn = 0;

    for ((index, bytes), tile) in images.iter().take(placed).zip(&tiles) {
        let bitmap = match codec.decode(bytes) {
            Ok(b) => b,
            Err(e) => {
                warn!("Image {}: decode failed, leaving tile blank: {}", index, e);
                tile_errors.push(TileError::DecodeFailed {
                    index: *index,
                    detail: e.to_string(),
                });
                continue;
            }
        };
        let Some(dest) = fit_within(bitmap.width(), bitmap.height(), *tile) else {
            warn!("Image {}: empty bitmap, leaving tile blank", index);
            tile_errors.push(TileError::DecodeFailed {
                index: *index,
                detail: "image has zero width or height".into(),
            });
            continue;
        };
        debug!(
            "Image {}: {}x{} → {}x{} at ({}, {})",
            index,
            bitmap.width(),
            bitmap.height(),
            dest.width,
            dest.height,
            dest.x,
            dest.y
        );
        codec.draw(&mut canvas, &bitmap, dest);
        tiles_drawn += 1;
    }

    if let Some((font, text)) = caption {
        draw_caption(&mut canvas, font, text, config);
    }

    let image = codec
        .encode(&canvas)
        .map_err(|e| CollageError::EncodeFailed(e.to_string()))?;

    Ok(RenderedCollage {
        image,
        layout,
        tiles_drawn,
        dropped,
        tile_errors,
    })
}

/// [`render_collage`] on the blocking thread pool.
pub async fn render_collage_blocking(
    codec: Arc<dyn ImageCodec>,
    images: Vec<SourceImage>,
    caption: Option<(Arc<CaptionFont>, String)>,
    config: CollageConfig,
) -> Result<RenderedCollage, CollageError> {
    tokio::task::spawn_blocking(move || {
        let caption = caption.as_ref().map(|(font, text)| (&**font, text.as_str()));
        render_collage(codec.as_ref(), &images, caption, &config)
    })
    .await
    .map_err(|e| CollageError::Internal(format!("Render task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use image::Rgba;
    use std::sync::Mutex;

    /// Synthetic codec: byte 0 = width, byte 1 = height, byte 2 = grey level.
    /// An empty buffer fails to decode. Records every draw.
    #[derive(Default)]
    struct SyntheticCodec {
        draws: Mutex<Vec<Rect>>,
    }

    impl ImageCodec for SyntheticCodec {
        fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, CodecError> {
            match bytes {
                [w, h, g, ..] => Ok(RgbaImage::from_pixel(
                    *w as u32,
                    *h as u32,
                    Rgba([*g, *g, *g, 255]),
                )),
                _ => Err(CodecError("truncated".into())),
            }
        }

        fn draw(&self, canvas: &mut RgbaImage, _bitmap: &RgbaImage, dest: Rect) {
            self.draws.lock().unwrap().push(dest);
            for y in dest.y..dest.max_y() {
                for x in dest.x..dest.max_x() {
                    canvas.put_pixel(x, y, Rgba([0, 0, 0, 255]));
                }
            }
        }

        fn encode(&self, canvas: &RgbaImage) -> Result<EncodedImage, CodecError> {
            Ok(EncodedImage {
                bytes: canvas.as_raw().clone(),
                mime_type: "image/x-raw",
            })
        }
    }

    fn decode_canvas(out: &EncodedImage, config: &CollageConfig) -> RgbaImage {
        RgbaImage::from_raw(config.canvas_width, config.canvas_height, out.bytes.clone())
            .expect("raw canvas")
    }

    #[test]
    fn fit_preserves_aspect_ratio() {
        let tile = Rect::new(10, 10, 385, 265);
        let cases = [
            (1, 1),
            (4000, 3000),
            (3000, 4000),
            (1920, 1080),
            (10_000, 1),
            (1, 10_000),
            (385, 265),
            (2, 3),
        ];
        for (w, h) in cases {
            let fit = fit_within(w, h, tile).expect("non-degenerate");
            assert!(tile.contains(&fit), "{w}x{h} → {fit:?} escapes {tile:?}");
            let scale = f64::min(385.0 / w as f64, 265.0 / h as f64);
            // Each side is the exact scaled length, within rounding (and the 1px floor).
            assert!((fit.width as f64 - (w as f64 * scale).max(1.0)).abs() <= 1.0);
            assert!((fit.height as f64 - (h as f64 * scale).max(1.0)).abs() <= 1.0);
            // One side always touches the tile edges.
            assert!(fit.width == tile.width || fit.height == tile.height);
        }
    }

    #[test]
    fn fit_centres_in_tile() {
        let tile = Rect::new(0, 0, 200, 100);
        // square image in a wide tile: 100x100 centred horizontally
        assert_eq!(fit_within(50, 50, tile), Some(Rect::new(50, 0, 100, 100)));
        // wide image in a wide tile: full width, centred vertically
        assert_eq!(fit_within(400, 100, tile), Some(Rect::new(0, 25, 200, 50)));
    }

    #[test]
    fn fit_rejects_degenerate_sizes() {
        let tile = Rect::new(0, 0, 100, 100);
        assert_eq!(fit_within(0, 10, tile), None);
        assert_eq!(fit_within(10, 0, tile), None);
        assert_eq!(fit_within(10, 10, Rect::new(0, 0, 0, 10)), None);
    }

    #[test]
    fn tiles_follow_input_order() {
        let codec = SyntheticCodec::default();
        let config = CollageConfig::default();
        let images: Vec<SourceImage> = (0..3).map(|i| (i, vec![40, 40, 128])).collect();

        let out = render_collage(&codec, &images, None, &config).expect("render");

        assert_eq!(out.layout, TileLayout { columns: 2, rows: 2 });
        assert_eq!(out.tiles_drawn, 3);
        let draws = codec.draws.lock().unwrap().clone();
        let tiles = out.layout.tile_rects(&config);
        for (draw, tile) in draws.iter().zip(&tiles) {
            assert!(tile.contains(draw));
        }
    }

    #[test]
    fn corrupt_image_leaves_blank_tile() {
        let codec = SyntheticCodec::default();
        let config = CollageConfig::default();
        let images: Vec<SourceImage> = vec![
            (0, vec![10, 10, 0]),
            (1, vec![]),
            (2, vec![10, 10, 0]),
            (3, vec![10, 10, 0]),
        ];

        let out = render_collage(&codec, &images, None, &config).expect("render");

        assert_eq!(out.tiles_drawn, 3);
        assert_eq!(
            out.tile_errors,
            vec![TileError::DecodeFailed {
                index: 1,
                detail: "truncated".into()
            }]
        );
        let canvas = decode_canvas(&out.image, &config);
        let tiles = out.layout.tile_rects(&config);
        let centre = |r: &Rect| canvas.get_pixel(r.x + r.width / 2, r.y + r.height / 2);
        assert_eq!(centre(&tiles[0]), &Rgba([0, 0, 0, 255]));
        assert_eq!(centre(&tiles[1]), &config.background);
        assert_eq!(centre(&tiles[2]), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn images_beyond_nine_are_dropped() {
        let codec = SyntheticCodec::default();
        let config = CollageConfig::default();
        let images: Vec<SourceImage> = (0..12).map(|i| (i, vec![5, 5, 0])).collect();

        let out = render_collage(&codec, &images, None, &config).expect("render");

        assert_eq!(out.layout, TileLayout { columns: 3, rows: 3 });
        assert_eq!(out.tiles_drawn, 9);
        assert_eq!(out.dropped, 3);
    }

    #[test]
    fn max_tiles_limits_the_grid() {
        let codec = SyntheticCodec::default();
        let config = CollageConfig::builder().max_tiles(4).build().unwrap();
        let images: Vec<SourceImage> = (0..7).map(|i| (i, vec![5, 5, 0])).collect();

        let out = render_collage(&codec, &images, None, &config).expect("render");

        assert_eq!(out.layout, TileLayout { columns: 2, rows: 2 });
        assert_eq!(out.tiles_drawn, 4);
        assert_eq!(out.dropped, 3);
    }

    #[test]
    fn background_fills_untouched_canvas() {
        let codec = SyntheticCodec::default();
        let config = CollageConfig::default();
        let out = render_collage(&codec, &[(0, vec![])], None, &config).expect("render");
        let canvas = decode_canvas(&out.image, &config);
        assert!(canvas.pixels().all(|p| *p == config.background));
    }

    #[tokio::test]
    async fn blocking_wrapper_renders_real_jpeg() {
        use crate::pipeline::codec::RasterCodec;
        use image::{DynamicImage, ImageFormat};
        use std::io::Cursor;

        let mut png = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(30, 20, Rgba([200, 10, 10, 255])))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let config = CollageConfig::default();

        let out = render_collage_blocking(
            Arc::new(RasterCodec::new(config.jpeg_quality)),
            vec![(0, png.clone()), (1, png)],
            None,
            config,
        )
        .await
        .expect("render");

        assert_eq!(out.image.mime_type, "image/jpeg");
        assert_eq!(out.layout, TileLayout { columns: 2, rows: 1 });
        let decoded = image::load_from_memory(&out.image.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (800, 600));
    }
}
