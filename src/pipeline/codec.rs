//! Bitmap capability: decode source bytes, draw a scaled bitmap, encode the canvas.
//!
//! The renderer only talks to the [`ImageCodec`] trait, so tests can drive
//! it with synthetic bitmaps and record where tiles were drawn. The
//! production implementation is [`RasterCodec`], built on the `image` crate.

use crate::error::CodecError;
use crate::pipeline::layout::Rect;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use tracing::debug;

/// An encoded image ready to be written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl EncodedImage {
    /// File extension matching `mime_type`.
    pub fn extension(&self) -> &'static str {
        match self.mime_type {
            "image/png" => "png",
            "image/webp" => "webp",
            _ => "jpg",
        }
    }
}

/// Decode → draw → encode operations used by the tile renderer.
pub trait ImageCodec: Send + Sync {
    /// Decode raw source bytes into a bitmap.
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, CodecError>;

    /// Scale `bitmap` to exactly `dest`'s size and draw it at `dest` on `canvas`.
    fn draw(&self, canvas: &mut RgbaImage, bitmap: &RgbaImage, dest: Rect) {
        let scaled = if bitmap.dimensions() == (dest.width, dest.height) {
            bitmap.clone()
        } else {
            imageops::resize(bitmap, dest.width, dest.height, FilterType::Triangle)
        };
        imageops::overlay(canvas, &scaled, i64::from(dest.x), i64::from(dest.y));
    }

    /// Encode the finished canvas.
    fn encode(&self, canvas: &RgbaImage) -> Result<EncodedImage, CodecError>;
}

/// [`ImageCodec`] producing JPEG output via the `image` crate.
///
/// Decodes any format the crate was built with (JPEG, PNG, WebP, GIF).
#[derive(Debug, Clone, Copy)]
pub struct RasterCodec {
    quality: u8,
}

impl RasterCodec {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl ImageCodec for RasterCodec {
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, CodecError> {
        let img = image::load_from_memory(bytes)?;
        debug!("Decoded source image {}x{}", img.width(), img.height());
        Ok(img.to_rgba8())
    }

    fn encode(&self, canvas: &RgbaImage) -> Result<EncodedImage, CodecError> {
        // JPEG has no alpha channel.
        let rgb = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.quality).encode_image(&rgb)?;
        debug!(
            "Encoded {}x{} canvas → {} bytes JPEG (q={})",
            canvas.width(),
            canvas.height(),
            buf.len(),
            self.quality
        );
        Ok(EncodedImage {
            bytes: buf,
            mime_type: "image/jpeg",
        })
    }
}
