//! Configuration types for collage composition.
//!
//! All compositor behaviour is controlled through [`CollageConfig`], built
//! via its [`CollageConfigBuilder`]. The defaults reproduce the cover
//! thumbnails the memory journal has always produced: an 800×600 white JPEG
//! with a dark bold caption along the bottom edge.

use crate::error::CollageError;
use image::Rgba;
use std::path::PathBuf;

/// Configuration for collage composition.
///
/// Built via [`CollageConfig::builder()`] or using
/// [`CollageConfig::default()`].
///
/// # Example
/// ```rust
/// use memory_collage::CollageConfig;
///
/// let config = CollageConfig::builder()
///     .jpeg_quality(85)
///     .fetch_timeout_secs(10)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct CollageConfig {
    /// Output canvas width in pixels. Default: 800.
    pub canvas_width: u32,

    /// Output canvas height in pixels. Default: 600.
    pub canvas_height: u32,

    /// Margin around and between tiles in pixels. Default: 10.
    pub padding: u32,

    /// Height of the band reserved below the grid for the caption. Default: 40.
    ///
    /// The band is reserved whether or not a caption is supplied so that
    /// collages of the same memory keep the same geometry across edits.
    pub caption_band: u32,

    /// Maximum number of tiles drawn. Default: 9 (a 3×3 grid).
    ///
    /// Images beyond this count are dropped from the composite only; they
    /// remain valid sources for the caller.
    pub max_tiles: usize,

    /// Canvas background, also the colour of blank tiles. Default: `#ffffff`.
    pub background: Rgba<u8>,

    /// Caption text colour. Default: `#333333`.
    pub caption_color: Rgba<u8>,

    /// Caption glyph height in pixels. Default: 24.
    pub caption_px: f32,

    /// TrueType font file replacing the embedded DejaVu Sans Bold.
    /// Default: None.
    pub caption_font: Option<PathBuf>,

    /// JPEG quality, 1–100. Default: 90.
    pub jpeg_quality: u8,

    /// Per-image download timeout in seconds. Default: 30.
    pub fetch_timeout_secs: u64,

    /// Number of source images downloaded at once. Default: 9.
    pub fetch_concurrency: usize,

    /// Largest accepted source image body in bytes. Default: 25 MiB.
    pub max_image_bytes: usize,

    /// Return a signed URL with this lifetime instead of the public URL.
    /// Default: None (public URL).
    pub signed_url_ttl_secs: Option<u64>,

    /// Deadline for one whole collage operation at the HTTP boundary. Default: 60.
    pub operation_timeout_secs: u64,
}

impl Default for CollageConfig {
    fn default() -> Self {
        Self {
            canvas_width: 800,
            canvas_height: 600,
            padding: 10,
            caption_band: 40,
            max_tiles: 9,
            background: Rgba([0xff, 0xff, 0xff, 0xff]),
            caption_color: Rgba([0x33, 0x33, 0x33, 0xff]),
            caption_px: 24.0,
            caption_font: None,
            jpeg_quality: 90,
            fetch_timeout_secs: 30,
            fetch_concurrency: 9,
            max_image_bytes: 25 * 1024 * 1024,
            signed_url_ttl_secs: None,
            operation_timeout_secs: 60,
        }
    }
}

impl CollageConfig {
    /// Create a new builder for `CollageConfig`.
    pub fn builder() -> CollageConfigBuilder {
        CollageConfigBuilder {
            config: Self::default(),
        }
    }

    /// Vertical position of the caption baseline: the middle of the caption band.
    pub fn caption_baseline(&self) -> u32 {
        self.canvas_height.saturating_sub(self.caption_band / 2)
    }
}

/// Builder for [`CollageConfig`].
#[derive(Debug)]
pub struct CollageConfigBuilder {
    config: CollageConfig,
}

impl CollageConfigBuilder {
    pub fn canvas_size(mut self, width: u32, height: u32) -> Self {
        self.config.canvas_width = width;
        self.config.canvas_height = height;
        self
    }

    pub fn padding(mut self, px: u32) -> Self {
        self.config.padding = px;
        self
    }

    pub fn caption_band(mut self, px: u32) -> Self {
        self.config.caption_band = px;
        self
    }

    pub fn max_tiles(mut self, n: usize) -> Self {
        self.config.max_tiles = n.clamp(1, 9);
        self
    }

    pub fn background(mut self, color: Rgba<u8>) -> Self {
        self.config.background = color;
        self
    }

    pub fn caption_color(mut self, color: Rgba<u8>) -> Self {
        self.config.caption_color = color;
        self
    }

    pub fn caption_px(mut self, px: f32) -> Self {
        self.config.caption_px = px.max(1.0);
        self
    }

    pub fn caption_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.caption_font = Some(path.into());
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn fetch_concurrency(mut self, n: usize) -> Self {
        self.config.fetch_concurrency = n.max(1);
        self
    }

    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.config.max_image_bytes = bytes;
        self
    }

    pub fn signed_url_ttl_secs(mut self, secs: u64) -> Self {
        self.config.signed_url_ttl_secs = Some(secs);
        self
    }

    pub fn operation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.operation_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CollageConfig, CollageError> {
        let c = &self.config;
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(CollageError::InvalidConfig(format!(
                "JPEG quality must be 1-100, got {}",
                c.jpeg_quality
            )));
        }
        // The densest grid is 3×3; every tile of it must have a positive size.
        let usable_w = c.canvas_width.saturating_sub(c.padding * 4);
        let usable_h = c
            .canvas_height
            .saturating_sub(c.caption_band)
            .saturating_sub(c.padding * 4);
        if usable_w < 3 || usable_h < 3 {
            return Err(CollageError::InvalidConfig(format!(
                "Canvas {}x{} is too small for padding {} and caption band {}",
                c.canvas_width, c.canvas_height, c.padding, c.caption_band
            )));
        }
        if c.fetch_timeout_secs == 0 {
            return Err(CollageError::InvalidConfig(
                "Fetch timeout must be at least 1s".into(),
            ));
        }
        if c.operation_timeout_secs == 0 {
            return Err(CollageError::InvalidConfig(
                "Operation timeout must be at least 1s".into(),
            ));
        }
        if c.signed_url_ttl_secs == Some(0) {
            return Err(CollageError::InvalidConfig(
                "Signed URL lifetime must be at least 1s".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Parse a `#rrggbb` or `#rrggbbaa` colour.
pub fn parse_hex_color(s: &str) -> Result<Rgba<u8>, CollageError> {
    let hex = s.trim().trim_start_matches('#');
    let invalid = || CollageError::InvalidConfig(format!("Invalid colour '{s}'"));
    if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    let alpha = if hex.len() == 8 { channel(6)? } else { 0xff };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}
