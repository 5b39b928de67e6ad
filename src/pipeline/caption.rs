//! Caption overlay: a single centred line of text along the bottom band.
//!
//! Glyphs are rasterised with `rusttype` and alpha-blended onto the canvas.
//! DejaVu Sans Bold is compiled into the binary so captions render the same
//! on every host; `caption_font` replaces it, and a configured file that
//! fails to load stops composition from starting.

use crate::config::CollageConfig;
use crate::error::CollageError;
use image::{Rgba, RgbaImage};
use rusttype::{point, Font, Scale};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ELLIPSIS: &str = "…";

static EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");
const EMBEDDED_FONT_NAME: &str = "<embedded DejaVuSans-Bold.ttf>";

/// A parsed caption font.
pub struct CaptionFont {
    font: Font<'static>,
    source: PathBuf,
}

impl std::fmt::Debug for CaptionFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionFont")
            .field("source", &self.source)
            .finish()
    }
}

impl CaptionFont {
    /// Load a TrueType/OpenType font file.
    pub fn load(path: &Path) -> Result<Self, CollageError> {
        let bytes = std::fs::read(path).map_err(|e| CollageError::FontLoadFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let font = Font::try_from_vec(bytes).ok_or_else(|| CollageError::FontLoadFailed {
            path: path.to_path_buf(),
            detail: "not a TrueType/OpenType font".into(),
        })?;
        Ok(Self {
            font,
            source: path.to_path_buf(),
        })
    }

    /// The bundled DejaVu Sans Bold.
    pub fn embedded() -> Result<Self, CollageError> {
        let font = Font::try_from_bytes(EMBEDDED_FONT).ok_or_else(|| {
            CollageError::FontLoadFailed {
                path: PathBuf::from(EMBEDDED_FONT_NAME),
                detail: "embedded font is not a TrueType font".into(),
            }
        })?;
        Ok(Self {
            font,
            source: PathBuf::from(EMBEDDED_FONT_NAME),
        })
    }

    /// The font selected by `config`, falling back to the embedded one.
    pub fn resolve(config: &CollageConfig) -> Result<Self, CollageError> {
        match config.caption_font {
            Some(ref path) => {
                let font = Self::load(path)?;
                info!("Loaded caption font: {}", path.display());
                Ok(font)
            }
            None => {
                debug!("Using embedded caption font");
                Self::embedded()
            }
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Advance width of `text` at `px` pixels.
    pub fn text_width(&self, px: f32, text: &str) -> f32 {
        let scale = Scale::uniform(px);
        self.font
            .layout(text, scale, point(0.0, 0.0))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0)
    }

    /// `text`, shortened with an ellipsis until it fits in `max_width`.
    pub fn fit_text(&self, px: f32, text: &str, max_width: f32) -> String {
        if self.text_width(px, text) <= max_width {
            return text.to_string();
        }
        let mut chars: Vec<char> = text.chars().collect();
        while !chars.is_empty() {
            chars.pop();
            let candidate = format!("{}{}", chars.iter().collect::<String>().trim_end(), ELLIPSIS);
            if self.text_width(px, &candidate) <= max_width {
                return candidate;
            }
        }
        String::new()
    }
}

/// Draw `text` centred horizontally with its baseline at the caption baseline.
pub fn draw_caption(
    canvas: &mut RgbaImage,
    font: &CaptionFont,
    text: &str,
    config: &CollageConfig,
) {
    let px = config.caption_px;
    let max_width = config.canvas_width.saturating_sub(config.padding * 2) as f32;
    let line = font.fit_text(px, text, max_width);
    if line.is_empty() {
        return;
    }

    let width = font.text_width(px, &line);
    let origin_x = (config.canvas_width as f32 - width) / 2.0;
    let baseline = config.caption_baseline() as f32;
    let color = config.caption_color;
    let (canvas_w, canvas_h) = (canvas.width() as i32, canvas.height() as i32);

    for glyph in font
        .font
        .layout(&line, Scale::uniform(px), point(origin_x, baseline))
    {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let x = bb.min.x + gx as i32;
            let y = bb.min.y + gy as i32;
            if x < 0 || y < 0 || x >= canvas_w || y >= canvas_h {
                return;
            }
            let alpha = (coverage * color[3] as f32).round().clamp(0.0, 255.0) as u8;
            blend_pixel(
                canvas.get_pixel_mut(x as u32, y as u32),
                Rgba([color[0], color[1], color[2], alpha]),
            );
        });
    }
    debug!("Drew caption '{}' ({:.0}px wide)", line, width);
}

fn blend_pixel(base: &mut Rgba<u8>, over: Rgba<u8>) {
    let alpha = over[3] as f32 / 255.0;
    if alpha <= 0.0 {
        return;
    }
    for c in 0..3 {
        base[c] = (over[c] as f32 * alpha + base[c] as f32 * (1.0 - alpha))
            .round()
            .clamp(0.0, 255.0) as u8;
    }
    base[3] = 255;
}
