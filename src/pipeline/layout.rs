//! Grid planning: image count → columns × rows → tile rectangles.
//!
//! The grid is a pure function of the number of images that will be drawn:
//!
//! | images | columns | rows |
//! |--------|---------|------|
//! | 1–2    | count   | 1    |
//! | 3–4    | 2       | 2    |
//! | 5–6    | 3       | 2    |
//! | ≥ 7    | 3       | 3    |
//!
//! Every tile of a grid has the same size; a partially filled last row keeps
//! the same tile width as the full rows above it.

use crate::config::CollageConfig;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle on the canvas, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn max_x(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn max_y(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }
}

/// Grid shape for one collage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileLayout {
    pub columns: u32,
    pub rows: u32,
}

impl TileLayout {
    /// Number of tiles in the grid.
    pub fn capacity(&self) -> usize {
        (self.columns * self.rows) as usize
    }

    /// Tile rectangles in reading order (left-to-right, top-to-bottom).
    ///
    /// `tile_w = (canvas_w − padding·(cols+1)) / cols` and
    /// `tile_h = (canvas_h − caption_band − padding·(rows+1)) / rows`,
    /// with `padding` between neighbouring tiles and around the grid.
    pub fn tile_rects(&self, config: &CollageConfig) -> Vec<Rect> {
        let pad = config.padding;
        let tile_w = config
            .canvas_width
            .saturating_sub(pad * (self.columns + 1))
            / self.columns;
        let tile_h = config
            .canvas_height
            .saturating_sub(config.caption_band)
            .saturating_sub(pad * (self.rows + 1))
            / self.rows;

        (0..self.rows)
            .flat_map(|row| (0..self.columns).map(move |col| (col, row)))
            .map(|(col, row)| {
                Rect::new(
                    pad + col * (tile_w + pad),
                    pad + row * (tile_h + pad),
                    tile_w,
                    tile_h,
                )
            })
            .collect()
    }
}

/// Choose the grid for `image_count` images.
///
/// A count of 0 is treated as 1; counts above 9 use the 3×3 grid and the
/// surplus images are not placed.
pub fn plan_layout(image_count: usize) -> TileLayout {
    match image_count {
        0..=2 => TileLayout {
            columns: image_count.max(1) as u32,
            rows: 1,
        },
        3..=4 => TileLayout {
            columns: 2,
            rows: 2,
        },
        5..=6 => TileLayout {
            columns: 3,
            rows: 2,
        },
        _ => TileLayout {
            columns: 3,
            rows: 3,
        },
    }
}
