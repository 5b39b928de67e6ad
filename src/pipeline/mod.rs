//! Pipeline stages for collage composition.
//!
//! Each submodule implements exactly one step, so the grid maths, the
//! downloads and the raster work can each be tested on their own.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ layout ──▶ render (codec + caption) ──▶ storage
//! (HTTP)    (grid)     (spawn_blocking)             (publish)
//! ```
//!
//! 1. [`fetch`]: download every source URL concurrently; failures are
//!    recorded per image and never abort the batch
//! 2. [`layout`]: choose the column/row grid for the fetched count and
//!    compute the tile rectangles
//! 3. [`render`]: decode, scale-to-fit and draw each image into its tile
//! 4. [`caption`]: overlay the memory title along the bottom band
//! 5. [`codec`]: decode/draw/encode capability behind a trait

pub mod caption;
pub mod codec;
pub mod fetch;
pub mod layout;
pub mod render;
