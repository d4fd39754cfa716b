use serde::{Deserialize, Serialize};

use crate::core::math::ceil_div;

/// Dimensions of one resolution tier, as supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSpec {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Fallback-only levels are rendered when nothing better is loaded but
    /// are never selected as the preferred level.
    #[serde(default)]
    pub fallback_only: bool,
}

impl LevelSpec {
    pub fn flat(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Self {
        Self {
            width,
            height,
            tile_width,
            tile_height,
            fallback_only: false,
        }
    }

    /// A cube level: every face is `size` pixels square, split into square tiles.
    pub fn cube(size: u32, tile_size: u32) -> Self {
        Self::flat(size, size, tile_size, tile_size)
    }

    /// An equirectangular level is a single tile of `width` by `width / 2` pixels.
    pub fn equirect(width: u32) -> Self {
        let height = width / 2;
        Self::flat(width, height, width, height)
    }

    pub fn fallback_only(mut self) -> Self {
        self.fallback_only = true;
        self
    }
}

/// One resolution tier of a geometry, indexed from coarsest (0) to finest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    index: usize,
    spec: LevelSpec,
}

impl Level {
    pub(crate) fn new(index: usize, spec: LevelSpec) -> Self {
        Self { index, spec }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.spec.width
    }

    pub fn height(&self) -> u32 {
        self.spec.height
    }

    pub fn tile_width(&self) -> u32 {
        self.spec.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.spec.tile_height
    }

    pub fn fallback_only(&self) -> bool {
        self.spec.fallback_only
    }

    pub fn num_horizontal_tiles(&self) -> u32 {
        ceil_div(self.spec.width as u64, self.spec.tile_width as u64) as u32
    }

    pub fn num_vertical_tiles(&self) -> u32 {
        ceil_div(self.spec.height as u64, self.spec.tile_height as u64) as u32
    }

    /// Width of the tile in column `x`; the last column keeps the remainder.
    pub fn tile_width_at(&self, x: u32) -> u32 {
        edge_size(self.spec.width, self.spec.tile_width, x)
    }

    /// Height of the tile in row `y`; the last row keeps the remainder.
    pub fn tile_height_at(&self, y: u32) -> u32 {
        edge_size(self.spec.height, self.spec.tile_height, y)
    }
}

fn edge_size(level_size: u32, tile_size: u32, index: u32) -> u32 {
    let count = ceil_div(level_size as u64, tile_size as u64) as u32;
    if index + 1 == count {
        let remainder = level_size % tile_size;
        if remainder != 0 {
            return remainder;
        }
    }
    tile_size
}

/// Grid index along one axis of the tile containing tile `index` of a finer level.
pub(crate) fn parent_index(
    index: u32,
    (size, tile_size): (u32, u32),
    (parent_size, parent_tile_size): (u32, u32),
) -> u32 {
    let numerator = index as u64 * tile_size as u64 * parent_size as u64;
    let denominator = size as u64 * parent_tile_size as u64;
    (numerator / denominator) as u32
}

/// Range of grid indices along one axis whose parent is tile `index`.
pub(crate) fn child_range(
    index: u32,
    (size, tile_size): (u32, u32),
    (child_size, child_tile_size): (u32, u32),
) -> std::ops::Range<u32> {
    let scale = child_size as u64 * tile_size as u64;
    let denominator = size as u64 * child_tile_size as u64;
    let count = ceil_div(child_size as u64, child_tile_size as u64);
    let start = ceil_div(index as u64 * scale, denominator).min(count);
    let end = ceil_div((index as u64 + 1) * scale, denominator).min(count);
    start as u32..end as u32
}
