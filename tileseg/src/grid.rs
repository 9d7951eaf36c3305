//! Tile grid: how the image is cut into tiles with a trailing overlap margin.
//!
//! Tile `(row, col)` owns the core region starting at `(col * tile_width, row * tile_height)`.
//! When a neighbor exists to the right (below), the tile is read one pixel wider (taller):
//! that extra column (row) is the first column (row) of the neighbor and is only used to
//! detect cross-tile adjacency. It is stripped before any final output.

use serde::{Deserialize, Serialize};

use crate::config::ScanOrder;

/// Position of a tile in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileIndex {
    pub row: usize,
    pub col: usize,
}

impl TileIndex {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Axis-aligned pixel rectangle in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn right(&self) -> usize {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Overlapping part of two rectangles, if any.
    pub fn intersect(&self, other: &PixelRect) -> Option<PixelRect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (x < right && y < bottom).then(|| PixelRect::new(x, y, right - x, bottom - y))
    }
}

/// One grid cell with its overlap margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub index: TileIndex,
    /// Region owned by this tile in the final output.
    pub core: PixelRect,
    /// A neighbor exists to the right, so one extra column is read.
    pub margin_right: bool,
    /// A neighbor exists below, so one extra row is read.
    pub margin_bottom: bool,
}

impl Tile {
    /// Region read for segmentation: the core plus the trailing margin.
    pub fn extended(&self) -> PixelRect {
        PixelRect::new(
            self.core.x,
            self.core.y,
            self.core.width + usize::from(self.margin_right),
            self.core.height + usize::from(self.margin_bottom),
        )
    }
}

/// Fixed grid of tiles over an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    image_width: usize,
    image_height: usize,
    tile_width: usize,
    tile_height: usize,
    tiles_x: usize,
    tiles_y: usize,
}

impl TileGrid {
    pub fn new(image_width: usize, image_height: usize, tile_width: usize, tile_height: usize) -> Self {
        assert!(
            tile_width > 0 && tile_height > 0,
            "tile size must be positive, got {}x{}",
            tile_width,
            tile_height
        );
        Self {
            image_width,
            image_height,
            tile_width,
            tile_height,
            tiles_x: image_width.div_ceil(tile_width),
            tiles_y: image_height.div_ceil(tile_height),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    #[inline]
    pub fn image_width(&self) -> usize {
        self.image_width
    }

    #[inline]
    pub fn image_height(&self) -> usize {
        self.image_height
    }

    #[inline]
    pub fn tile_width(&self) -> usize {
        self.tile_width
    }

    #[inline]
    pub fn tile_height(&self) -> usize {
        self.tile_height
    }

    #[inline]
    pub fn tiles_x(&self) -> usize {
        self.tiles_x
    }

    #[inline]
    pub fn tiles_y(&self) -> usize {
        self.tiles_y
    }

    #[inline]
    pub fn tile_count(&self) -> usize {
        self.tiles_x * self.tiles_y
    }

    /// A grid with a single tile has no seams to reconcile.
    #[inline]
    pub fn is_single_tile(&self) -> bool {
        self.tile_count() == 1
    }

    // ------------------------------------------------------------------------
    // Tiles
    // ------------------------------------------------------------------------

    pub fn tile(&self, index: TileIndex) -> Tile {
        debug_assert!(index.row < self.tiles_y && index.col < self.tiles_x);
        let x = index.col * self.tile_width;
        let y = index.row * self.tile_height;
        Tile {
            index,
            core: PixelRect::new(
                x,
                y,
                self.tile_width.min(self.image_width - x),
                self.tile_height.min(self.image_height - y),
            ),
            margin_right: index.col + 1 < self.tiles_x,
            margin_bottom: index.row + 1 < self.tiles_y,
        }
    }

    /// All tiles in row-major order.
    pub fn tiles(&self) -> Vec<Tile> {
        self.scan(ScanOrder::RowMajor)
            .into_iter()
            .map(|index| self.tile(index))
            .collect()
    }

    /// Tile indices in the requested traversal order.
    pub fn scan(&self, order: ScanOrder) -> Vec<TileIndex> {
        let mut indices = Vec::with_capacity(self.tile_count());
        match order {
            ScanOrder::RowMajor => {
                for row in 0..self.tiles_y {
                    for col in 0..self.tiles_x {
                        indices.push(TileIndex::new(row, col));
                    }
                }
            }
            ScanOrder::ColumnMajor => {
                for col in 0..self.tiles_x {
                    for row in 0..self.tiles_y {
                        indices.push(TileIndex::new(row, col));
                    }
                }
            }
        }
        indices
    }

    /// Tile owning image pixel `(x, y)`.
    #[inline]
    pub fn tile_containing(&self, x: usize, y: usize) -> TileIndex {
        debug_assert!(x < self.image_width && y < self.image_height);
        TileIndex::new(y / self.tile_height, x / self.tile_width)
    }

    /// Tiles whose core intersects `rect`, row-major.
    pub fn tiles_intersecting(&self, rect: &PixelRect) -> Vec<Tile> {
        if rect.width == 0 || rect.height == 0 {
            return Vec::new();
        }
        let first_col = rect.x / self.tile_width;
        let last_col = ((rect.right() - 1) / self.tile_width).min(self.tiles_x.saturating_sub(1));
        let first_row = rect.y / self.tile_height;
        let last_row = ((rect.bottom() - 1) / self.tile_height).min(self.tiles_y.saturating_sub(1));

        let mut tiles = Vec::new();
        for row in first_row..=last_row {
            for col in first_col..=last_col {
                tiles.push(self.tile(TileIndex::new(row, col)));
            }
        }
        tiles
    }
}
