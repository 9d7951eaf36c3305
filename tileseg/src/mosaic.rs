//! Read-only label raster over the `FINAL` tiles.
//!
//! Nothing is merged: every read is dispatched to the tiles owning the requested
//! pixels, so a mosaic of any size costs one tile of memory per read.

use std::fmt;
use std::sync::Arc;

use common::Buffer2;

use crate::error::Error;
use crate::grid::{PixelRect, Tile, TileGrid};
use crate::raster::GeoInfo;
use crate::store::{Stage, TileKey, TileStore};

pub struct MosaicRaster {
    store: Arc<dyn TileStore>,
    grid: TileGrid,
    geo: GeoInfo,
    region_count: u32,
    /// Remove the `FINAL` artifacts (and a temp dir created for them) on drop.
    cleanup_on_drop: bool,
}

impl fmt::Debug for MosaicRaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MosaicRaster")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("tiles", &self.grid.tile_count())
            .field("region_count", &self.region_count)
            .finish()
    }
}

impl MosaicRaster {
    pub fn new(store: Arc<dyn TileStore>, grid: TileGrid, geo: GeoInfo, region_count: u32) -> Self {
        Self {
            store,
            grid,
            geo,
            region_count,
            cleanup_on_drop: false,
        }
    }

    pub fn with_cleanup_on_drop(mut self, cleanup: bool) -> Self {
        self.cleanup_on_drop = cleanup;
        self
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.grid.image_width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.grid.image_height()
    }

    pub fn geo_info(&self) -> &GeoInfo {
        &self.geo
    }

    /// Labels present in the mosaic are `1..=region_count`.
    pub fn region_count(&self) -> u32 {
        self.region_count
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Labels of `rect`, assembled from every tile it intersects.
    pub fn read_region(&self, rect: PixelRect) -> Result<Buffer2<u32>, Error> {
        let right = rect.x.checked_add(rect.width);
        let bottom = rect.y.checked_add(rect.height);
        let inside = matches!(
            (right, bottom),
            (Some(right), Some(bottom)) if right <= self.width() && bottom <= self.height()
        );
        if !inside {
            return Err(Error::ReadRegion {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                reason: format!(
                    "region exceeds mosaic bounds {}x{}",
                    self.width(),
                    self.height()
                ),
            });
        }

        let mut out = Buffer2::new_filled(rect.width, rect.height, 0u32);
        for tile in self.grid.tiles_intersecting(&rect) {
            let Some(part) = tile.core.intersect(&rect) else {
                continue;
            };
            let labels = self.read_final(&tile)?;
            let piece = labels.crop(
                part.x - tile.core.x,
                part.y - tile.core.y,
                part.width,
                part.height,
            );
            out.blit(&piece, part.x - rect.x, part.y - rect.y);
        }
        Ok(out)
    }

    /// The whole label raster. Materializes the full image.
    pub fn read_all(&self) -> Result<Buffer2<u32>, Error> {
        self.read_region(PixelRect::new(0, 0, self.width(), self.height()))
    }

    /// Label of one pixel.
    pub fn get(&self, x: usize, y: usize) -> Result<u32, Error> {
        let tile = self.tile_containing(x, y)?;
        let labels = self.read_final(&tile)?;
        Ok(*labels.get(x - tile.core.x, y - tile.core.y))
    }

    /// The `FINAL` tile owning pixel `(x, y)`.
    pub fn tile_at(&self, x: usize, y: usize) -> Result<Buffer2<u32>, Error> {
        let tile = self.tile_containing(x, y)?;
        self.read_final(&tile)
    }

    fn read_final(&self, tile: &Tile) -> Result<Buffer2<u32>, Error> {
        self.store.read_sized(
            TileKey::for_tile(tile.index, Stage::Final),
            tile.core.width,
            tile.core.height,
        )
    }

    /// Remove the `FINAL` artifacts and release the store.
    pub fn cleanup(mut self) -> Result<(), Error> {
        self.cleanup_on_drop = false;
        self.store.cleanup()
    }

    fn tile_containing(&self, x: usize, y: usize) -> Result<Tile, Error> {
        if x >= self.width() || y >= self.height() {
            return Err(Error::ReadRegion {
                x,
                y,
                width: 1,
                height: 1,
                reason: format!(
                    "pixel outside mosaic bounds {}x{}",
                    self.width(),
                    self.height()
                ),
            });
        }
        Ok(self.grid.tile(self.grid.tile_containing(x, y)))
    }
}

impl Drop for MosaicRaster {
    fn drop(&mut self) {
        if !self.cleanup_on_drop {
            return;
        }
        if let Err(err) = self.store.cleanup() {
            tracing::warn!(error = %err, "Failed to clean up mosaic tiles");
        }
    }
}
