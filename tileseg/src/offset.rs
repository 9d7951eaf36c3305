//! Per-tile segmentation with globally unique labels.
//!
//! Tiles are segmented independently, then every nonzero label of tile `i` is shifted
//! by the running sum of the maximum labels of all tiles before it in row-major order.
//! After this pass no two tiles share a label, and the final running sum sizes every
//! label-indexed table of the later passes.

use common::parallel::try_par_for_each_chunk;
use common::Buffer2;

use crate::error::Error;
use crate::grid::{Tile, TileGrid, TileIndex};
use crate::progress::{report_progress, PassStage, ProgressCallback};
use crate::raster::RasterSource;
use crate::segmenter::TileSegmenter;
use crate::store::{Stage, TileKey, TileStore};

/// Inclusive range of global labels assigned to one tile.
///
/// Empty (`last < first`) for a tile without foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelRange {
    pub first: u32,
    pub last: u32,
}

impl LabelRange {
    #[inline]
    pub fn contains(&self, label: u32) -> bool {
        self.first <= label && label <= self.last
    }

    #[inline]
    pub fn len(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.last - self.first + 1
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }
}

/// Result of the offset pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLabels {
    /// Total number of labels handed out; labels live in `1..=region_count`.
    pub region_count: u32,
    /// Label range per tile, row-major.
    ranges: Vec<LabelRange>,
    tiles_x: usize,
}

impl TileLabels {
    pub fn range(&self, index: TileIndex) -> LabelRange {
        self.ranges[index.row * self.tiles_x + index.col]
    }

    pub fn ranges(&self) -> &[LabelRange] {
        &self.ranges
    }

    /// Check that every nonzero label of a stored tile lies in the tile's range.
    pub fn check(&self, index: TileIndex, labels: &Buffer2<u32>) -> Result<(), Error> {
        let range = self.range(index);
        match labels.iter().find(|&&l| l != 0 && !range.contains(l)) {
            Some(&label) => Err(Error::LabelOutOfRange {
                row: index.row,
                col: index.col,
                label,
                first: range.first,
                last: range.last,
            }),
            None => Ok(()),
        }
    }
}

/// Rasters read for each tile by the segment pass.
#[derive(Clone, Copy)]
pub struct SegmentInputs<'a> {
    pub source: &'a dyn RasterSource,
    /// Side information handed to the segmenter with each tile.
    pub aux: Option<&'a dyn RasterSource>,
    /// Only pixels whose first-band mask value is greater than 0 are segmented.
    pub mask: Option<&'a dyn RasterSource>,
}

impl<'a> SegmentInputs<'a> {
    pub fn new(source: &'a dyn RasterSource) -> Self {
        Self {
            source,
            aux: None,
            mask: None,
        }
    }

    pub fn with_aux(mut self, aux: &'a dyn RasterSource) -> Self {
        self.aux = Some(aux);
        self
    }

    pub fn with_mask(mut self, mask: &'a dyn RasterSource) -> Self {
        self.mask = Some(mask);
        self
    }
}

/// Segment every tile, offset its labels, and store it as a `SEG` artifact.
///
/// Segmentation runs in parallel batches of `max_concurrent` tiles; offsets and
/// writes are applied in row-major order after each batch, so the stored labels do
/// not depend on scheduling.
pub fn segment_tiles(
    inputs: &SegmentInputs<'_>,
    segmenter: &dyn TileSegmenter,
    grid: &TileGrid,
    store: &dyn TileStore,
    max_concurrent: usize,
    progress: &ProgressCallback,
) -> Result<TileLabels, Error> {
    let tiles = grid.tiles();
    let total = tiles.len();
    tracing::info!(
        tiles_x = grid.tiles_x(),
        tiles_y = grid.tiles_y(),
        "Number of tiles: {}",
        total
    );

    let mut offset = 0u32;
    let mut ranges = Vec::with_capacity(total);

    try_par_for_each_chunk(
        &tiles,
        max_concurrent,
        |tile| segment_one(inputs, segmenter, tile),
        |tile, (mut labels, local_max)| {
            let range = apply_offset(tile.index, &mut labels, offset, local_max)?;
            store.write(TileKey::for_tile(tile.index, Stage::Segmented), &labels)?;
            tracing::debug!(
                row = tile.index.row,
                col = tile.index.col,
                local_max,
                offset,
                "Segmented tile"
            );
            offset = range.last;
            ranges.push(range);
            report_progress(progress, ranges.len(), total, PassStage::Segment);
            Ok(())
        },
    )?;

    tracing::info!(region_count = offset, "Offset labels of all tiles");

    Ok(TileLabels {
        region_count: offset,
        ranges,
        tiles_x: grid.tiles_x(),
    })
}

fn segment_one(
    inputs: &SegmentInputs<'_>,
    segmenter: &dyn TileSegmenter,
    tile: &Tile,
) -> Result<(Buffer2<u32>, u32), Error> {
    let rect = tile.extended();
    let pixels = inputs.source.read_region(rect)?;
    let aux = inputs.aux.map(|aux| aux.read_region(rect)).transpose()?;
    let mask = inputs
        .mask
        .map(|mask| mask.read_region(rect))
        .transpose()?
        .map(|mask| mask_from_band(mask.band(0)));

    let labels = match &mask {
        Some(mask) => segmenter.segment_masked(&pixels, aux.as_ref(), mask),
        None => segmenter.segment(&pixels, aux.as_ref()),
    };
    if labels.width() != rect.width || labels.height() != rect.height {
        return Err(Error::TileSizeMismatch {
            row: tile.index.row,
            col: tile.index.col,
            expected_width: rect.width,
            expected_height: rect.height,
            actual_width: labels.width(),
            actual_height: labels.height(),
        });
    }

    let local_max = labels.iter().copied().max().unwrap_or(0);
    Ok((labels, local_max))
}

fn mask_from_band(band: &Buffer2<f32>) -> Buffer2<bool> {
    Buffer2::new(
        band.width(),
        band.height(),
        band.iter().map(|&v| v > 0.0).collect(),
    )
}

/// Shift nonzero labels by `offset` and return the range the tile now owns.
fn apply_offset(
    index: TileIndex,
    labels: &mut Buffer2<u32>,
    offset: u32,
    local_max: u32,
) -> Result<LabelRange, Error> {
    let last = offset
        .checked_add(local_max)
        .ok_or(Error::LabelOverflow {
            row: index.row,
            col: index.col,
            offset: offset as u64,
            local_max: local_max as u64,
        })?;

    if offset > 0 {
        labels.map_in_place(|l| if l == 0 { 0 } else { l + offset });
    }

    Ok(LabelRange {
        first: offset.saturating_add(1),
        last,
    })
}
