//! Canonical relabeling with region histogram.
//!
//! Every `SEG` tile loses its overlap margin, has its labels mapped through the
//! canonical lookup table and is stored as `RELAB`. The `SEG` artifact is removed as
//! soon as its replacement exists. Pixel counts per canonical label are accumulated
//! on the way.

use common::parallel::try_par_for_each_chunk;
use common::Buffer2;
use hashbrown::HashMap;

use crate::error::Error;
use crate::grid::{Tile, TileGrid};
use crate::offset::TileLabels;
use crate::progress::{report_progress, PassStage, ProgressCallback};
use crate::store::{Stage, TileKey, TileStore};

/// Relabel all tiles and return the histogram indexed by canonical label.
///
/// `histogram[0]` stays 0: background is not counted.
pub fn relabel_tiles(
    grid: &TileGrid,
    store: &dyn TileStore,
    labels: &TileLabels,
    lut: &[u32],
    max_concurrent: usize,
    progress: &ProgressCallback,
) -> Result<Vec<u64>, Error> {
    let tiles = grid.tiles();
    let total = tiles.len();
    let mut histogram = vec![0u64; lut.len()];
    let mut done = 0usize;

    try_par_for_each_chunk(
        &tiles,
        max_concurrent,
        |tile| relabel_one(tile, store, labels, lut),
        |_, counts| {
            for (label, count) in counts {
                histogram[label as usize] += count;
            }
            done += 1;
            report_progress(progress, done, total, PassStage::Relabel);
            Ok(())
        },
    )?;

    let foreground: u64 = histogram.iter().sum();
    let regions = histogram.iter().filter(|&&c| c > 0).count();
    tracing::info!(foreground, regions, "Relabeled all tiles");

    Ok(histogram)
}

fn relabel_one(
    tile: &Tile,
    store: &dyn TileStore,
    labels: &TileLabels,
    lut: &[u32],
) -> Result<HashMap<u32, u64>, Error> {
    let seg_key = TileKey::for_tile(tile.index, Stage::Segmented);
    let extended = tile.extended();
    let seg = store.read_sized(seg_key, extended.width, extended.height)?;
    labels.check(tile.index, &seg)?;

    let mut relabeled = seg.crop(0, 0, tile.core.width, tile.core.height);
    drop(seg);
    relabeled.map_in_place(|l| lut[l as usize]);

    let counts = count_labels(&relabeled);

    store.write(TileKey::for_tile(tile.index, Stage::Relabeled), &relabeled)?;
    store.remove(seg_key)?;
    tracing::debug!(
        row = tile.index.row,
        col = tile.index.col,
        regions = counts.len(),
        "Relabeled tile"
    );

    Ok(counts)
}

/// Sparse pixel count per nonzero label.
fn count_labels(labels: &Buffer2<u32>) -> HashMap<u32, u64> {
    let mut counts = HashMap::new();
    for &label in labels.iter() {
        if label != 0 {
            *counts.entry(label).or_insert(0) += 1;
        }
    }
    counts
}
