//! Small-region pruning and dense renumbering.

use common::parallel::try_par_for_each_chunk;

use crate::error::Error;
use crate::grid::{Tile, TileGrid};
use crate::progress::{report_progress, PassStage, ProgressCallback};
use crate::store::{Stage, TileKey, TileStore};

/// Outcome of the pruning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PruneSummary {
    /// Regions merged into background for being smaller than the threshold.
    pub pruned: u32,
    /// Regions left; final labels are `1..=final_count`.
    pub final_count: u32,
}

/// Map each canonical label to its final label.
///
/// Regions with fewer than `min_region_size` pixels become background. Survivors are
/// numbered densely in increasing canonical order. Labels with an empty histogram
/// entry are not regions (absorbed labels, or labels seen only in an overlap margin)
/// and are counted neither as pruned nor as kept.
pub fn build_prune_table(histogram: &[u64], min_region_size: u64) -> (Vec<u32>, PruneSummary) {
    let mut table = vec![0u32; histogram.len()];
    let mut summary = PruneSummary::default();

    for (label, &count) in histogram.iter().enumerate().skip(1) {
        if count == 0 {
            continue;
        }
        if count < min_region_size {
            summary.pruned += 1;
        } else {
            summary.final_count += 1;
            table[label] = summary.final_count;
        }
    }

    (table, summary)
}

/// Rewrite every `RELAB` tile as a `FINAL` tile through the pruning table.
///
/// Consumes the histogram; the table is dropped when the pass ends.
pub fn prune_tiles(
    grid: &TileGrid,
    store: &dyn TileStore,
    histogram: Vec<u64>,
    min_region_size: u64,
    max_concurrent: usize,
    progress: &ProgressCallback,
) -> Result<PruneSummary, Error> {
    let (table, summary) = build_prune_table(&histogram, min_region_size);
    drop(histogram);

    tracing::info!(
        min_region_size,
        final_count = summary.final_count,
        "Number of small regions: {}",
        summary.pruned
    );

    let tiles = grid.tiles();
    let total = tiles.len();
    let mut done = 0usize;

    try_par_for_each_chunk(
        &tiles,
        max_concurrent,
        |tile| prune_one(tile, store, &table),
        |_, ()| {
            done += 1;
            report_progress(progress, done, total, PassStage::Prune);
            Ok(())
        },
    )?;

    Ok(summary)
}

fn prune_one(tile: &Tile, store: &dyn TileStore, table: &[u32]) -> Result<(), Error> {
    let relab_key = TileKey::for_tile(tile.index, Stage::Relabeled);
    let mut labels = store.read_sized(relab_key, tile.core.width, tile.core.height)?;
    labels.map_in_place(|l| table[l as usize]);

    store.write(TileKey::for_tile(tile.index, Stage::Final), &labels)?;
    store.remove(relab_key)?;
    Ok(())
}
