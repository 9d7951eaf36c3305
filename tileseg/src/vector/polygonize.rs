//! Label tiles to features.

use std::collections::BTreeMap;

use common::parallel::try_par_for_each_chunk;
use common::Buffer2;

use super::geometry::{Run, RunGeometry};
use super::layer::{Feature, VectorLayer};
use crate::error::Error;
use crate::grid::{TileGrid, TileIndex};
use crate::progress::{report_progress, PassStage, ProgressCallback};
use crate::store::{Stage, TileKey, TileStore};

/// Turns one label tile into features.
pub trait Polygonizer: Send + Sync {
    /// One feature per nonzero label present in `labels`, with geometry in image
    /// coordinates (`origin` is the tile's top-left pixel) and `tile` recorded as origin.
    fn polygonize(&self, labels: &Buffer2<u32>, tile: TileIndex, origin: (usize, usize)) -> Vec<Feature>;
}

/// Collects the row runs of each label.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunPolygonizer;

impl Polygonizer for RunPolygonizer {
    fn polygonize(&self, labels: &Buffer2<u32>, tile: TileIndex, origin: (usize, usize)) -> Vec<Feature> {
        let (ox, oy) = origin;
        let mut runs: BTreeMap<u32, Vec<Run>> = BTreeMap::new();

        for y in 0..labels.height() {
            let row = labels.row(y);
            let mut x = 0;
            while x < row.len() {
                let label = row[x];
                let start = x;
                while x < row.len() && row[x] == label {
                    x += 1;
                }
                if label != 0 {
                    runs.entry(label)
                        .or_default()
                        .push(Run::new(oy + y, ox + start, ox + x));
                }
            }
        }

        runs.into_iter()
            .map(|(label, runs)| Feature::new(label, RunGeometry::from_runs(runs), tile))
            .collect()
    }
}

/// Polygonize every `FINAL` tile into `layer`.
///
/// Tiles are polygonized in parallel batches; features are added in row-major tile
/// order and increasing label order, so feature ids are deterministic.
pub fn polygonize_tiles(
    grid: &TileGrid,
    store: &dyn TileStore,
    polygonizer: &dyn Polygonizer,
    layer: &mut dyn VectorLayer,
    max_concurrent: usize,
    progress: &ProgressCallback,
) -> Result<usize, Error> {
    let tiles = grid.tiles();
    let total = tiles.len();
    let mut done = 0usize;
    let mut added = 0usize;

    try_par_for_each_chunk(
        &tiles,
        max_concurrent,
        |tile| -> Result<Vec<Feature>, Error> {
            let labels = store.read_sized(
                TileKey::for_tile(tile.index, Stage::Final),
                tile.core.width,
                tile.core.height,
            )?;
            Ok(polygonizer.polygonize(&labels, tile.index, (tile.core.x, tile.core.y)))
        },
        |_, features| {
            added += features.len();
            for feature in features {
                layer.add_feature(feature);
            }
            done += 1;
            report_progress(progress, done, total, PassStage::Polygonize);
            Ok(())
        },
    )?;

    tracing::info!(
        features = added,
        layer = layer.name(),
        "Polygonized all tiles"
    );
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTileStore;
    use crate::vector::layer::MemoryLayer;

    #[test]
    fn test_one_feature_per_label() {
        // 1 1 0 2
        // 0 1 2 2
        let labels = Buffer2::new(4, 2, vec![1, 1, 0, 2, 0, 1, 2, 2]);
        let features = RunPolygonizer.polygonize(&labels, TileIndex::new(0, 1), (10, 20));

        assert_eq!(features.len(), 2);
        assert_eq!(features[0].label, 1);
        assert_eq!(
            features[0].geometry.runs(),
            &[Run::new(20, 10, 12), Run::new(21, 11, 12)]
        );
        assert_eq!(features[1].label, 2);
        assert_eq!(features[1].geometry.area(), 3);
        assert!(features[1].tiles.contains(&TileIndex::new(0, 1)));
    }

    #[test]
    fn test_disconnected_pixels_share_a_feature() {
        let labels = Buffer2::new(3, 1, vec![5, 0, 5]);
        let features = RunPolygonizer.polygonize(&labels, TileIndex::new(0, 0), (0, 0));
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].geometry.runs().len(), 2);
    }

    #[test]
    fn test_background_tile_has_no_features() {
        let labels = Buffer2::new_filled(3, 3, 0u32);
        assert!(RunPolygonizer
            .polygonize(&labels, TileIndex::new(0, 0), (0, 0))
            .is_empty());
    }

    #[test]
    fn test_polygonize_tiles_adds_in_tile_order() {
        let grid = TileGrid::new(4, 2, 2, 2);
        let store = MemoryTileStore::new();
        store
            .write(TileKey::new(0, 0, Stage::Final), &Buffer2::new(2, 2, vec![2, 0, 1, 0]))
            .unwrap();
        store
            .write(TileKey::new(0, 1, Stage::Final), &Buffer2::new(2, 2, vec![0, 1, 0, 0]))
            .unwrap();
        let mut layer = MemoryLayer::new("layer", "DN");

        let added = polygonize_tiles(&grid, &store, &RunPolygonizer, &mut layer, 2, &None).unwrap();

        assert_eq!(added, 3);
        let summary: Vec<(u64, u32)> = layer.features().iter().map(|f| (f.id, f.label)).collect();
        assert_eq!(summary, vec![(1, 1), (2, 2), (3, 1)]);
        assert_eq!(layer.features()[2].geometry.runs(), &[Run::new(0, 3, 4)]);
    }
}
