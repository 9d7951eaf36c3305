//! Cross-tile label equivalence.
//!
//! Neighboring tiles overlap by one pixel: the trailing margin row (column) of a tile
//! is the first row (column) of the tile below (to the right). Both tiles segmented
//! that pixel, so its two labels name the same region and are unioned.
//!
//! Tiles are visited in scan order. Up and left neighbors always come first in both
//! supported orders, so only the trailing edges of visited tiles are kept, and each
//! is dropped as soon as the neighbor consuming it has been compared.
//!
//! With 8-connectivity the comparison extends over the shared corner pixel of the
//! overlap, so regions touching diagonally at a four-tile corner are chained.

use common::Buffer2;
use hashbrown::HashMap;

use crate::config::{Connectivity, ScanOrder};
use crate::error::Error;
use crate::grid::{Tile, TileGrid, TileIndex};
use crate::offset::TileLabels;
use crate::progress::{report_progress, PassStage, ProgressCallback};
use crate::store::{Stage, TileKey, TileStore};
use crate::union_find::LabelUnionFind;

/// Edges a visited tile leaves behind for its neighbors.
#[derive(Debug, Default)]
struct RetainedEdges {
    /// Margin row, consumed by the tile below.
    bottom: HashMap<TileIndex, Vec<u32>>,
    /// Margin column, consumed by the tile to the right.
    right: HashMap<TileIndex, Vec<u32>>,
    peak: usize,
}

impl RetainedEdges {
    fn len(&self) -> usize {
        self.bottom.len() + self.right.len()
    }
}

/// Build the canonical lookup table over `0..=region_count`.
///
/// `lut[l]` is the smallest label of the region `l` belongs to. A single-tile grid
/// has no seams and gets the identity table without reading any artifact.
pub fn resolve_labels(
    grid: &TileGrid,
    store: &dyn TileStore,
    labels: &TileLabels,
    scan_order: ScanOrder,
    connectivity: Connectivity,
    progress: &ProgressCallback,
) -> Result<Vec<u32>, Error> {
    let mut uf = LabelUnionFind::with_labels(labels.region_count);

    if grid.is_single_tile() {
        tracing::info!("Single tile, skipping cross-tile resolution");
        return Ok(uf.into_lut());
    }

    let order = grid.scan(scan_order);
    let total = order.len();
    let mut edges = RetainedEdges::default();
    let mut unions = 0usize;

    for (done, index) in order.into_iter().enumerate() {
        let tile = grid.tile(index);
        let extended = tile.extended();
        let seg = store.read_sized(
            TileKey::for_tile(index, Stage::Segmented),
            extended.width,
            extended.height,
        )?;
        labels.check(index, &seg)?;

        let core_w = tile.core.width;
        let core_h = tile.core.height;

        if index.row > 0 {
            let above = TileIndex::new(index.row - 1, index.col);
            let above_row = edges
                .bottom
                .remove(&above)
                .ok_or(Error::MissingArtifact {
                    key: TileKey::for_tile(above, Stage::Segmented),
                })?;
            let len = compared_len(core_w, tile.margin_right, connectivity);
            unions += union_edges(&mut uf, &above_row[..len], &seg.row(0)[..len]);
        }

        if index.col > 0 {
            let left = TileIndex::new(index.row, index.col - 1);
            let left_col = edges
                .right
                .remove(&left)
                .ok_or(Error::MissingArtifact {
                    key: TileKey::for_tile(left, Stage::Segmented),
                })?;
            let len = compared_len(core_h, tile.margin_bottom, connectivity);
            let first_col = seg.column(0);
            unions += union_edges(&mut uf, &left_col[..len], &first_col[..len]);
        }

        retain_edges(&mut edges, &tile, &seg);
        edges.peak = edges.peak.max(edges.len());

        report_progress(progress, done + 1, total, PassStage::Resolve);
    }

    debug_assert!(edges.bottom.is_empty() && edges.right.is_empty());
    tracing::info!(
        unions,
        peak_retained_edges = edges.peak,
        "LUT size: {}",
        labels.region_count as usize + 1
    );

    Ok(uf.into_lut())
}

/// Number of overlap pixels compared along a seam of `core_len` pixels.
///
/// The trailing corner pixel exists only when the tile has a margin across the seam,
/// and is compared only under 8-connectivity.
#[inline]
fn compared_len(core_len: usize, has_corner: bool, connectivity: Connectivity) -> usize {
    if has_corner && connectivity.includes_diagonals() {
        core_len + 1
    } else {
        core_len
    }
}

fn union_edges(uf: &mut LabelUnionFind, a: &[u32], b: &[u32]) -> usize {
    debug_assert_eq!(a.len(), b.len());
    let mut unions = 0;
    for (&la, &lb) in a.iter().zip(b) {
        if la == 0 || lb == 0 {
            continue;
        }
        if uf.find(la) != uf.find(lb) {
            uf.union(la, lb);
            unions += 1;
        }
    }
    unions
}

fn retain_edges(edges: &mut RetainedEdges, tile: &Tile, seg: &Buffer2<u32>) {
    if tile.margin_bottom {
        edges
            .bottom
            .insert(tile.index, seg.row(tile.core.height).to_vec());
    }
    if tile.margin_right {
        edges.right.insert(tile.index, seg.column(tile.core.width));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offset::{segment_tiles, SegmentInputs};
    use crate::segmenter::ConnectedComponentSegmenter;
    use crate::store::MemoryTileStore;
    use crate::test_utils::{mask_image, split_stripe_points, stripe_points};

    fn run(
        width: usize,
        height: usize,
        points: &[(usize, usize)],
        tile: usize,
        connectivity: Connectivity,
        scan_order: ScanOrder,
    ) -> (Vec<u32>, MemoryTileStore, TileGrid) {
        let raster = mask_image(width, height, points);
        let grid = TileGrid::new(width, height, tile, tile);
        let store = MemoryTileStore::new();
        let segmenter = ConnectedComponentSegmenter::new(0.5, connectivity).with_no_data(0.0);
        let labels = segment_tiles(
            &SegmentInputs::new(&raster),
            &segmenter,
            &grid,
            &store,
            4,
            &None,
        )
        .unwrap();
        let lut = resolve_labels(&grid, &store, &labels, scan_order, connectivity, &None).unwrap();
        (lut, store, grid)
    }

    /// Canonical labels of the given image pixels.
    fn canonical_at(
        lut: &[u32],
        store: &MemoryTileStore,
        grid: &TileGrid,
        points: &[(usize, usize)],
    ) -> Vec<u32> {
        points
            .iter()
            .map(|&(x, y)| {
                let index = grid.tile_containing(x, y);
                let tile = grid.tile(index);
                let seg = store
                    .read(TileKey::for_tile(index, Stage::Segmented))
                    .unwrap();
                lut[*seg.get(x - tile.core.x, y - tile.core.y) as usize]
            })
            .collect()
    }

    #[test]
    fn test_lut_is_idempotent() {
        let (lut, _, _) = run(
            8,
            8,
            &stripe_points(),
            2,
            Connectivity::Four,
            ScanOrder::RowMajor,
        );
        for &canonical in &lut {
            assert_eq!(lut[canonical as usize], canonical);
        }
        assert_eq!(lut[0], 0);
    }

    #[test]
    fn test_stripe_collapses_to_one_region() {
        let points = stripe_points();
        let (lut, store, grid) = run(8, 8, &points, 2, Connectivity::Four, ScanOrder::RowMajor);
        let canonical = canonical_at(&lut, &store, &grid, &points);
        assert!(canonical.iter().all(|&l| l == canonical[0] && l != 0));
    }

    #[test]
    fn test_corner_touch_depends_on_connectivity() {
        let points = split_stripe_points();

        let (lut, store, grid) = run(8, 8, &points, 2, Connectivity::Four, ScanOrder::RowMajor);
        let four = canonical_at(&lut, &store, &grid, &[(3, 3), (4, 4)]);
        assert_ne!(four[0], four[1]);

        let (lut, store, grid) = run(8, 8, &points, 2, Connectivity::Eight, ScanOrder::RowMajor);
        let eight = canonical_at(&lut, &store, &grid, &[(3, 3), (4, 4)]);
        assert_eq!(eight[0], eight[1]);
    }

    #[test]
    fn test_anti_diagonal_corner_touch_with_eight_connectivity() {
        // (2, 1) in tile (0, 1) and (1, 2) in tile (1, 0) touch only at the
        // shared corner of four 2x2 tiles.
        let points = [(2, 1), (3, 1), (1, 2), (0, 2)];
        let (lut, store, grid) = run(4, 4, &points, 2, Connectivity::Eight, ScanOrder::RowMajor);
        let canonical = canonical_at(&lut, &store, &grid, &points);
        assert!(canonical.iter().all(|&l| l == canonical[0]));

        let (lut, store, grid) = run(4, 4, &points, 2, Connectivity::Four, ScanOrder::RowMajor);
        let canonical = canonical_at(&lut, &store, &grid, &[(2, 1), (1, 2)]);
        assert_ne!(canonical[0], canonical[1]);
    }

    #[test]
    fn test_scan_order_does_not_change_lut() {
        let points = [
            (0, 0), (1, 0), (2, 0), (3, 0), (4, 0),
            (4, 1), (4, 2), (3, 3), (4, 3), (0, 4),
            (1, 4), (2, 4), (3, 4), (6, 6), (5, 6),
        ];
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            let (row_major, _, _) = run(7, 7, &points, 2, connectivity, ScanOrder::RowMajor);
            let (col_major, _, _) = run(7, 7, &points, 2, connectivity, ScanOrder::ColumnMajor);
            assert_eq!(row_major, col_major);
        }
    }

    #[test]
    fn test_background_pairs_are_skipped() {
        let (lut, _, _) = run(4, 4, &[(0, 0), (3, 3)], 2, Connectivity::Eight, ScanOrder::RowMajor);
        assert!(lut.iter().enumerate().all(|(l, &c)| l as u32 == c));
    }

    #[test]
    fn test_single_tile_is_identity_without_reading() {
        let raster = mask_image(3, 3, &[(0, 0), (2, 2)]);
        let grid = TileGrid::new(3, 3, 8, 8);
        let store = MemoryTileStore::new();
        let segmenter = ConnectedComponentSegmenter::new(0.5, Connectivity::Four).with_no_data(0.0);
        let labels = segment_tiles(
            &SegmentInputs::new(&raster),
            &segmenter,
            &grid,
            &store,
            1,
            &None,
        )
        .unwrap();
        store.cleanup().unwrap();

        let lut = resolve_labels(&grid, &store, &labels, ScanOrder::RowMajor, Connectivity::Four, &None)
            .unwrap();
        assert_eq!(lut, vec![0, 1, 2]);
    }

    #[test]
    fn test_missing_artifact_aborts() {
        let raster = mask_image(4, 4, &[(1, 1), (2, 2)]);
        let grid = TileGrid::new(4, 4, 2, 2);
        let store = MemoryTileStore::new();
        let segmenter = ConnectedComponentSegmenter::new(0.5, Connectivity::Four).with_no_data(0.0);
        let labels = segment_tiles(
            &SegmentInputs::new(&raster),
            &segmenter,
            &grid,
            &store,
            4,
            &None,
        )
        .unwrap();
        store.remove(TileKey::new(1, 0, Stage::Segmented)).unwrap();

        let err = resolve_labels(&grid, &store, &labels, ScanOrder::RowMajor, Connectivity::Four, &None)
            .unwrap_err();
        assert!(matches!(err, Error::MissingArtifact { .. }));
    }

    #[test]
    fn test_out_of_range_label_aborts() {
        let raster = mask_image(4, 2, &[(0, 0), (3, 0)]);
        let grid = TileGrid::new(4, 2, 2, 2);
        let store = MemoryTileStore::new();
        let segmenter = ConnectedComponentSegmenter::new(0.5, Connectivity::Four).with_no_data(0.0);
        let labels = segment_tiles(
            &SegmentInputs::new(&raster),
            &segmenter,
            &grid,
            &store,
            4,
            &None,
        )
        .unwrap();
        store
            .write(
                TileKey::new(0, 1, Stage::Segmented),
                &Buffer2::new(2, 2, vec![1, 0, 0, 0]),
            )
            .unwrap();

        let err = resolve_labels(&grid, &store, &labels, ScanOrder::RowMajor, Connectivity::Four, &None)
            .unwrap_err();
        assert!(matches!(err, Error::LabelOutOfRange { row: 0, col: 1, label: 1, .. }));
    }

    #[test]
    fn test_wrong_size_segmented_tile_aborts() {
        let raster = mask_image(4, 2, &[(0, 0), (3, 0)]);
        let grid = TileGrid::new(4, 2, 2, 2);
        let store = MemoryTileStore::new();
        let segmenter = ConnectedComponentSegmenter::new(0.5, Connectivity::Four).with_no_data(0.0);
        let labels = segment_tiles(
            &SegmentInputs::new(&raster),
            &segmenter,
            &grid,
            &store,
            4,
            &None,
        )
        .unwrap();
        // Tile (0, 0) carries a one-pixel right margin, so its artifact is 3x2.
        store
            .write(
                TileKey::new(0, 0, Stage::Segmented),
                &Buffer2::new(2, 2, vec![1, 0, 0, 0]),
            )
            .unwrap();

        let err = resolve_labels(&grid, &store, &labels, ScanOrder::RowMajor, Connectivity::Eight, &None)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::TileSizeMismatch {
                row: 0,
                col: 0,
                expected_width: 3,
                expected_height: 2,
                actual_width: 2,
                actual_height: 2,
            }
        ));
    }
}
