//! Shared helpers for tests: synthetic masks and label comparisons.

use common::Buffer2;
use hashbrown::HashMap;

use crate::raster::{InMemoryRaster, PixelTile};

/// Single-band tile with 1.0 at `points` (as `(x, y)`) and 0.0 elsewhere.
pub fn mask_tile(width: usize, height: usize, points: &[(usize, usize)]) -> PixelTile {
    let mut band = Buffer2::new_filled(width, height, 0.0f32);
    for &(x, y) in points {
        *band.get_mut(x, y) = 1.0;
    }
    PixelTile::from_single_band(band)
}

pub fn mask_image(width: usize, height: usize, points: &[(usize, usize)]) -> InMemoryRaster {
    InMemoryRaster::new(mask_tile(width, height, points))
}

/// Thick staircase over an 8x8 image, made of two 4-connected halves that touch
/// only diagonally between `(3, 3)` and `(4, 4)`, a tile corner for 2x2 tiles.
pub fn split_stripe_points() -> Vec<(usize, usize)> {
    let mut points = Vec::new();
    for y in 0..4usize {
        for x in y.saturating_sub(1)..=y {
            points.push((x, y));
        }
    }
    for y in 4..8usize {
        for x in y..(y + 2).min(8) {
            points.push((x, y));
        }
    }
    points
}

/// Solid 4-connected staircase over an 8x8 image.
pub fn stripe_points() -> Vec<(usize, usize)> {
    let mut points = Vec::new();
    for y in 0..8usize {
        for x in y.saturating_sub(1)..=y {
            points.push((x, y));
        }
    }
    points
}

/// True when both label images describe the same regions, ignoring label values.
///
/// Background must match exactly.
pub fn same_partition(a: &Buffer2<u32>, b: &Buffer2<u32>) -> bool {
    if a.width() != b.width() || a.height() != b.height() {
        return false;
    }
    let mut forward: HashMap<u32, u32> = HashMap::new();
    let mut backward: HashMap<u32, u32> = HashMap::new();
    for (&la, &lb) in a.iter().zip(b.iter()) {
        if (la == 0) != (lb == 0) {
            return false;
        }
        if *forward.entry(la).or_insert(lb) != lb || *backward.entry(lb).or_insert(la) != la {
            return false;
        }
    }
    true
}

/// Number of distinct nonzero labels.
pub fn count_regions(labels: &Buffer2<u32>) -> usize {
    let mut seen: Vec<u32> = labels.iter().copied().filter(|&l| l != 0).collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}
