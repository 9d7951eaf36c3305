//! Border-stitching fusion.
//!
//! Regions crossing tile borders are polygonized once per tile, so each comes out as
//! several features sharing one label. Every seam between adjacent tiles is visited
//! once: features on both sides with equal labels whose geometries meet on the seam
//! become candidates ranked by contact length, and are fused greedily, each feature at
//! most once per seam. The lower feature id survives.
//!
//! Seam order: horizontal seams row-major, then vertical seams row-major, then (with
//! 8-connectivity) the corner points where four tiles meet.

use std::collections::BTreeMap;
use std::ops::Range;

use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;

use super::geometry::{overlap_length, touch_at_corner, RunGeometry};
use super::layer::{Feature, FeatureId, VectorLayer};
use crate::config::Connectivity;
use crate::grid::{TileGrid, TileIndex};
use crate::progress::{report_progress, PassStage, ProgressCallback};

/// Counters from one fusion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FusionReport {
    pub seams: usize,
    pub candidates: usize,
    pub fused: usize,
    /// Candidates dropped because a geometry was degenerate.
    pub skipped: usize,
    pub features_before: usize,
    pub features_after: usize,
}

/// Where two tiles meet.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SeamShape {
    /// `a` above `b`; `b` starts at row `y`.
    Horizontal { y: usize, xs: Range<usize> },
    /// `a` left of `b`; `b` starts at column `x`.
    Vertical { x: usize, ys: Range<usize> },
    /// `a` and `b` are diagonal neighbors; the seam is the pixel pair meeting at the corner.
    Corner {
        a_pixel: (usize, usize),
        b_pixel: (usize, usize),
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Seam {
    a: TileIndex,
    b: TileIndex,
    shape: SeamShape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Contact {
    overlap: usize,
    /// The two sides meet at a single point only.
    corner: bool,
}

impl Seam {
    fn contact(&self, a: &RunGeometry, b: &RunGeometry) -> Contact {
        match &self.shape {
            SeamShape::Horizontal { y, xs } => {
                side_contact(&a.row_contact(y - 1, xs.clone()), &b.row_contact(*y, xs.clone()))
            }
            SeamShape::Vertical { x, ys } => side_contact(
                &a.column_contact(x - 1, ys.clone()),
                &b.column_contact(*x, ys.clone()),
            ),
            SeamShape::Corner { a_pixel, b_pixel } => Contact {
                overlap: 0,
                corner: a.contains(a_pixel.0, a_pixel.1) && b.contains(b_pixel.0, b_pixel.1),
            },
        }
    }
}

fn side_contact(a: &[Range<usize>], b: &[Range<usize>]) -> Contact {
    Contact {
        overlap: overlap_length(a, b),
        corner: touch_at_corner(a, b),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    a: FeatureId,
    b: FeatureId,
    overlap: usize,
}

/// All seams of the grid in visiting order.
fn seams(grid: &TileGrid, connectivity: Connectivity) -> Vec<Seam> {
    let mut seams = Vec::new();

    for row in 0..grid.tiles_y().saturating_sub(1) {
        for col in 0..grid.tiles_x() {
            let a = grid.tile(TileIndex::new(row, col));
            let b = TileIndex::new(row + 1, col);
            seams.push(Seam {
                a: a.index,
                b,
                shape: SeamShape::Horizontal {
                    y: a.core.bottom(),
                    xs: a.core.x..a.core.right(),
                },
            });
        }
    }

    for row in 0..grid.tiles_y() {
        for col in 0..grid.tiles_x().saturating_sub(1) {
            let a = grid.tile(TileIndex::new(row, col));
            let b = TileIndex::new(row, col + 1);
            seams.push(Seam {
                a: a.index,
                b,
                shape: SeamShape::Vertical {
                    x: a.core.right(),
                    ys: a.core.y..a.core.bottom(),
                },
            });
        }
    }

    if connectivity.includes_diagonals() {
        for row in 0..grid.tiles_y().saturating_sub(1) {
            for col in 0..grid.tiles_x().saturating_sub(1) {
                let core = grid.tile(TileIndex::new(row, col)).core;
                let (x, y) = (core.right(), core.bottom());
                seams.push(Seam {
                    a: TileIndex::new(row, col),
                    b: TileIndex::new(row + 1, col + 1),
                    shape: SeamShape::Corner {
                        a_pixel: (x - 1, y - 1),
                        b_pixel: (x, y),
                    },
                });
                seams.push(Seam {
                    a: TileIndex::new(row, col + 1),
                    b: TileIndex::new(row + 1, col),
                    shape: SeamShape::Corner {
                        a_pixel: (x, y - 1),
                        b_pixel: (x - 1, y),
                    },
                });
            }
        }
    }

    seams
}

/// Fuse features split by tile borders and write the result back to `layer`.
pub fn fuse_border_features(
    layer: &mut dyn VectorLayer,
    grid: &TileGrid,
    connectivity: Connectivity,
    progress: &ProgressCallback,
) -> FusionReport {
    let mut features: BTreeMap<FeatureId, Feature> = layer
        .take_features()
        .into_iter()
        .map(|f| (f.id, f))
        .collect();

    // Tile -> label -> feature currently holding that label's pixels of the tile.
    let mut owners: HashMap<TileIndex, HashMap<u32, FeatureId>> = HashMap::new();
    for feature in features.values() {
        for &tile in &feature.tiles {
            owners
                .entry(tile)
                .or_default()
                .insert(feature.label, feature.id);
        }
    }

    let seams = seams(grid, connectivity);
    let mut report = FusionReport {
        seams: seams.len(),
        features_before: features.len(),
        ..FusionReport::default()
    };

    for (done, seam) in seams.iter().enumerate() {
        let pairs = seam_pairs(seam, &owners);

        let mut valid = Vec::with_capacity(pairs.len());
        for (a, b) in pairs {
            if features[&a].geometry.is_empty() || features[&b].geometry.is_empty() {
                tracing::warn!(
                    a,
                    b,
                    label = features[&a].label,
                    "Skipping fusion candidate with empty geometry"
                );
                report.skipped += 1;
                continue;
            }
            valid.push((a, b));
        }

        let mut candidates: Vec<Candidate> = valid
            .par_iter()
            .filter_map(|&(a, b)| {
                let contact = seam.contact(&features[&a].geometry, &features[&b].geometry);
                let eligible =
                    contact.overlap > 0 || (connectivity.includes_diagonals() && contact.corner);
                eligible.then_some(Candidate {
                    a,
                    b,
                    overlap: contact.overlap,
                })
            })
            .collect();
        report.candidates += candidates.len();

        candidates.sort_by(|x, y| {
            y.overlap
                .cmp(&x.overlap)
                .then_with(|| x.a.min(x.b).cmp(&y.a.min(y.b)))
                .then_with(|| x.a.max(x.b).cmp(&y.a.max(y.b)))
        });

        let mut consumed: HashSet<FeatureId> = HashSet::new();
        for candidate in candidates {
            if consumed.contains(&candidate.a) || consumed.contains(&candidate.b) {
                continue;
            }
            let kept = fuse(&mut features, &mut owners, candidate.a, candidate.b);
            consumed.insert(candidate.a);
            consumed.insert(candidate.b);
            tracing::debug!(kept, overlap = candidate.overlap, "Fused features");
            report.fused += 1;
        }

        report_progress(progress, done + 1, report.seams, PassStage::Fuse);
    }

    report.features_after = features.len();
    tracing::info!(
        seams = report.seams,
        fused = report.fused,
        skipped = report.skipped,
        features = report.features_after,
        "Fused border features"
    );

    layer.replace_features(features.into_values().collect());
    report
}

/// Distinct feature pairs with equal labels on the two sides of a seam.
fn seam_pairs(
    seam: &Seam,
    owners: &HashMap<TileIndex, HashMap<u32, FeatureId>>,
) -> Vec<(FeatureId, FeatureId)> {
    let (Some(side_a), Some(side_b)) = (owners.get(&seam.a), owners.get(&seam.b)) else {
        return Vec::new();
    };
    let mut pairs: Vec<(FeatureId, FeatureId)> = side_a
        .iter()
        .filter_map(|(label, &a)| {
            let &b = side_b.get(label)?;
            (a != b).then_some((a, b))
        })
        .collect();
    pairs.sort_unstable();
    pairs
}

/// Merge the higher-id feature into the lower-id one; returns the surviving id.
fn fuse(
    features: &mut BTreeMap<FeatureId, Feature>,
    owners: &mut HashMap<TileIndex, HashMap<u32, FeatureId>>,
    a: FeatureId,
    b: FeatureId,
) -> FeatureId {
    let (kept, absorbed) = if a < b { (a, b) } else { (b, a) };
    let Some(absorbed) = features.remove(&absorbed) else {
        return kept;
    };
    for &tile in &absorbed.tiles {
        owners
            .entry(tile)
            .or_default()
            .insert(absorbed.label, kept);
    }
    if let Some(target) = features.get_mut(&kept) {
        target.geometry.union_with(&absorbed.geometry);
        target.tiles.extend(absorbed.tiles);
    }
    kept
}
