//! Vector output: per-tile polygonization and border-stitching fusion.

mod fusion;
mod geometry;
mod layer;
mod polygonize;

pub use fusion::{fuse_border_features, FusionReport};
pub use geometry::{overlap_length, touch_at_corner, Run, RunGeometry};
pub use layer::{Feature, FeatureId, MemoryLayer, VectorLayer};
pub use polygonize::{polygonize_tiles, Polygonizer, RunPolygonizer};
