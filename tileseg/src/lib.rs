//! Tileseg - tiled segmentation of rasters too large for memory.
//!
//! The image is cut into tiles that are segmented independently. Label conflicts and
//! geometry split at tile borders are then reconciled so the result matches a
//! segmentation of the whole image at once:
//! - per-tile label offsets make every label globally unique
//! - a union-find over the one-pixel tile overlaps merges regions crossing seams
//! - a relabel pass applies canonical labels and counts region sizes
//! - a pruning pass drops small regions and renumbers the rest densely
//! - raster output is a mosaic view over the final tiles; vector output fuses
//!   per-tile polygons back into one feature per region
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tileseg::{Config, InMemoryRaster, Pipeline, PipelineOutput};
//!
//! let config = Config::from_yaml_file("segmentation.yaml".as_ref())?;
//! let raster = InMemoryRaster::from_single_band(band);
//! let (output, report) = Pipeline::new(config)?.run(&raster)?;
//!
//! if let PipelineOutput::Raster(mosaic) = output {
//!     println!("{} regions, label at (10, 20): {}", report.final_count, mosaic.get(10, 20)?);
//! }
//! ```

pub mod config;
pub mod error;
pub mod grid;
pub mod mosaic;
pub mod offset;
pub mod pipeline;
pub mod progress;
pub mod prune;
pub mod raster;
pub mod relabel;
pub mod resolve;
pub mod segmenter;
pub mod store;
pub mod union_find;
pub mod vector;

#[cfg(test)]
pub(crate) mod test_utils;

// ============================================================================
// Pipeline
// ============================================================================

pub use config::{Config, Connectivity, OutputMode, ScanOrder, Tiling};
pub use error::Error;
pub use offset::SegmentInputs;
pub use pipeline::{Pipeline, PipelineOutput, PipelineReport};
pub use progress::{PassStage, Progress, ProgressCallback};

// ============================================================================
// Collaborators
// ============================================================================

pub use grid::{PixelRect, Tile, TileGrid, TileIndex};
pub use mosaic::MosaicRaster;
pub use raster::{GeoInfo, InMemoryRaster, PixelTile, RasterSource};
pub use segmenter::{ConnectedComponentSegmenter, TileSegmenter};
pub use store::{DiskTileStore, MemoryTileStore, Stage, TileKey, TileStore};
pub use vector::{Feature, FeatureId, MemoryLayer, Polygonizer, RunGeometry, RunPolygonizer, VectorLayer};

pub use common::Buffer2;
