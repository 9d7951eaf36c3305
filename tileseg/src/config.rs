//! Configuration types for tiled segmentation.
//!
//! This module defines the flat [`Config`] struct and associated enums consumed
//! by the pipeline. All parameters are grouped by comments into logical sections.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ============================================================================
// Enums
// ============================================================================

/// Pixel connectivity for region adjacency.
///
/// Determines whether pixels touching only at a corner belong to the same
/// region, both inside a tile and across tile seams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// 4-connectivity: only horizontal and vertical neighbors.
    /// Diagonal pixels are NOT connected.
    #[default]
    Four,
    /// 8-connectivity: includes diagonal neighbors.
    Eight,
}

impl Connectivity {
    #[inline]
    pub fn includes_diagonals(self) -> bool {
        matches!(self, Connectivity::Eight)
    }
}

/// What the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// A label raster, exposed as a mosaic over the final tiles.
    #[default]
    Raster,
    /// One polygon feature per region, with seam-split fragments stitched back together.
    Vector,
}

/// Order in which tiles are visited while resolving cross-tile equivalences.
///
/// The resolved table is identical for both orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOrder {
    #[default]
    RowMajor,
    ColumnMajor,
}

/// How the image is cut into tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tiling {
    /// Fixed tile size in pixels; the last row/column of tiles may be smaller.
    TileSize { x: usize, y: usize },
    /// Fixed number of tiles along each axis; the size is derived from the image.
    TileCount { x: usize, y: usize },
}

impl Default for Tiling {
    fn default() -> Self {
        Tiling::TileSize { x: 500, y: 500 }
    }
}

impl Tiling {
    /// Tile size in pixels for an image of the given size.
    pub fn tile_size(&self, image_width: usize, image_height: usize) -> (usize, usize) {
        match *self {
            Tiling::TileSize { x, y } => (x, y),
            Tiling::TileCount { x, y } => (
                image_width.div_ceil(x).max(1),
                image_height.div_ceil(y).max(1),
            ),
        }
    }
}

// ============================================================================
// Config
// ============================================================================

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // -- Tiling --
    pub tiling: Tiling,
    /// Number of tiles segmented (or relabeled) concurrently.
    /// Bounds peak memory to this many tile buffers.
    pub max_concurrent_tiles: usize,
    pub scan_order: ScanOrder,

    // -- Segmentation criteria (opaque to the reconciliation passes) --
    /// Maximum spectral distance between neighbors in the same segment.
    pub range_threshold: f32,
    /// Maximum distance between neighbors' spatial positions (auxiliary image only).
    pub spatial_threshold: f32,
    /// Pixels equal to this value in every band are background.
    pub no_data: Option<f32>,
    pub connectivity: Connectivity,

    // -- Pruning --
    /// Regions with fewer pixels are merged into background. 0 disables pruning.
    pub min_region_size: u64,

    // -- Output --
    pub output_mode: OutputMode,
    pub layer_name: String,
    /// Attribute holding the region label on vector features.
    pub field_name: String,
    /// Fuse features split by tile borders (vector output only).
    pub stitch: bool,
    /// Id given to the first vector feature; later features count up from it.
    pub start_label: u64,

    // -- Temporary artifacts --
    /// Directory for tile artifacts. Artifacts are kept in memory when unset.
    pub temp_dir: Option<PathBuf>,
    /// Remove superseded artifacts, and the temp directory if this run created it.
    pub cleanup: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tiling: Tiling::default(),
            max_concurrent_tiles: rayon::current_num_threads().max(1),
            scan_order: ScanOrder::default(),
            range_threshold: 15.0,
            spatial_threshold: 5.0,
            no_data: None,
            connectivity: Connectivity::default(),
            min_region_size: 0,
            output_mode: OutputMode::default(),
            layer_name: "layer".to_string(),
            field_name: "DN".to_string(),
            stitch: true,
            start_label: 1,
            temp_dir: None,
            cleanup: true,
        }
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, Error> {
        let config: Config =
            serde_yml::from_str(yaml).map_err(|source| Error::ConfigParse { source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, Error> {
        let yaml = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Validate all parameters.
    pub fn validate(&self) -> Result<(), Error> {
        let (x, y) = match self.tiling {
            Tiling::TileSize { x, y } | Tiling::TileCount { x, y } => (x, y),
        };
        if x == 0 || y == 0 {
            return Err(invalid(format!("tiling must be positive, got {x}x{y}")));
        }
        if self.max_concurrent_tiles == 0 {
            return Err(invalid("max_concurrent_tiles must be positive".to_string()));
        }
        if !(self.range_threshold.is_finite() && self.range_threshold >= 0.0) {
            return Err(invalid(format!(
                "range_threshold must be non-negative, got {}",
                self.range_threshold
            )));
        }
        if !(self.spatial_threshold.is_finite() && self.spatial_threshold >= 0.0) {
            return Err(invalid(format!(
                "spatial_threshold must be non-negative, got {}",
                self.spatial_threshold
            )));
        }
        if self.field_name.is_empty() {
            return Err(invalid("field_name must not be empty".to_string()));
        }
        if self.start_label == 0 {
            return Err(invalid("start_label must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn invalid(reason: String) -> Error {
    Error::InvalidConfig { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tiling, Tiling::TileSize { x: 500, y: 500 });
        assert_eq!(config.min_region_size, 0);
        assert_eq!(config.field_name, "DN");
        assert!(config.cleanup);
        assert!(config.stitch);
        assert_eq!(config.start_label, 1);
    }

    #[test]
    fn test_zero_start_label_rejected() {
        let config = Config {
            start_label: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("start_label"));
    }

    #[test]
    fn test_from_yaml_vector_options() {
        let yaml = "output_mode: vector\nstitch: false\nstart_label: 100\n";
        let config = Config::from_yaml_str(yaml).unwrap();
        assert!(!config.stitch);
        assert_eq!(config.start_label, 100);
    }

    #[test]
    fn test_zero_tile_size_rejected() {
        let config = Config {
            tiling: Tiling::TileSize { x: 0, y: 10 },
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tiling must be positive"));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let config = Config {
            range_threshold: -1.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tile_count_derives_size() {
        let tiling = Tiling::TileCount { x: 3, y: 2 };
        assert_eq!(tiling.tile_size(10, 7), (4, 4));
        assert_eq!(tiling.tile_size(2, 1), (1, 1));
    }

    #[test]
    fn test_from_yaml_partial_uses_defaults() {
        let yaml = r#"
tiling:
  tile_size:
    x: 256
    y: 128
min_region_size: 20
connectivity: eight
output_mode: vector
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.tiling, Tiling::TileSize { x: 256, y: 128 });
        assert_eq!(config.min_region_size, 20);
        assert_eq!(config.connectivity, Connectivity::Eight);
        assert_eq!(config.output_mode, OutputMode::Vector);
        assert_eq!(config.layer_name, "layer");
        assert_eq!(config.scan_order, ScanOrder::RowMajor);
    }

    #[test]
    fn test_from_yaml_rejects_invalid_values() {
        let yaml = "tiling:\n  tile_count:\n    x: 0\n    y: 2\n";
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_from_yaml_reports_parse_errors() {
        let err = Config::from_yaml_str("connectivity: sixteen").unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }
}
