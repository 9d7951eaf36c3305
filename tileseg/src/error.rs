//! Error types for the tiled segmentation pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::store::TileKey;

/// Errors that abort a segmentation run.
///
/// Every variant is fatal: each pass depends on every artifact of the previous
/// pass being present and complete, so there is no partial-result mode.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Failed to parse configuration: {source}")]
    ConfigParse {
        #[source]
        source: serde_yml::Error,
    },

    #[error("Failed to read configuration file '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Input raster is empty ({width}x{height})")]
    EmptyInput { width: usize, height: usize },

    #[error("Auxiliary raster is {aux_width}x{aux_height}, input is {width}x{height}")]
    AuxSizeMismatch {
        width: usize,
        height: usize,
        aux_width: usize,
        aux_height: usize,
    },

    #[error("Mask raster is {mask_width}x{mask_height}, input is {width}x{height}")]
    MaskSizeMismatch {
        width: usize,
        height: usize,
        mask_width: usize,
        mask_height: usize,
    },

    #[error("Failed to read region {width}x{height}+{x}+{y} from raster: {reason}")]
    ReadRegion {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        reason: String,
    },

    #[error("Failed to create temporary directory '{path}': {source}")]
    CreateTempDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write tile artifact '{path}': {source}")]
    WriteArtifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read tile artifact '{path}': {source}")]
    ReadArtifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove tile artifact '{path}': {source}")]
    RemoveArtifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Tile artifact {key} does not exist")]
    MissingArtifact { key: TileKey },

    #[error("Tile artifact '{path}' is corrupt: {reason}")]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error(
        "Tile ({row}, {col}) has size {actual_width}x{actual_height}, expected {expected_width}x{expected_height}"
    )]
    TileSizeMismatch {
        row: usize,
        col: usize,
        expected_width: usize,
        expected_height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("Tile ({row}, {col}) holds label {label} outside its range [{first}, {last}]")]
    LabelOutOfRange {
        row: usize,
        col: usize,
        label: u32,
        first: u32,
        last: u32,
    },

    #[error("Label count overflows u32 at tile ({row}, {col}): {offset} + {local_max}")]
    LabelOverflow {
        row: usize,
        col: usize,
        offset: u64,
        local_max: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Stage;

    #[test]
    fn test_invalid_config_message() {
        let err = Error::InvalidConfig {
            reason: "tile size must be positive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration: tile size must be positive"
        );
    }

    #[test]
    fn test_write_artifact_message_has_path_and_cause() {
        let err = Error::WriteArtifact {
            path: PathBuf::from("/tmp/tiles/tile_0_1_SEG.bin"),
            source: io::Error::other("disk full"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/tiles/tile_0_1_SEG.bin"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_missing_artifact_names_key() {
        let err = Error::MissingArtifact {
            key: TileKey::new(2, 3, Stage::Relabeled),
        };
        assert_eq!(
            err.to_string(),
            "Tile artifact (2, 3, RELAB) does not exist"
        );
    }

    #[test]
    fn test_label_out_of_range_message() {
        let err = Error::LabelOutOfRange {
            row: 1,
            col: 0,
            label: 99,
            first: 10,
            last: 20,
        };
        assert_eq!(
            err.to_string(),
            "Tile (1, 0) holds label 99 outside its range [10, 20]"
        );
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error as StdError;

        let err = Error::ReadArtifact {
            path: PathBuf::from("/test"),
            source: io::Error::new(io::ErrorKind::NotFound, "underlying error"),
        };
        assert!(err.source().is_some());
    }
}
