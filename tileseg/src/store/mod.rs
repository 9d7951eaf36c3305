//! Tile artifact storage.
//!
//! Each pass reads the artifacts of the previous pass and writes its own, keyed by
//! `(row, col, stage)`. Two backends exist:
//! - [`MemoryTileStore`]: lookup table in RAM, for images that fit in memory
//! - [`DiskTileStore`]: one file per artifact in a temporary directory

mod disk;
mod memory;

use std::fmt;

use common::Buffer2;

use crate::error::Error;
use crate::grid::TileIndex;

pub use disk::DiskTileStore;
pub use memory::MemoryTileStore;

/// Pass that produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Per-tile segmentation with offset labels, including the overlap margin.
    Segmented,
    /// Canonical labels, margin stripped.
    Relabeled,
    /// Pruned and densely renumbered labels.
    Final,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Segmented, Stage::Relabeled, Stage::Final];

    pub fn tag(self) -> &'static str {
        match self {
            Stage::Segmented => "SEG",
            Stage::Relabeled => "RELAB",
            Stage::Final => "FINAL",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.tag() == tag)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Address of one tile artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub row: usize,
    pub col: usize,
    pub stage: Stage,
}

impl TileKey {
    pub fn new(row: usize, col: usize, stage: Stage) -> Self {
        Self { row, col, stage }
    }

    pub fn for_tile(index: TileIndex, stage: Stage) -> Self {
        Self::new(index.row, index.col, stage)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.row, self.col, self.stage)
    }
}

/// Storage for label tiles passed between pipeline passes.
///
/// Implementations are shared across worker threads; every method takes `&self`.
pub trait TileStore: Send + Sync + fmt::Debug {
    /// Persist a tile. Returns once the artifact is complete.
    fn write(&self, key: TileKey, labels: &Buffer2<u32>) -> Result<(), Error>;

    fn read(&self, key: TileKey) -> Result<Buffer2<u32>, Error>;

    /// Read an artifact that must cover exactly `width` x `height` pixels.
    fn read_sized(
        &self,
        key: TileKey,
        width: usize,
        height: usize,
    ) -> Result<Buffer2<u32>, Error> {
        let labels = self.read(key)?;
        if labels.width() != width || labels.height() != height {
            return Err(Error::TileSizeMismatch {
                row: key.row,
                col: key.col,
                expected_width: width,
                expected_height: height,
                actual_width: labels.width(),
                actual_height: labels.height(),
            });
        }
        Ok(labels)
    }

    fn remove(&self, key: TileKey) -> Result<(), Error>;

    fn contains(&self, key: TileKey) -> bool;

    /// Keys of all artifacts currently held, sorted.
    fn keys(&self) -> Vec<TileKey>;

    /// Remove every artifact this store holds.
    fn cleanup(&self) -> Result<(), Error> {
        for key in self.keys() {
            self.remove(key)?;
        }
        Ok(())
    }
}
