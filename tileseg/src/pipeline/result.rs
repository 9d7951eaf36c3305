use crate::mosaic::MosaicRaster;
use crate::prune::PruneSummary;
use crate::vector::{FusionReport, MemoryLayer};

/// What a run produced, depending on the output mode.
#[derive(Debug)]
pub enum PipelineOutput {
    Raster(MosaicRaster),
    Vector(MemoryLayer),
}

impl PipelineOutput {
    pub fn as_raster(&self) -> Option<&MosaicRaster> {
        match self {
            PipelineOutput::Raster(mosaic) => Some(mosaic),
            PipelineOutput::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&MemoryLayer> {
        match self {
            PipelineOutput::Raster(_) => None,
            PipelineOutput::Vector(layer) => Some(layer),
        }
    }

    pub fn into_raster(self) -> Option<MosaicRaster> {
        match self {
            PipelineOutput::Raster(mosaic) => Some(mosaic),
            PipelineOutput::Vector(_) => None,
        }
    }

    pub fn into_vector(self) -> Option<MemoryLayer> {
        match self {
            PipelineOutput::Raster(_) => None,
            PipelineOutput::Vector(layer) => Some(layer),
        }
    }
}

/// Numbers collected while running the passes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineReport {
    pub tile_count: usize,
    /// Labels handed out by per-tile segmentation, before cross-tile resolution.
    pub region_count: u32,
    /// Regions spanning the image after resolution (histogram entries).
    pub resolved_count: u32,
    pub pruned: u32,
    pub final_count: u32,
    /// Present in vector mode when stitching is enabled.
    pub fusion: Option<FusionReport>,
    pub elapsed_ms: f64,
}

impl PipelineReport {
    pub(super) fn with_prune(mut self, summary: PruneSummary) -> Self {
        self.pruned = summary.pruned;
        self.final_count = summary.final_count;
        self
    }

    /// Set the elapsed time.
    pub(super) fn with_elapsed(mut self, ms: f64) -> Self {
        self.elapsed_ms = ms;
        self
    }
}
