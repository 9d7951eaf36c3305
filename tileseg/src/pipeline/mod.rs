//! Tiled segmentation pipeline.
//!
//! # Passes
//!
//! 1. **Segment & offset** - segment every tile, shift its labels to a private range
//! 2. **Resolve** - union labels seen by two tiles on their shared overlap pixels
//! 3. **Relabel** - strip overlap margins, apply canonical labels, count region sizes
//! 4. **Prune** - drop small regions, renumber survivors densely
//! 5. **Output** - a mosaic over the final tiles, or polygonized features with
//!    border-split fragments fused back together unless stitching is disabled
//!
//! Passes run strictly in sequence; an error stops the run and leaves the artifacts
//! written so far in the store.

mod result;


pub use result::{PipelineOutput, PipelineReport};

use std::sync::Arc;
use std::time::Instant;

use crate::config::{Config, OutputMode};
use crate::error::Error;
use crate::grid::TileGrid;
use crate::mosaic::MosaicRaster;
use crate::offset::{segment_tiles, SegmentInputs};
use crate::progress::{Progress, ProgressCallback};
use crate::prune::prune_tiles;
use crate::raster::RasterSource;
use crate::relabel::relabel_tiles;
use crate::resolve::resolve_labels;
use crate::segmenter::{ConnectedComponentSegmenter, TileSegmenter};
use crate::store::{DiskTileStore, MemoryTileStore, TileStore};
use crate::vector::{fuse_border_features, polygonize_tiles, MemoryLayer, Polygonizer, RunPolygonizer};

/// Runs the tiled segmentation passes over a raster.
pub struct Pipeline {
    config: Config,
    segmenter: Arc<dyn TileSegmenter>,
    polygonizer: Arc<dyn Polygonizer>,
    progress: ProgressCallback,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Pipeline with the connected-component segmenter configured from `config`.
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let segmenter = ConnectedComponentSegmenter::from_config(&config);
        Ok(Self {
            config,
            segmenter: Arc::new(segmenter),
            polygonizer: Arc::new(RunPolygonizer),
            progress: None,
        })
    }

    pub fn with_segmenter(mut self, segmenter: impl TileSegmenter + 'static) -> Self {
        self.segmenter = Arc::new(segmenter);
        self
    }

    pub fn with_polygonizer(mut self, polygonizer: impl Polygonizer + 'static) -> Self {
        self.polygonizer = Arc::new(polygonizer);
        self
    }

    pub fn with_progress(mut self, callback: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self, source: &dyn RasterSource) -> Result<(PipelineOutput, PipelineReport), Error> {
        self.run_with_aux(source, None)
    }

    /// Run with an auxiliary per-pixel image passed to the segmenter alongside each tile.
    pub fn run_with_aux(
        &self,
        source: &dyn RasterSource,
        aux: Option<&dyn RasterSource>,
    ) -> Result<(PipelineOutput, PipelineReport), Error> {
        let inputs = SegmentInputs {
            aux,
            ..SegmentInputs::new(source)
        };
        self.run_with_inputs(inputs)
    }

    /// Run over `inputs`; with a mask only pixels whose mask value is above 0 are segmented.
    pub fn run_with_inputs(
        &self,
        inputs: SegmentInputs<'_>,
    ) -> Result<(PipelineOutput, PipelineReport), Error> {
        let start = Instant::now();
        let config = &self.config;
        let source = inputs.source;

        let (width, height) = (source.width(), source.height());
        if width == 0 || height == 0 {
            return Err(Error::EmptyInput { width, height });
        }
        if let Some(aux) = inputs.aux {
            if aux.width() != width || aux.height() != height {
                return Err(Error::AuxSizeMismatch {
                    width,
                    height,
                    aux_width: aux.width(),
                    aux_height: aux.height(),
                });
            }
        }
        if let Some(mask) = inputs.mask {
            if mask.width() != width || mask.height() != height {
                return Err(Error::MaskSizeMismatch {
                    width,
                    height,
                    mask_width: mask.width(),
                    mask_height: mask.height(),
                });
            }
        }

        let (tile_width, tile_height) = config.tiling.tile_size(width, height);
        let grid = TileGrid::new(width, height, tile_width, tile_height);
        let store = self.open_store()?;
        let max_concurrent = config.max_concurrent_tiles;

        tracing::info!(
            width,
            height,
            tile_width,
            tile_height,
            bands = source.band_count(),
            masked = inputs.mask.is_some(),
            "Starting tiled segmentation"
        );

        let labels = segment_tiles(
            &inputs,
            self.segmenter.as_ref(),
            &grid,
            store.as_ref(),
            max_concurrent,
            &self.progress,
        )?;

        let lut = resolve_labels(
            &grid,
            store.as_ref(),
            &labels,
            config.scan_order,
            config.connectivity,
            &self.progress,
        )?;

        let histogram = relabel_tiles(
            &grid,
            store.as_ref(),
            &labels,
            &lut,
            max_concurrent,
            &self.progress,
        )?;
        drop(lut);
        let resolved_count = histogram.iter().filter(|&&c| c > 0).count() as u32;

        let summary = prune_tiles(
            &grid,
            store.as_ref(),
            histogram,
            config.min_region_size,
            max_concurrent,
            &self.progress,
        )?;

        let mut report = PipelineReport {
            tile_count: grid.tile_count(),
            region_count: labels.region_count,
            resolved_count,
            ..PipelineReport::default()
        }
        .with_prune(summary);

        let output = match config.output_mode {
            OutputMode::Raster => {
                let mosaic = MosaicRaster::new(
                    store.clone(),
                    grid,
                    source.geo_info(),
                    summary.final_count,
                )
                .with_cleanup_on_drop(config.cleanup);
                PipelineOutput::Raster(mosaic)
            }
            OutputMode::Vector => {
                let mut layer = MemoryLayer::new(&config.layer_name, &config.field_name)
                    .with_first_id(config.start_label);
                polygonize_tiles(
                    &grid,
                    store.as_ref(),
                    self.polygonizer.as_ref(),
                    &mut layer,
                    max_concurrent,
                    &self.progress,
                )?;
                if config.stitch {
                    report.fusion = Some(fuse_border_features(
                        &mut layer,
                        &grid,
                        config.connectivity,
                        &self.progress,
                    ));
                } else {
                    tracing::info!("Stitching disabled, keeping per-tile features");
                }
                if config.cleanup {
                    store.cleanup()?;
                }
                PipelineOutput::Vector(layer)
            }
        };

        let report = report.with_elapsed(start.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(
            final_count = report.final_count,
            pruned = report.pruned,
            "Segmentation finished in {:.1} ms",
            report.elapsed_ms
        );

        Ok((output, report))
    }

    fn open_store(&self) -> Result<Arc<dyn TileStore>, Error> {
        Ok(match &self.config.temp_dir {
            Some(dir) => Arc::new(DiskTileStore::open(dir)?),
            None => Arc::new(MemoryTileStore::new()),
        })
    }
}
