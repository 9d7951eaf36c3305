//! Connected components under a spectral (and optional spatial) distance criterion.
//!
//! Two neighboring pixels join the same region when the euclidean distance between
//! their band values is below `range_threshold` and, if an auxiliary position image
//! is given, the distance between their positions is below `spatial_threshold`.

use common::Buffer2;

use super::TileSegmenter;
use crate::config::{Config, Connectivity};
use crate::raster::PixelTile;
use crate::union_find::LabelUnionFind;

/// Already-visited neighbors in raster order, as `(dx, dy)`.
const BACKWARD_FOUR: [(isize, isize); 2] = [(-1, 0), (0, -1)];
const BACKWARD_EIGHT: [(isize, isize); 4] = [(-1, 0), (-1, -1), (0, -1), (1, -1)];

/// Raster-scan connected component labeling with union-find.
///
/// # Panics
///
/// Segmenting panics if an auxiliary tile or a mask is given whose dimensions
/// differ from the pixel tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectedComponentSegmenter {
    pub range_threshold: f32,
    pub spatial_threshold: f32,
    /// Pixels equal to this value in every band are background.
    pub no_data: Option<f32>,
    pub connectivity: Connectivity,
}

impl ConnectedComponentSegmenter {
    pub fn new(range_threshold: f32, connectivity: Connectivity) -> Self {
        Self {
            range_threshold,
            spatial_threshold: f32::INFINITY,
            no_data: None,
            connectivity,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            range_threshold: config.range_threshold,
            spatial_threshold: config.spatial_threshold,
            no_data: config.no_data,
            connectivity: config.connectivity,
        }
    }

    pub fn with_no_data(mut self, no_data: f32) -> Self {
        self.no_data = Some(no_data);
        self
    }

    #[inline]
    fn is_background(&self, pixels: &PixelTile, mask: Option<&Buffer2<bool>>, idx: usize) -> bool {
        if mask.is_some_and(|mask| !mask[idx]) {
            return true;
        }
        match self.no_data {
            Some(no_data) => pixels.pixel(idx).all(|v| v == no_data),
            None => false,
        }
    }

    #[inline]
    fn similar(&self, pixels: &PixelTile, aux: Option<&PixelTile>, a: usize, b: usize) -> bool {
        if distance(pixels, a, b) >= self.range_threshold {
            return false;
        }
        match aux {
            Some(aux) => distance(aux, a, b) < self.spatial_threshold,
            None => true,
        }
    }

    fn backward_neighbors(&self) -> &'static [(isize, isize)] {
        match self.connectivity {
            Connectivity::Four => &BACKWARD_FOUR,
            Connectivity::Eight => &BACKWARD_EIGHT,
        }
    }

    fn label(
        &self,
        pixels: &PixelTile,
        aux: Option<&PixelTile>,
        mask: Option<&Buffer2<bool>>,
    ) -> Buffer2<u32> {
        let width = pixels.width();
        let height = pixels.height();
        if let Some(aux) = aux {
            assert!(
                aux.width() == width && aux.height() == height,
                "auxiliary image {}x{} does not match tile {}x{}",
                aux.width(),
                aux.height(),
                width,
                height
            );
        }
        if let Some(mask) = mask {
            assert!(
                mask.width() == width && mask.height() == height,
                "mask {}x{} does not match tile {}x{}",
                mask.width(),
                mask.height(),
                width,
                height
            );
        }

        let mut labels = Buffer2::new_filled(width, height, 0u32);
        let mut uf = LabelUnionFind::new();

        for y in 0..height {
            for x in 0..width {
                let idx = y * width + x;
                if self.is_background(pixels, mask, idx) {
                    continue;
                }

                let mut assigned = 0u32;
                for &(dx, dy) in self.backward_neighbors() {
                    let (Some(nx), Some(ny)) = (x.checked_add_signed(dx), y.checked_add_signed(dy))
                    else {
                        continue;
                    };
                    if nx >= width {
                        continue;
                    }
                    let n = ny * width + nx;
                    let neighbor_label = labels[n];
                    if neighbor_label == 0 || !self.similar(pixels, aux, idx, n) {
                        continue;
                    }
                    assigned = if assigned == 0 {
                        neighbor_label
                    } else {
                        uf.union(assigned, neighbor_label)
                    };
                }

                labels[idx] = if assigned == 0 {
                    uf.make_set()
                } else {
                    assigned
                };
            }
        }

        let (lut, _) = uf.into_dense_lut();
        labels.map_in_place(|l| lut[l as usize]);
        labels
    }
}

impl TileSegmenter for ConnectedComponentSegmenter {
    fn segment(&self, pixels: &PixelTile, aux: Option<&PixelTile>) -> Buffer2<u32> {
        self.label(pixels, aux, None)
    }

    /// Masked-out pixels are background during labeling, so a mask cutting through
    /// a region splits it.
    fn segment_masked(
        &self,
        pixels: &PixelTile,
        aux: Option<&PixelTile>,
        mask: &Buffer2<bool>,
    ) -> Buffer2<u32> {
        self.label(pixels, aux, Some(mask))
    }
}

/// Euclidean distance over all bands between two pixels.
#[inline]
fn distance(pixels: &PixelTile, a: usize, b: usize) -> f32 {
    pixels
        .bands()
        .iter()
        .map(|band| {
            let d = band[a] - band[b];
            d * d
        })
        .sum::<f32>()
        .sqrt()
}
