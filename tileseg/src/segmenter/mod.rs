//! Per-tile segmentation primitive.
//!
//! The reconciliation passes only ever see label buffers; which pixel criterion
//! produced them is decided by the [`TileSegmenter`] implementation plugged in.

mod connected;

use common::Buffer2;

use crate::raster::PixelTile;

pub use connected::ConnectedComponentSegmenter;

/// Segments one tile into regions.
///
/// Contract:
/// - the returned buffer has the same dimensions as `pixels`
/// - 0 is background, regions are numbered `1..=n` with every label in that range used
/// - the result depends only on the pixel values, so a pixel shared by two
///   overlapping tiles is classified the same way in both
pub trait TileSegmenter: Send + Sync {
    /// `aux` carries optional per-pixel side information (e.g. spatial positions
    /// after mean-shift filtering) with the same dimensions as `pixels`.
    ///
    /// # Panics
    ///
    /// Implementations may panic when `aux` does not match the dimensions of
    /// `pixels`. [`Pipeline`](crate::Pipeline) rejects such inputs up front with
    /// [`Error::AuxSizeMismatch`](crate::Error::AuxSizeMismatch).
    fn segment(&self, pixels: &PixelTile, aux: Option<&PixelTile>) -> Buffer2<u32>;

    /// Segment only the pixels where `mask` is set; all others are background.
    ///
    /// The default segments the whole tile and clears masked-out pixels afterwards,
    /// so labels may be left unused. Implementations that can skip masked pixels
    /// while labeling should override it.
    fn segment_masked(
        &self,
        pixels: &PixelTile,
        aux: Option<&PixelTile>,
        mask: &Buffer2<bool>,
    ) -> Buffer2<u32> {
        let mut labels = self.segment(pixels, aux);
        for (label, &keep) in labels.iter_mut().zip(mask.iter()) {
            if !keep {
                *label = 0;
            }
        }
        labels
    }
}
