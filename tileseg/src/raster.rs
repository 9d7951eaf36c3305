//! Input raster access: planar pixel tiles and the source they are read from.

use common::Buffer2;

use crate::error::Error;
use crate::grid::PixelRect;

/// Georeferencing carried from the input to the output untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoInfo {
    /// Affine transform `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
    pub transform: [f64; 6],
    /// Projection definition (WKT or similar); empty when unknown.
    pub projection: String,
}

/// Multi-band pixel buffer, one plane per band.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelTile {
    bands: Vec<Buffer2<f32>>,
}

impl PixelTile {
    pub fn new(bands: Vec<Buffer2<f32>>) -> Self {
        assert!(!bands.is_empty(), "pixel tile needs at least one band");
        let (width, height) = (bands[0].width(), bands[0].height());
        assert!(
            bands
                .iter()
                .all(|b| b.width() == width && b.height() == height),
            "all bands must share dimensions"
        );
        Self { bands }
    }

    pub fn from_single_band(band: Buffer2<f32>) -> Self {
        Self::new(vec![band])
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.bands[0].width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.bands[0].height()
    }

    #[inline]
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    #[inline]
    pub fn band(&self, band: usize) -> &Buffer2<f32> {
        &self.bands[band]
    }

    #[inline]
    pub fn bands(&self) -> &[Buffer2<f32>] {
        &self.bands
    }

    /// Value of every band at linear index `idx`.
    #[inline]
    pub fn pixel(&self, idx: usize) -> impl Iterator<Item = f32> + '_ {
        self.bands.iter().map(move |b| b[idx])
    }

    pub fn crop(&self, rect: PixelRect) -> Self {
        Self {
            bands: self
                .bands
                .iter()
                .map(|b| b.crop(rect.x, rect.y, rect.width, rect.height))
                .collect(),
        }
    }
}

/// A raster that can be read one rectangular region at a time.
pub trait RasterSource: Send + Sync {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn band_count(&self) -> usize;

    fn geo_info(&self) -> GeoInfo {
        GeoInfo::default()
    }

    fn read_region(&self, rect: PixelRect) -> Result<PixelTile, Error>;
}

/// Raster held entirely in memory.
#[derive(Debug, Clone)]
pub struct InMemoryRaster {
    pixels: PixelTile,
    geo: GeoInfo,
}

impl InMemoryRaster {
    pub fn new(pixels: PixelTile) -> Self {
        Self {
            pixels,
            geo: GeoInfo::default(),
        }
    }

    pub fn from_single_band(band: Buffer2<f32>) -> Self {
        Self::new(PixelTile::from_single_band(band))
    }

    pub fn with_geo_info(mut self, geo: GeoInfo) -> Self {
        self.geo = geo;
        self
    }

    pub fn pixels(&self) -> &PixelTile {
        &self.pixels
    }
}

impl RasterSource for InMemoryRaster {
    fn width(&self) -> usize {
        self.pixels.width()
    }

    fn height(&self) -> usize {
        self.pixels.height()
    }

    fn band_count(&self) -> usize {
        self.pixels.band_count()
    }

    fn geo_info(&self) -> GeoInfo {
        self.geo.clone()
    }

    fn read_region(&self, rect: PixelRect) -> Result<PixelTile, Error> {
        if rect.right() > self.width() || rect.bottom() > self.height() {
            return Err(Error::ReadRegion {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                reason: format!(
                    "region exceeds raster bounds {}x{}",
                    self.width(),
                    self.height()
                ),
            });
        }
        Ok(self.pixels.crop(rect))
    }
}
