//! Scalar fields over an equirectangular grid, filled by inverse-distance
//! weighting from sparse samples.

use geo_grid::pixel_to_geo;
use serde::{Deserialize, Serialize};

/// Canonical overlay grid: 0.5 degrees per pixel, 360 x 180 degrees.
pub const CANONICAL_WIDTH: u32 = 720;
pub const CANONICAL_HEIGHT: u32 = 362;

/// Minimum planar distance in degrees; avoids singularities at sample
/// locations.
const DISTANCE_FLOOR_DEG: f64 = 0.5;

/// Fewer samples than this and interpolation is skipped for the cycle.
pub const MIN_SAMPLES: usize = 3;

/// One sparse measurement. Wire order is `[lon, lat, value]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSample {
    pub lon: f64,
    pub lat: f64,
    pub value: f64,
}

impl GridSample {
    pub fn new(lon: f64, lat: f64, value: f64) -> Self {
        Self { lon, lat, value }
    }

    /// Parse the `[lon, lat, value]` wire triple.
    pub fn from_triple(t: &[f64]) -> Option<Self> {
        match *t {
            [lon, lat, value] if lat.abs() <= 90.0 && lon.abs() <= 180.0 && value.is_finite() => {
                Some(Self { lon, lat, value })
            }
            _ => None,
        }
    }
}

/// A dense `height x width` array of interpolated values. Owned by exactly
/// one rasterization call and discarded after the image is produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    pub width: u32,
    pub height: u32,
    data: Vec<f64>,
}

impl ScalarField {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; (width * height) as usize],
        }
    }

    pub fn canonical() -> Self {
        Self::new(CANONICAL_WIDTH, CANONICAL_HEIGHT)
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f64 {
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: f64) {
        self.data[(y * self.width + x) as usize] = value;
    }
}

/// IDW value at a single geo point: sum(v_i / d_i^p) / sum(1 / d_i^p) with
/// planar lat/lon distance and a floor of half a degree.
pub fn idw_at(samples: &[GridSample], lat: f64, lon: f64, power: f64) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for s in samples {
        let d = ((s.lat - lat).powi(2) + (s.lon - lon).powi(2))
            .sqrt()
            .max(DISTANCE_FLOOR_DEG);
        let w = 1.0 / d.powf(power);
        num += s.value * w;
        den += w;
    }
    num / den
}

/// Interpolate sparse samples onto a dense grid.
///
/// Returns None when there are too few samples to produce a meaningful
/// field; the caller skips the overlay for this cycle. Deterministic given
/// a fixed sample order.
pub fn idw_interpolate(samples: &[GridSample], width: u32, height: u32, power: f64) -> Option<ScalarField> {
    if samples.len() < MIN_SAMPLES {
        return None;
    }
    let mut field = ScalarField::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let p = pixel_to_geo(x as f64 + 0.5, y as f64 + 0.5, width, height);
            field.set(x, y, idw_at(samples, p.lat, p.lon, power));
        }
    }
    Some(field)
}
