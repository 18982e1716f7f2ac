//! Raster Compositor
//!
//! Pure raster generation for the map overlay engine:
//! - `field`: dense equirectangular scalar fields and IDW interpolation
//! - `ramp`: per-overlay value ranges and piecewise-linear color ramps
//! - `terminator`: day/night band rendering with twilight falloff
//! - `hull`: convex hull and Chaikin corner-cutting for coverage blobs
//!
//! Nothing in this crate touches a map surface or the network; every
//! function is deterministic given its inputs. Rasters are single-width;
//! the three-tile horizontal wrap is a placement policy owned by the
//! overlay engine.

pub mod field;
pub mod hull;
pub mod ramp;
pub mod terminator;

pub use field::{idw_at, idw_interpolate, GridSample, ScalarField, CANONICAL_HEIGHT, CANONICAL_WIDTH};
pub use hull::{chaikin_smooth, convex_hull, Blob};
pub use ramp::{ColorRamp, ValueRange};
pub use terminator::{render_terminator, DEFAULT_TWILIGHT_DEG};

use serde::{Deserialize, Serialize};

/// An RGBA8 bitmap in row-major order, top row first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RgbaRaster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaRaster {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width * height * 4) as usize],
        }
    }

    pub fn put(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = ((y * self.width + x) * 4) as usize;
        self.pixels[i..i + 4].copy_from_slice(&rgba);
    }

    pub fn get(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }
}

/// Convert an interpolated field into a transparent RGBA bitmap.
///
/// Alpha is zero wherever the value falls outside `range`, otherwise the
/// base alpha scaled by `opacity` (0.0 to 1.0).
pub fn raster_to_rgba(field: &ScalarField, range: ValueRange, ramp: &ColorRamp, opacity: f64) -> RgbaRaster {
    const BASE_ALPHA: f64 = 200.0;
    let alpha = (BASE_ALPHA * opacity.clamp(0.0, 1.0)).round() as u8;
    let mut out = RgbaRaster::new(field.width, field.height);
    for y in 0..field.height {
        for x in 0..field.width {
            let v = field.get(x, y);
            if let Some(t) = range.normalize(v) {
                let [r, g, b] = ramp.eval(t);
                out.put(x, y, [r, g, b, alpha]);
            }
        }
    }
    out
}
