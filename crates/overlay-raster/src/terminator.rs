//! Day/night terminator band rendering.

use crate::{RgbaRaster, CANONICAL_HEIGHT, CANONICAL_WIDTH};
use ephemeris::subsolar_point;
use geo_grid::{great_circle_deg, pixel_to_geo};

/// Night side color; only alpha varies across the band.
const NIGHT_RGB: [u8; 3] = [9, 14, 42];
/// Alpha on the full-night side of the twilight band.
const NIGHT_ALPHA: u8 = 150;
/// Default half-width of the twilight band in degrees.
pub const DEFAULT_TWILIGHT_DEG: f64 = 8.0;

/// Render the terminator as an RGBA raster over the canonical grid.
///
/// Per pixel: the great-circle angle to the sub-solar point decides the
/// alpha. Below `90 - twilight` the pixel is day (transparent); above
/// `90 + twilight` it is full night; across the band the alpha ramps
/// linearly. Returns None when the timestamp is unusable.
pub fn render_terminator(timestamp_ms: f64, twilight_deg: f64) -> Option<RgbaRaster> {
    let sun = subsolar_point(timestamp_ms)?;
    let mut out = RgbaRaster::new(CANONICAL_WIDTH, CANONICAL_HEIGHT);
    for y in 0..CANONICAL_HEIGHT {
        for x in 0..CANONICAL_WIDTH {
            let p = pixel_to_geo(x as f64 + 0.5, y as f64 + 0.5, CANONICAL_WIDTH, CANONICAL_HEIGHT);
            let angle = great_circle_deg(p, sun);
            let alpha = terminator_alpha(angle, twilight_deg);
            if alpha > 0 {
                out.put(x, y, [NIGHT_RGB[0], NIGHT_RGB[1], NIGHT_RGB[2], alpha]);
            }
        }
    }
    Some(out)
}

/// Alpha for a given sun angle: 0 in day, linear across the twilight band,
/// full night alpha beyond it.
pub fn terminator_alpha(sun_angle_deg: f64, twilight_deg: f64) -> u8 {
    let start = 90.0 - twilight_deg;
    let end = 90.0 + twilight_deg;
    if sun_angle_deg < start {
        0
    } else if sun_angle_deg >= end {
        NIGHT_ALPHA
    } else {
        let f = (sun_angle_deg - start) / (end - start);
        (NIGHT_ALPHA as f64 * f).round() as u8
    }
}
