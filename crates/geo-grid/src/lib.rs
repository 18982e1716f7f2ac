//! Coordinate & Grid Utilities
//!
//! Leaf crate shared by every overlay component:
//! - Maidenhead locator decoding (field / square / subsquare)
//! - Map-center parsing (decimal, DMS, or locator, with fallback)
//! - Equirectangular pixel <-> geo mapping
//! - Great-circle / haversine distance

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),
    #[error("Coordinate out of range: lat={lat} lon={lon}")]
    OutOfRange { lat: f64, lon: f64 },
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// A point on the globe in degrees. lat in [-90, 90], lon in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Build a point, rejecting out-of-range coordinates.
    pub fn checked(lat: f64, lon: f64) -> Result<Self> {
        if !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(ParseError::OutOfRange { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Fold a longitude into [-180, 180].
pub fn normalize_lon(mut lon: f64) -> f64 {
    while lon > 180.0 {
        lon -= 360.0;
    }
    while lon < -180.0 {
        lon += 360.0;
    }
    lon
}

/// Decode a 2/4/6-character Maidenhead locator to its cell center.
///
/// Case-insensitive. Each additional pair recenters within the parent cell:
/// field (20x10 deg), square (2x1 deg), subsquare (5'x2.5').
/// Returns None for malformed input.
pub fn locator_to_lat_lon(code: &str) -> Option<GeoPoint> {
    let s = code.trim().to_ascii_uppercase();
    let bytes = s.as_bytes();
    if !matches!(bytes.len(), 2 | 4 | 6) {
        return None;
    }

    // Field pair: letters A-R
    let f0 = (bytes[0] as i32) - ('A' as i32);
    let f1 = (bytes[1] as i32) - ('A' as i32);
    if !(0..=17).contains(&f0) || !(0..=17).contains(&f1) {
        return None;
    }
    let mut lon = -180.0 + f0 as f64 * 20.0 + 10.0;
    let mut lat = -90.0 + f1 as f64 * 10.0 + 5.0;

    if bytes.len() >= 4 {
        // Square pair: digits
        let d0 = (bytes[2] as i32) - ('0' as i32);
        let d1 = (bytes[3] as i32) - ('0' as i32);
        if !(0..=9).contains(&d0) || !(0..=9).contains(&d1) {
            return None;
        }
        lon = -180.0 + f0 as f64 * 20.0 + d0 as f64 * 2.0 + 1.0;
        lat = -90.0 + f1 as f64 * 10.0 + d1 as f64 + 0.5;

        if bytes.len() == 6 {
            // Subsquare pair: letters A-X
            let s0 = (bytes[4] as i32) - ('A' as i32);
            let s1 = (bytes[5] as i32) - ('A' as i32);
            if !(0..=23).contains(&s0) || !(0..=23).contains(&s1) {
                return None;
            }
            lon = -180.0 + f0 as f64 * 20.0 + d0 as f64 * 2.0 + (s0 as f64 + 0.5) * (2.0 / 24.0);
            lat = -90.0 + f1 as f64 * 10.0 + d1 as f64 + (s1 as f64 + 0.5) * (1.0 / 24.0);
        }
    }

    Some(GeoPoint { lat, lon })
}

/// Parse a map-center string: decimal "lat,lon", then DMS, then locator.
/// Falls back to `fallback` on parse failure or out-of-range values.
pub fn parse_center(text: &str, fallback: GeoPoint) -> GeoPoint {
    parse_center_strict(text).unwrap_or(fallback)
}

/// Strict variant of [`parse_center`] used where the caller wants the error.
pub fn parse_center_strict(text: &str) -> Result<GeoPoint> {
    let s = text.trim();
    if s.is_empty() {
        return Err(ParseError::InvalidCoordinate(String::new()));
    }
    if let Some(p) = parse_decimal_pair(s) {
        return GeoPoint::checked(p.0, p.1);
    }
    if let Some(p) = parse_dms_pair(s) {
        return GeoPoint::checked(p.0, p.1);
    }
    locator_to_lat_lon(s).ok_or_else(|| ParseError::InvalidCoordinate(s.to_string()))
}

fn parse_decimal_pair(s: &str) -> Option<(f64, f64)> {
    let (a, b) = s.split_once(',')?;
    let lat: f64 = a.trim().parse().ok()?;
    let lon: f64 = b.trim().parse().ok()?;
    Some((lat, lon))
}

/// One DMS component: DD°MM'SS.S"H where H is one of NSEW.
/// Sign comes from the hemisphere letter only.
fn parse_dms_component(s: &str) -> Option<(f64, char)> {
    let s = s.trim();
    let hemi = s.chars().last()?.to_ascii_uppercase();
    if !matches!(hemi, 'N' | 'S' | 'E' | 'W') {
        return None;
    }
    let body = &s[..s.len() - 1];
    let (deg_str, rest) = body.split_once(['°', 'º'])?;
    let (min_str, rest) = rest.split_once('\'')?;
    let sec_str = rest.strip_suffix('"').unwrap_or(rest);

    let deg: f64 = deg_str.trim().parse().ok()?;
    let min: f64 = min_str.trim().parse().ok()?;
    let sec: f64 = if sec_str.trim().is_empty() {
        0.0
    } else {
        sec_str.trim().parse().ok()?
    };
    if deg < 0.0 || !(0.0..60.0).contains(&min) || !(0.0..60.0).contains(&sec) {
        return None;
    }
    let mut value = deg + min / 60.0 + sec / 3600.0;
    if matches!(hemi, 'S' | 'W') {
        value = -value;
    }
    Some((value, hemi))
}

fn parse_dms_pair(s: &str) -> Option<(f64, f64)> {
    let (first, second) = match s.split_once(',') {
        Some((a, b)) => (a.trim(), b.trim()),
        None => {
            // Whitespace-separated: split after the first hemisphere letter
            let idx = s.find(['N', 'S', 'n', 's'])?;
            let (a, b) = s.split_at(idx + 1);
            (a.trim(), b.trim())
        }
    };
    let (lat, lat_hemi) = parse_dms_component(first)?;
    let (lon, lon_hemi) = parse_dms_component(second)?;
    if !matches!(lat_hemi, 'N' | 'S') || !matches!(lon_hemi, 'E' | 'W') {
        return None;
    }
    Some((lat, lon))
}

/// Equirectangular pixel -> geo. Longitude spans width linearly from -180 to
/// +180; latitude spans height from +90 (top) to -90 (bottom).
pub fn pixel_to_geo(x: f64, y: f64, width: u32, height: u32) -> GeoPoint {
    GeoPoint {
        lon: -180.0 + (x / width as f64) * 360.0,
        lat: 90.0 - (y / height as f64) * 180.0,
    }
}

/// Equirectangular geo -> pixel (inverse of [`pixel_to_geo`]).
pub fn geo_to_pixel(p: GeoPoint, width: u32, height: u32) -> (f64, f64) {
    (
        (p.lon + 180.0) / 360.0 * width as f64,
        (90.0 - p.lat) / 180.0 * height as f64,
    )
}

/// Central angle between two points in degrees (haversine form).
pub fn great_circle_deg(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let dphi = (b.lat - a.lat).to_radians();
    let dlam = (b.lon - a.lon).to_radians();
    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlam / 2.0).sin().powi(2);
    (2.0 * h.sqrt().asin()).to_degrees()
}

/// Great-circle distance in km.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    great_circle_deg(a, b).to_radians() * EARTH_RADIUS_KM
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn locator_field_center() {
        // JJ is the field containing (5, 10) -> center (5, 10)
        let p = locator_to_lat_lon("JJ").unwrap();
        assert!((p.lon - 10.0).abs() < 1e-9);
        assert!((p.lat - 5.0).abs() < 1e-9);
    }

    #[test]
    fn locator_square_and_subsquare() {
        // FN31pr is near Newington, CT (ARRL HQ)
        let p = locator_to_lat_lon("FN31pr").unwrap();
        assert!((p.lat - 41.72917).abs() < 0.01, "lat {}", p.lat);
        assert!((p.lon - -72.70833).abs() < 0.01, "lon {}", p.lon);

        // 4-char decode stays inside the field cell
        let sq = locator_to_lat_lon("FN31").unwrap();
        assert!(sq.lat >= 41.0 && sq.lat < 42.0);
        assert!(sq.lon >= -74.0 && sq.lon < -72.0);
    }

    #[test]
    fn locator_case_insensitive() {
        assert_eq!(locator_to_lat_lon("fn31pr"), locator_to_lat_lon("FN31PR"));
    }

    #[test]
    fn locator_rejects_malformed() {
        assert_eq!(locator_to_lat_lon(""), None);
        assert_eq!(locator_to_lat_lon("F"), None);
        assert_eq!(locator_to_lat_lon("FN3"), None);
        assert_eq!(locator_to_lat_lon("ZZ"), None); // field letters beyond R
        assert_eq!(locator_to_lat_lon("FNAB"), None); // digits expected
        assert_eq!(locator_to_lat_lon("FN31zz"), None); // subsquare beyond X
        assert_eq!(locator_to_lat_lon("FN31pr9"), None); // odd length
    }

    #[test]
    fn locator_decodes_inside_nominal_cell() {
        // Every valid locator center lies inside the cell the prefix names.
        for (code, lon_lo, lon_hi, lat_lo, lat_hi) in [
            ("AA", -180.0, -160.0, -90.0, -80.0),
            ("RR", 160.0, 180.0, 80.0, 90.0),
            ("JN58", 10.0, 12.0, 48.0, 49.0),
            ("JN58td", 11.0, 12.0, 48.0, 48.2),
        ] {
            let p = locator_to_lat_lon(code).unwrap();
            assert!(p.lon > lon_lo && p.lon < lon_hi, "{code} lon {}", p.lon);
            assert!(p.lat > lat_lo && p.lat < lat_hi, "{code} lat {}", p.lat);
        }
    }

    #[test]
    fn parse_center_decimal_first() {
        let fb = GeoPoint::new(20.0, 0.0);
        let p = parse_center("41.7, -72.7", fb);
        assert!((p.lat - 41.7).abs() < 1e-9);
        assert!((p.lon - -72.7).abs() < 1e-9);
    }

    #[test]
    fn parse_center_dms() {
        let fb = GeoPoint::new(20.0, 0.0);
        let p = parse_center("48°51'24.0\"N 2°21'03.0\"E", fb);
        assert!((p.lat - 48.85667).abs() < 0.001, "lat {}", p.lat);
        assert!((p.lon - 2.35083).abs() < 0.001, "lon {}", p.lon);

        let q = parse_center("33°52'S, 151°12'37\"E", fb);
        assert!((q.lat - -33.8667).abs() < 0.001, "lat {}", q.lat);
        assert!((q.lon - 151.2103).abs() < 0.001, "lon {}", q.lon);
    }

    #[test]
    fn parse_center_locator_and_fallback() {
        let fb = GeoPoint::new(20.0, 0.0);
        let p = parse_center("FN31", fb);
        assert!(p.lat > 41.0 && p.lat < 42.0);

        assert_eq!(parse_center("", fb), fb);
        assert_eq!(parse_center("not a place", fb), fb);
        // Out-of-range decimal falls back
        assert_eq!(parse_center("95.0, 10.0", fb), fb);
        assert_eq!(parse_center("10.0, 200.0", fb), fb);
    }

    #[test]
    fn normalize_lon_folds() {
        assert_eq!(normalize_lon(190.0), -170.0);
        assert_eq!(normalize_lon(-190.0), 170.0);
        assert_eq!(normalize_lon(360.0), 0.0);
        assert_eq!(normalize_lon(45.0), 45.0);
    }

    #[test]
    fn pixel_geo_corners() {
        let nw = pixel_to_geo(0.0, 0.0, 720, 362);
        assert!((nw.lon - -180.0).abs() < 1e-9);
        assert!((nw.lat - 90.0).abs() < 1e-9);

        let mid = pixel_to_geo(360.0, 181.0, 720, 362);
        assert!(mid.lon.abs() < 1e-9);
        assert!(mid.lat.abs() < 0.5);
    }

    #[test]
    fn great_circle_quarter_turn() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 90.0);
        assert!((great_circle_deg(a, b) - 90.0).abs() < 1e-6);
        assert!((great_circle_deg(a, a)).abs() < 1e-9);
    }

    #[test]
    fn haversine_known_pair() {
        // London -> Paris is ~344 km
        let lon = GeoPoint::new(51.5074, -0.1278);
        let par = GeoPoint::new(48.8566, 2.3522);
        let d = haversine_km(lon, par);
        assert!((d - 344.0).abs() < 10.0, "got {d}");
    }

    proptest! {
        #[test]
        fn pixel_geo_round_trip(lat in -89.5f64..89.5, lon in -179.5f64..179.5) {
            let (w, h) = (720u32, 362u32);
            let p = GeoPoint::new(lat, lon);
            let (x, y) = geo_to_pixel(p, w, h);
            let back = pixel_to_geo(x, y, w, h);
            // Within one pixel's angular resolution
            prop_assert!((back.lat - lat).abs() < 180.0 / h as f64);
            prop_assert!((back.lon - lon).abs() < 360.0 / w as f64);
        }

        #[test]
        fn locator_never_panics(s in "\\PC{0,8}") {
            let _ = locator_to_lat_lon(&s);
        }
    }
}
