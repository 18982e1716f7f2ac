//! Ephemeris Module
//!
//! Sub-solar and sub-lunar point computation from a millisecond timestamp.
//! Low-order approximations only: the output drives a visual terminator and
//! sun/moon markers, so the accuracy target is a few tenths of a degree,
//! not precision timekeeping.
//!
//! Both entry points are pure functions of time. A non-finite timestamp
//! yields `None`; callers skip rendering rather than draw undefined
//! geometry.

use geo_grid::{normalize_lon, GeoPoint};
use std::f64::consts::PI;

const MS_PER_DAY: f64 = 86_400_000.0;
const J2000_JD: f64 = 2_451_545.0;
/// Mean obliquity of the ecliptic at J2000, degrees.
const OBLIQUITY_J2000_DEG: f64 = 23.439_291;

/// Julian Date from Unix milliseconds.
pub fn julian_date(timestamp_ms: f64) -> f64 {
    timestamp_ms / MS_PER_DAY + 2_440_587.5
}

/// Greenwich Mean Sidereal Time in degrees, normalized to [0, 360).
pub fn gmst_deg(timestamp_ms: f64) -> f64 {
    let jd = julian_date(timestamp_ms);
    let t = (jd - J2000_JD) / 36_525.0;

    // GMST in seconds of time, IAU 1982 polynomial
    let gmst_sec = 67_310.548_41
        + (876_600.0 * 3600.0 + 8_640_184.812_866) * t
        + 0.093_104 * t * t
        - 6.2e-6 * t * t * t;

    // 240 seconds of time per degree
    let deg = (gmst_sec / 240.0) % 360.0;
    if deg < 0.0 {
        deg + 360.0
    } else {
        deg
    }
}

/// Equation of time in minutes for a given day-of-year fraction.
///
/// Spencer-style harmonic fit; worst-case error under half a minute, well
/// inside the terminator's accuracy class.
fn equation_of_time_min(day_of_year: f64) -> f64 {
    let b = 2.0 * PI * (day_of_year - 81.0) / 364.0;
    9.87 * (2.0 * b).sin() - 7.53 * b.cos() - 1.5 * b.sin()
}

/// Solar declination in degrees from a sinusoidal day-of-year approximation.
fn solar_declination_deg(day_of_year: f64) -> f64 {
    23.44 * (2.0 * PI * (284.0 + day_of_year) / 365.25).sin()
}

/// The geographic point directly beneath the sun.
pub fn subsolar_point(timestamp_ms: f64) -> Option<GeoPoint> {
    if !timestamp_ms.is_finite() {
        return None;
    }
    let days_since_epoch = timestamp_ms / MS_PER_DAY;
    // Day of year counted from Jan 1 1970 (a non-leap year boundary is fine
    // at this accuracy).
    let day_of_year = days_since_epoch.rem_euclid(365.25);

    let lat = solar_declination_deg(day_of_year);

    // Apparent solar time: UTC hours corrected by the equation of time.
    let utc_hours = (timestamp_ms / 3_600_000.0).rem_euclid(24.0);
    let solar_hours = utc_hours + equation_of_time_min(day_of_year) / 60.0;
    let lon = normalize_lon(15.0 * (12.0 - solar_hours));

    Some(GeoPoint { lat, lon })
}

/// The geographic point directly beneath the moon.
///
/// Low-order lunar series: mean longitude plus the evection-free principal
/// term in the mean anomaly, ecliptic latitude from the argument of
/// latitude, then rotated through the obliquity and referenced to GMST.
pub fn sublunar_point(timestamp_ms: f64) -> Option<GeoPoint> {
    if !timestamp_ms.is_finite() {
        return None;
    }
    let jd = julian_date(timestamp_ms);
    let t = (jd - J2000_JD) / 36_525.0;

    // Mean elements, degrees
    let mean_longitude = 218.316_4477 + 481_267.881_234_21 * t;
    let mean_anomaly = 134.963_396_4 + 477_198.867_505_5 * t;
    let arg_latitude = 93.272_095_2 + 483_202.017_523_8 * t;

    let m_rad = mean_anomaly.to_radians();
    let ecl_lon = (mean_longitude + 6.289 * m_rad.sin()).to_radians();
    let ecl_lat = (5.128 * arg_latitude.to_radians().sin()).to_radians();

    let eps = OBLIQUITY_J2000_DEG.to_radians();

    // Ecliptic -> equatorial
    let sin_dec = ecl_lat.sin() * eps.cos() + ecl_lat.cos() * eps.sin() * ecl_lon.sin();
    let dec = sin_dec.asin();
    let ra = (ecl_lon.sin() * eps.cos() - ecl_lat.tan() * eps.sin()).atan2(ecl_lon.cos());

    let lat = dec.to_degrees();
    let lon = normalize_lon(ra.to_degrees() - gmst_deg(timestamp_ms));

    Some(GeoPoint { lat, lon })
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-20 12:00:00 UTC (March equinox was 03:06 UTC that day)
    const EQUINOX_NOON_MS: f64 = 1_710_936_000_000.0;
    // 2024-06-20 12:00:00 UTC (June solstice was 20:51 UTC that day)
    const SOLSTICE_NOON_MS: f64 = 1_718_884_800_000.0;

    #[test]
    fn julian_date_epoch() {
        assert!((julian_date(0.0) - 2_440_587.5).abs() < 1e-9);
        // J2000.0 = 2000-01-01 12:00 UTC
        assert!((julian_date(946_728_000_000.0) - J2000_JD).abs() < 1e-6);
    }

    #[test]
    fn gmst_in_range() {
        for ms in [0.0, EQUINOX_NOON_MS, SOLSTICE_NOON_MS, 1.8e12] {
            let g = gmst_deg(ms);
            assert!((0.0..360.0).contains(&g), "gmst {g} for {ms}");
        }
    }

    #[test]
    fn subsolar_equinox_noon_near_origin() {
        let p = subsolar_point(EQUINOX_NOON_MS).unwrap();
        assert!(p.lat.abs() < 1.0, "lat {}", p.lat);
        // Solar noon at Greenwich puts the subsolar point near lon 0
        assert!(p.lon.abs() < 3.0, "lon {}", p.lon);
    }

    #[test]
    fn subsolar_june_solstice_latitude() {
        let p = subsolar_point(SOLSTICE_NOON_MS).unwrap();
        assert!((p.lat - 23.44).abs() < 1.0, "lat {}", p.lat);
    }

    #[test]
    fn subsolar_december_latitude() {
        // 2023-12-22 00:00 UTC, near the December solstice
        let p = subsolar_point(1_703_203_200_000.0).unwrap();
        assert!((p.lat + 23.44).abs() < 1.0, "lat {}", p.lat);
    }

    #[test]
    fn subsolar_longitude_tracks_time_of_day() {
        // Six hours after noon the subsolar point is ~90 degrees west
        let noon = subsolar_point(EQUINOX_NOON_MS).unwrap();
        let evening = subsolar_point(EQUINOX_NOON_MS + 6.0 * 3_600_000.0).unwrap();
        let delta = normalize_lon(evening.lon - noon.lon);
        assert!((delta + 90.0).abs() < 1.0, "delta {delta}");
    }

    #[test]
    fn sublunar_latitude_bounded() {
        // Lunar declination never exceeds ~28.7 degrees
        for k in 0..60 {
            let ms = EQUINOX_NOON_MS + k as f64 * 12.0 * 3_600_000.0;
            let p = sublunar_point(ms).unwrap();
            assert!(p.lat.abs() < 29.0, "lat {} at {}", p.lat, ms);
            assert!((-180.0..=180.0).contains(&p.lon));
        }
    }

    #[test]
    fn nan_timestamp_skips() {
        assert!(subsolar_point(f64::NAN).is_none());
        assert!(sublunar_point(f64::NAN).is_none());
        assert!(subsolar_point(f64::INFINITY).is_none());
    }
}
