//! Convex hull and corner-cutting smoother for signal-coverage blobs.

use geo_grid::GeoPoint;
use serde::{Deserialize, Serialize};

/// A near-convex boundary around a cluster of dense point samples, plus the
/// metric driving its color (max path distance in km for VHF coverage).
/// Produced per refresh, short-lived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    pub center: GeoPoint,
    pub hull: Vec<GeoPoint>,
    pub intensity: f64,
}

/// Graham scan over (lon, lat) as (x, y); returns the hull counter-clockwise
/// starting from the bottom-most (then left-most) point.
///
/// Edge accuracy is cosmetic: collinear points are dropped and fewer than
/// three distinct inputs are returned as-is.
pub fn convex_hull(points: &[GeoPoint]) -> Vec<GeoPoint> {
    let mut pts: Vec<GeoPoint> = points.to_vec();
    pts.sort_by(|a, b| a.lat.total_cmp(&b.lat).then(a.lon.total_cmp(&b.lon)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let start = pts[0];
    let mut rest: Vec<GeoPoint> = pts[1..].to_vec();
    rest.sort_by(|a, b| {
        let angle_a = (a.lat - start.lat).atan2(a.lon - start.lon);
        let angle_b = (b.lat - start.lat).atan2(b.lon - start.lon);
        angle_a
            .total_cmp(&angle_b)
            .then(a.lat.total_cmp(&b.lat))
            .then(a.lon.total_cmp(&b.lon))
    });

    let mut hull = vec![start];
    for p in rest {
        while hull.len() >= 2 {
            let a = hull[hull.len() - 2];
            let b = hull[hull.len() - 1];
            let cross = (b.lon - a.lon) * (p.lat - b.lat) - (b.lat - a.lat) * (p.lon - b.lon);
            if cross <= 0.0 {
                hull.pop();
            } else {
                break;
            }
        }
        hull.push(p);
    }
    hull
}

/// Chaikin corner cutting over a closed polygon: each edge (p, q) is
/// replaced by points at 25% and 75% along it, doubling the vertex count
/// per pass. More passes converge toward a smooth blob with diminishing
/// returns.
pub fn chaikin_smooth(polygon: &[GeoPoint], passes: u32) -> Vec<GeoPoint> {
    if polygon.len() < 3 {
        return polygon.to_vec();
    }
    let mut poly = polygon.to_vec();
    for _ in 0..passes {
        let mut next = Vec::with_capacity(poly.len() * 2);
        for i in 0..poly.len() {
            let p = poly[i];
            let q = poly[(i + 1) % poly.len()];
            next.push(GeoPoint {
                lat: 0.75 * p.lat + 0.25 * q.lat,
                lon: 0.75 * p.lon + 0.25 * q.lon,
            });
            next.push(GeoPoint {
                lat: 0.25 * p.lat + 0.75 * q.lat,
                lon: 0.25 * p.lon + 0.75 * q.lon,
            });
        }
        poly = next;
    }
    poly
}
