//! APRS Packet Codec
//!
//! TNC2 monitor-format parsing and VHF coverage construction for the map
//! overlay, in the style of vhf.dxview.org:
//! - `SRCCALL>DST,PATH1,PATH2:body` frame splitting
//! - NMEA-style `!`/`=` position bodies (`DDMM.MMN/DDDMM.MMW`)
//! - APRS symbol table/char extraction
//! - A sliding [`PacketWindow`] that tracks station positions and which
//!   tower heard which station, and turns that into coverage blobs or
//!   grid samples for interpolation.
//!
//! Data volume depends on what is fed into the window (e.g. an APRS-IS
//! ingest); only stations with parsed positions participate.

use geo_grid::{haversine_km, GeoPoint};
use overlay_raster::{convex_hull, Blob, GridSample};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default lookback for coverage and locations, hours.
pub const DEFAULT_WINDOW_HOURS: f64 = 6.0;
/// Window clamp bounds, hours (15 minutes to one week).
pub const MIN_WINDOW_HOURS: f64 = 0.25;
pub const MAX_WINDOW_HOURS: f64 = 168.0;
/// Paths shorter than this are local traffic, not propagation.
const MIN_PATH_KM: f64 = 20.0;

/// Path entries that are routing directives, not station callsigns.
const PATH_SKIP: &[&str] = &["APRS", "TCPIP", "TCPXX", "RELAY", "GATE", "WIDE", "QAR", "QAO", "QAS"];

/// Clamp an optional hours override into the supported window.
pub fn clamp_window_hours(hours: Option<f64>) -> f64 {
    match hours {
        Some(h) if h.is_finite() => h.clamp(MIN_WINDOW_HOURS, MAX_WINDOW_HOURS),
        _ => DEFAULT_WINDOW_HOURS,
    }
}

/// A parsed TNC2 monitor line.
#[derive(Debug, Clone, PartialEq)]
pub struct Tnc2Frame<'a> {
    pub srccall: &'a str,
    pub path: Vec<&'a str>,
    pub body: &'a str,
}

/// Parse `SRCCALL>DST,PATH1,PATH2*:body`. Used digipeater stars are
/// stripped from path entries.
pub fn parse_tnc2(line: &str) -> Option<Tnc2Frame<'_>> {
    let (head, body) = line.split_once(':')?;
    let (srccall, path_part) = head.split_once('>')?;
    let srccall = srccall.trim();
    if srccall.is_empty() {
        return None;
    }
    let path = path_part
        .split(',')
        .map(|p| p.trim().trim_end_matches('*'))
        .filter(|p| !p.is_empty())
        .collect();
    Some(Tnc2Frame {
        srccall,
        path,
        body: body.trim(),
    })
}

/// True for path entries that are not real station callsigns.
pub fn is_skip_call(call: &str) -> bool {
    if call.len() < 2 {
        return true;
    }
    if call.starts_with('q') {
        return true;
    }
    let base = call.split('-').next().unwrap_or(call).to_ascii_uppercase();
    PATH_SKIP.contains(&base.as_str())
        || base.starts_with("WIDE")
        || base.starts_with("RELAY")
        || base.starts_with("GATE")
}

/// Parse an NMEA-style position body: `!DDMM.MMN/DDDMM.MMW...` or the `=`
/// variant. Positions within ~2 km of null island are treated as bogus.
pub fn parse_position(body: &str) -> Option<(f64, f64)> {
    if body.len() < 15 || !body.starts_with(['!', '=']) {
        return None;
    }
    let rest = body[1..].trim();
    let sep = rest.find('/')?;
    if sep < 7 || sep + 9 > rest.len() {
        return None;
    }
    let lat_str = rest[..sep].trim_end();
    let lon_str = rest.get(sep + 1..sep + 10)?.trim_end();

    let lat = parse_coord(lat_str, 2, 'N', 'S')?;
    let lon = parse_coord(lon_str, 3, 'E', 'W')?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    if lat.abs() < 0.02 && lon.abs() < 0.02 {
        return None;
    }
    Some((lat, lon))
}

/// One coordinate: DD(D)MM.MM followed by an optional hemisphere letter.
fn parse_coord(s: &str, deg_digits: usize, pos_hemi: char, neg_hemi: char) -> Option<f64> {
    let mut s = s;
    let mut sign = 1.0;
    if let Some(last) = s.chars().last() {
        let up = last.to_ascii_uppercase();
        if up == pos_hemi || up == neg_hemi {
            if up == neg_hemi {
                sign = -1.0;
            }
            s = &s[..s.len() - 1];
        }
    }
    if s.len() < deg_digits {
        return None;
    }
    let deg: f64 = s[..deg_digits].parse().ok()?;
    let min: f64 = if s.len() > deg_digits {
        s[deg_digits..].parse().ok()?
    } else {
        0.0
    };
    Some(sign * (deg + min / 60.0))
}

/// APRS symbol table and symbol characters from a position body, with the
/// generic `('/', '?')` fallback.
pub fn parse_symbol(body: &str) -> (char, char) {
    const DEFAULT: (char, char) = ('/', '?');
    if body.len() < 16 {
        return DEFAULT;
    }
    let rest = if body.starts_with(['!', '=']) {
        body[1..].trim()
    } else {
        body.trim()
    };
    let bytes = rest.as_bytes();
    let Some(sep) = rest.find('/') else {
        return DEFAULT;
    };
    if sep < 7 || sep + 10 >= bytes.len() {
        return DEFAULT;
    }
    let table = bytes[sep] as char;
    let table = if table == '/' || table == '\\' { table } else { '/' };
    let symbol = bytes[sep + 10] as char;
    (table, symbol)
}

/// A station's latest known position and symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub callsign: String,
    pub lat: f64,
    pub lon: f64,
    /// Unix seconds when the position packet was received.
    pub last_seen: f64,
    pub symbol_table: char,
    pub symbol: char,
}

/// One long-path hop between two positioned stations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSegment {
    pub from: GeoPoint,
    pub to: GeoPoint,
    pub distance_km: f64,
    pub received_at: f64,
}

#[derive(Debug, Clone)]
struct StationRecord {
    point: GeoPoint,
    received_at: f64,
    symbol_table: char,
    symbol: char,
}

/// Sliding window over received packets: latest position per callsign plus
/// a heard-by map (tower -> the stations it appeared in the path of).
#[derive(Debug, Default)]
pub struct PacketWindow {
    positions: HashMap<String, StationRecord>,
    segments: Vec<PathSegment>,
    /// Tower grid key (lat/lon rounded to 3 decimals) -> heard source points
    /// with receive time.
    heard_by: HashMap<(i64, i64), Vec<(GeoPoint, f64)>>,
}

fn digi_key(p: GeoPoint) -> (i64, i64) {
    ((p.lat * 1000.0).round() as i64, (p.lon * 1000.0).round() as i64)
}

impl PacketWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stations with a known position.
    pub fn station_count(&self) -> usize {
        self.positions.len()
    }

    /// Feed one TNC2 line received at `received_at` (Unix seconds).
    /// Non-position packets are ignored.
    pub fn ingest(&mut self, line: &str, received_at: f64) {
        let Some(frame) = parse_tnc2(line) else {
            return;
        };
        let Some((lat, lon)) = parse_position(frame.body) else {
            return;
        };
        let (symbol_table, symbol) = parse_symbol(frame.body);
        let point = GeoPoint::new(lat, lon);
        self.positions.insert(
            frame.srccall.to_string(),
            StationRecord {
                point,
                received_at,
                symbol_table,
                symbol,
            },
        );

        // Consecutive hops between positioned stations become path segments.
        let mut hops: Vec<&str> = vec![frame.srccall];
        hops.extend(frame.path.iter().copied().filter(|c| !is_skip_call(c)));
        for pair in hops.windows(2) {
            let (Some(a), Some(b)) = (self.positions.get(pair[0]), self.positions.get(pair[1])) else {
                continue;
            };
            let distance_km = haversine_km(a.point, b.point);
            self.segments.push(PathSegment {
                from: a.point,
                to: b.point,
                distance_km,
                received_at,
            });
        }

        // Every positioned path entry "heard" the source.
        for call in hops.iter().skip(1) {
            let Some(digi) = self.positions.get(*call) else {
                continue;
            };
            if haversine_km(digi.point, point) < MIN_PATH_KM {
                continue;
            }
            self.heard_by
                .entry(digi_key(digi.point))
                .or_default()
                .push((point, received_at));
        }
    }

    /// Drop everything received before `cutoff` (Unix seconds).
    pub fn prune(&mut self, cutoff: f64) {
        self.positions.retain(|_, r| r.received_at >= cutoff);
        self.segments.retain(|s| s.received_at >= cutoff);
        for heard in self.heard_by.values_mut() {
            heard.retain(|(_, at)| *at >= cutoff);
        }
        self.heard_by.retain(|_, heard| !heard.is_empty());
    }

    /// Path segments received at or after `cutoff` (Unix seconds).
    pub fn path_segments(&self, cutoff: f64) -> Vec<PathSegment> {
        self.segments
            .iter()
            .filter(|s| s.received_at >= cutoff)
            .copied()
            .collect()
    }

    /// One blob per tower: the tower position plus every point it heard at
    /// or after `cutoff`, hulled. Towers with fewer than three points
    /// produce nothing. Intensity is the longest heard path in km.
    pub fn heard_by_blobs(&self, cutoff: f64) -> Vec<Blob> {
        let mut blobs = Vec::new();
        for (key, heard) in &self.heard_by {
            let center = GeoPoint::new(key.0 as f64 / 1000.0, key.1 as f64 / 1000.0);
            let heard: Vec<GeoPoint> = heard
                .iter()
                .filter(|(_, at)| *at >= cutoff)
                .map(|(p, _)| *p)
                .collect();
            let mut points = heard.clone();
            points.push(center);
            if points.len() < 3 {
                continue;
            }
            let hull = convex_hull(&points);
            if hull.len() < 3 {
                continue;
            }
            let intensity = heard
                .iter()
                .map(|p| haversine_km(center, *p))
                .fold(0.0, f64::max);
            blobs.push(Blob {
                center,
                hull,
                intensity,
            });
        }
        blobs
    }

    /// Fallback when the heard-by map is empty: one blob per segment
    /// endpoint that connects at least three distinct points.
    pub fn segment_blobs(&self, cutoff: f64) -> Vec<Blob> {
        let mut neighbors: HashMap<(i64, i64), Vec<GeoPoint>> = HashMap::new();
        let mut max_dist: HashMap<(i64, i64), f64> = HashMap::new();
        for seg in self.segments.iter().filter(|s| s.received_at >= cutoff) {
            for (own, other) in [(seg.from, seg.to), (seg.to, seg.from)] {
                let key = digi_key(own);
                let entry = neighbors.entry(key).or_default();
                if entry.is_empty() {
                    entry.push(own);
                }
                entry.push(other);
                let d = max_dist.entry(key).or_insert(0.0);
                *d = d.max(seg.distance_km);
            }
        }
        let mut blobs = Vec::new();
        for (key, points) in neighbors {
            if points.len() < 3 {
                continue;
            }
            let hull = convex_hull(&points);
            if hull.len() < 3 {
                continue;
            }
            let center = GeoPoint::new(key.0 as f64 / 1000.0, key.1 as f64 / 1000.0);
            blobs.push(Blob {
                center,
                hull,
                intensity: max_dist.get(&key).copied().unwrap_or(0.0),
            });
        }
        blobs
    }

    /// Coverage blobs: heard-by coverage when any tower has it, per-tower
    /// segment blobs as the fallback.
    pub fn coverage_blobs(&self, cutoff: f64) -> Vec<Blob> {
        let blobs = self.heard_by_blobs(cutoff);
        if blobs.is_empty() {
            self.segment_blobs(cutoff)
        } else {
            blobs
        }
    }

    /// Rasterize segments to overlay grid samples: both endpoints and the
    /// midpoint, valued by the path distance in km.
    pub fn segment_coords(&self, cutoff: f64) -> Vec<GridSample> {
        let mut coords = Vec::with_capacity(self.segments.len() * 3);
        for seg in self.segments.iter().filter(|s| s.received_at >= cutoff) {
            coords.push(GridSample::new(seg.from.lon, seg.from.lat, seg.distance_km));
            coords.push(GridSample::new(seg.to.lon, seg.to.lat, seg.distance_km));
            coords.push(GridSample::new(
                (seg.from.lon + seg.to.lon) / 2.0,
                (seg.from.lat + seg.to.lat) / 2.0,
                seg.distance_km,
            ));
        }
        coords
    }

    /// Latest location per callsign received at or after `cutoff`.
    pub fn locations(&self, cutoff: f64) -> Vec<Location> {
        let mut out: Vec<Location> = self
            .positions
            .iter()
            .filter(|(_, r)| r.received_at >= cutoff)
            .map(|(call, r)| Location {
                callsign: call.clone(),
                lat: r.point.lat,
                lon: r.point.lon,
                last_seen: r.received_at,
                symbol_table: r.symbol_table,
                symbol: r.symbol,
            })
            .collect();
        out.sort_by(|a, b| a.callsign.cmp(&b.callsign));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 40 deg 42.00 min N, 74 deg 0.00 min W — New York-ish
    const NYC: &str = "N0CALL>APRS,WIDE1-1:=4042.00N/07400.00W-test";

    #[test]
    fn tnc2_splits_head_and_body() {
        let f = parse_tnc2("K1ABC>APRS,W1XYZ*,WIDE2-1:=4042.00N/07400.00W-hello").unwrap();
        assert_eq!(f.srccall, "K1ABC");
        assert_eq!(f.path, vec!["APRS", "W1XYZ", "WIDE2-1"]);
        assert!(f.body.starts_with('='));

        assert_eq!(parse_tnc2("no separator here"), None);
        assert_eq!(parse_tnc2(">APRS:body"), None);
    }

    #[test]
    fn nmea_position_parses() {
        let (lat, lon) = parse_position("=4042.00N/07400.00W-test").unwrap();
        assert!((lat - 40.7).abs() < 1e-9, "lat {lat}");
        assert!((lon - -74.0).abs() < 1e-9, "lon {lon}");

        let (lat, lon) = parse_position("!3352.00S/15112.00E>mobile").unwrap();
        assert!((lat - -33.8667).abs() < 0.001);
        assert!((lon - 151.2).abs() < 0.001);
    }

    #[test]
    fn nmea_position_rejects_junk() {
        assert_eq!(parse_position("T#123,456"), None); // telemetry
        assert_eq!(parse_position("=short"), None);
        // Null island guard
        assert_eq!(parse_position("=0000.00N/00000.00W-"), None);
    }

    #[test]
    fn symbol_extraction() {
        let (table, sym) = parse_symbol("=4042.00N/07400.00W-test");
        assert_eq!(table, '/');
        assert_eq!(sym, '-');
        assert_eq!(parse_symbol("short"), ('/', '?'));
    }

    #[test]
    fn skip_calls() {
        for c in ["WIDE1-1", "WIDE2", "RELAY", "GATE", "TCPIP", "qAR", "APRS"] {
            assert!(is_skip_call(c), "{c} should be skipped");
        }
        for c in ["K1ABC", "N0CALL-9", "DB0XYZ"] {
            assert!(!is_skip_call(c), "{c} should be kept");
        }
    }

    #[test]
    fn window_tracks_latest_position() {
        let mut w = PacketWindow::new();
        w.ingest(NYC, 1000.0);
        w.ingest("N0CALL>APRS:=4100.00N/07300.00W-moved", 2000.0);
        let locs = w.locations(0.0);
        assert_eq!(locs.len(), 1);
        assert_eq!(locs[0].callsign, "N0CALL");
        assert!((locs[0].lat - 41.0).abs() < 1e-9);
        assert_eq!(locs[0].last_seen, 2000.0);
    }

    #[test]
    fn locations_cutoff_filters() {
        let mut w = PacketWindow::new();
        w.ingest(NYC, 1000.0);
        w.ingest("K1ABC>APRS:=4200.00N/07200.00W-", 5000.0);
        assert_eq!(w.locations(2000.0).len(), 1);
        assert_eq!(w.locations(0.0).len(), 2);
    }

    #[test]
    fn heard_by_blobs_from_digipeated_traffic() {
        let mut w = PacketWindow::new();
        // The digi announces its own position first
        w.ingest("DIGI1>APRS:=4500.00N/01000.00E#tower", 10.0);
        // Three stations far enough away, heard via DIGI1
        w.ingest("S1>APRS,DIGI1:=4530.00N/01030.00E-", 20.0);
        w.ingest("S2>APRS,DIGI1:=4430.00N/00930.00E-", 30.0);
        w.ingest("S3>APRS,DIGI1:=4500.00N/01100.00E-", 40.0);
        let blobs = w.coverage_blobs(0.0);
        assert_eq!(blobs.len(), 1);
        let blob = &blobs[0];
        assert!(blob.hull.len() >= 3);
        assert!(blob.intensity > MIN_PATH_KM, "intensity {}", blob.intensity);
        assert!((blob.center.lat - 45.0).abs() < 0.01);
    }

    #[test]
    fn local_traffic_below_min_path_ignored() {
        let mut w = PacketWindow::new();
        w.ingest("DIGI1>APRS:=4500.00N/01000.00E#", 10.0);
        // ~1 km away: below the 20 km propagation floor
        w.ingest("S1>APRS,DIGI1:=4500.50N/01000.00E-", 20.0);
        assert!(w.heard_by_blobs(0.0).is_empty());
    }

    #[test]
    fn segment_coords_three_points_per_segment() {
        let mut w = PacketWindow::new();
        w.ingest("A1BCD>APRS:=4500.00N/01000.00E-", 10.0);
        w.ingest("B1CDE>APRS,A1BCD:=4600.00N/01100.00E-", 20.0);
        let coords = w.segment_coords(0.0);
        assert_eq!(coords.len(), 3);
        assert_eq!(w.segment_coords(15.0).len(), 3);
        assert!(w.segment_coords(25.0).is_empty());
        // Midpoint sits between the endpoints
        assert!((coords[2].lat - 45.5).abs() < 0.01);
        assert!(coords.iter().all(|c| c.value > 0.0));
    }

    #[test]
    fn prune_drops_old_entries() {
        let mut w = PacketWindow::new();
        w.ingest(NYC, 1000.0);
        w.ingest("K1ABC>APRS:=4200.00N/07200.00W-", 5000.0);
        w.prune(2000.0);
        assert_eq!(w.station_count(), 1);
    }
}
