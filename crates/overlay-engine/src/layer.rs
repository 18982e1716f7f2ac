//! Layer values handed to the map surface, and the per-category group that
//! owns them.

use geo_grid::GeoPoint;
use overlay_raster::RgbaRaster;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Longitude offsets at which every raster is placed so horizontal panning
/// never shows a seam. Placement policy only; the raster itself is
/// single-width.
pub const WRAP_OFFSETS_DEG: [f64; 3] = [-360.0, 0.0, 360.0];

/// Geographic bounding box, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub const WORLD: GeoBounds = GeoBounds {
        south: -90.0,
        west: -180.0,
        north: 90.0,
        east: 180.0,
    };

    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Grow the box by `fraction` of its own size on every side.
    pub fn padded(&self, fraction: f64) -> GeoBounds {
        let dlat = (self.north - self.south) * fraction;
        let dlon = (self.east - self.west) * fraction;
        GeoBounds {
            south: self.south - dlat,
            west: self.west - dlon,
            north: self.north + dlat,
            east: self.east + dlon,
        }
    }

    /// Containment check that also accepts the point shifted by one world
    /// width either way, so wrap copies stay visible.
    pub fn contains(&self, p: GeoPoint) -> bool {
        if p.lat < self.south || p.lat > self.north {
            return false;
        }
        [p.lon - 360.0, p.lon, p.lon + 360.0]
            .iter()
            .any(|lon| *lon >= self.west && *lon <= self.east)
    }
}

/// A raster placed at geographic bounds, possibly offset for wrap.
#[derive(Debug, Clone)]
pub struct ImageLayer {
    pub raster: Arc<RgbaRaster>,
    pub bounds: GeoBounds,
    pub lon_offset: f64,
}

/// Point markers drawn on top of rasters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarkerKind {
    Sun,
    Moon,
    AprsStation {
        callsign: String,
        symbol_table: char,
        symbol: char,
    },
    /// Reduced display mode: position only, no symbol art.
    AprsDot { callsign: String },
}

/// One drawable handed to the map surface.
#[derive(Debug, Clone)]
pub enum Layer {
    Image(ImageLayer),
    Marker { point: GeoPoint, marker: MarkerKind },
    Polygon {
        points: Vec<GeoPoint>,
        color: [u8; 3],
        opacity: f64,
    },
    Polyline {
        points: Vec<GeoPoint>,
        label: Option<String>,
    },
}

impl Layer {
    /// The three wrap placements of one raster over the whole world.
    pub fn wrapped_images(raster: RgbaRaster) -> Vec<Layer> {
        let raster = Arc::new(raster);
        WRAP_OFFSETS_DEG
            .iter()
            .map(|off| {
                Layer::Image(ImageLayer {
                    raster: Arc::clone(&raster),
                    bounds: GeoBounds::WORLD,
                    lon_offset: *off,
                })
            })
            .collect()
    }
}

/// Ownership container for one overlay category's layers. Cleared and
/// repopulated wholesale on every refresh; never diffed.
#[derive(Debug, Default)]
pub struct MapLayerGroup {
    layers: Vec<Layer>,
}

impl MapLayerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Viewport padding applied before hull/raster work on point clusters.
pub const VIEWPORT_PAD_FRACTION: f64 = 0.25;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_grows_symmetrically() {
        let b = GeoBounds::new(0.0, 0.0, 40.0, 80.0).padded(0.25);
        assert_eq!(b.south, -10.0);
        assert_eq!(b.north, 50.0);
        assert_eq!(b.west, -20.0);
        assert_eq!(b.east, 100.0);
    }

    #[test]
    fn contains_accepts_wrap_copies() {
        let b = GeoBounds::new(-10.0, 170.0, 10.0, 190.0);
        assert!(b.contains(GeoPoint::new(0.0, 175.0)));
        // -175 deg is the same meridian as +185
        assert!(b.contains(GeoPoint::new(0.0, -175.0)));
        assert!(!b.contains(GeoPoint::new(0.0, 0.0)));
        assert!(!b.contains(GeoPoint::new(45.0, 175.0)));
    }

    #[test]
    fn wrapped_images_share_one_raster() {
        let layers = Layer::wrapped_images(RgbaRaster::new(4, 2));
        assert_eq!(layers.len(), 3);
        let offsets: Vec<f64> = layers
            .iter()
            .map(|l| match l {
                Layer::Image(img) => img.lon_offset,
                _ => panic!("expected image"),
            })
            .collect();
        assert_eq!(offsets, vec![-360.0, 0.0, 360.0]);
    }
}
