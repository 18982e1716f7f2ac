//! The map surface collaborator contract, plus an in-memory implementation
//! used by the gateway and by tests.

use crate::kind::OverlayKind;
use crate::layer::{GeoBounds, Layer, MapLayerGroup};
use std::collections::HashMap;

/// The underlying map renderer (pan/zoom/tile host) as seen by the
/// orchestrator: an opaque sink of layers with a queryable viewport.
pub trait MapSurface: Send + Sync {
    fn add_layer(&mut self, kind: OverlayKind, layer: Layer);
    fn clear_layers(&mut self, kind: OverlayKind);
    fn viewport_bounds(&self) -> GeoBounds;
}

/// Holds the current layer group per overlay category. The gateway reads
/// rendered rasters back out of this to serve overlay PNGs.
#[derive(Debug)]
pub struct LayerStore {
    groups: HashMap<OverlayKind, MapLayerGroup>,
    viewport: GeoBounds,
}

impl LayerStore {
    pub fn new(viewport: GeoBounds) -> Self {
        Self {
            groups: HashMap::new(),
            viewport,
        }
    }

    pub fn world() -> Self {
        Self::new(GeoBounds::WORLD)
    }

    pub fn group(&self, kind: OverlayKind) -> Option<&MapLayerGroup> {
        self.groups.get(&kind)
    }

    pub fn set_viewport(&mut self, viewport: GeoBounds) {
        self.viewport = viewport;
    }

    /// First image layer of a category, if any was rendered.
    pub fn raster(&self, kind: OverlayKind) -> Option<&crate::layer::ImageLayer> {
        self.groups.get(&kind)?.layers().iter().find_map(|l| match l {
            Layer::Image(img) => Some(img),
            _ => None,
        })
    }
}

impl Default for LayerStore {
    fn default() -> Self {
        Self::world()
    }
}

impl MapSurface for LayerStore {
    fn add_layer(&mut self, kind: OverlayKind, layer: Layer) {
        self.groups.entry(kind).or_default().add(layer);
    }

    fn clear_layers(&mut self, kind: OverlayKind) {
        if let Some(group) = self.groups.get_mut(&kind) {
            group.clear();
        }
    }

    fn viewport_bounds(&self) -> GeoBounds {
        self.viewport
    }
}
