//! Overlay Orchestrator
//!
//! Drives the map overlay compositing engine: per-category dispatch,
//! viewport-bounds filtering, refresh scheduling, and layer lifecycle
//! (create/clear/replace) over an opaque map surface.
//!
//! Data flow: settings resolution -> orchestrator -> {ephemeris, raster
//! compositor <- cluster smoother} -> layer groups on the map surface.
//! Every overlay category is an independent fetch-then-render unit; a
//! per-category generation counter makes completions last-writer-wins, and
//! a failed or empty fetch never clears a previously good layer group.

pub mod cache;
pub mod engine;
pub mod kind;
pub mod layer;
pub mod settings;
pub mod sources;
pub mod surface;

pub use cache::TtlCache;
pub use engine::{OverlayEngine, OverlayState};
pub use kind::{OverlayKind, PropagationSource};
pub use layer::{GeoBounds, ImageLayer, Layer, MapLayerGroup, MarkerKind, WRAP_OFFSETS_DEG};
pub use settings::{AprsDisplayMode, GridStyle, MapSettings, MapStyle, RawMapSettings, TileStyle};
pub use sources::{FetchError, PropagationData, SourceClient, SourceEndpoints};
pub use surface::{LayerStore, MapSurface};
