//! The overlay engine: one state machine per overlay category, refreshed on
//! category-specific cadences, rendering into a shared map surface.
//!
//! Concurrency model: each category's fetch-then-render is an independent
//! task; completions may arrive out of order. A monotonic per-category
//! generation counter makes application last-writer-wins — a completion
//! whose generation is no longer current is discarded without touching the
//! surface. Fetch errors and render skips never clear a previously good
//! layer group.

use crate::kind::{OverlayKind, PropagationSource, KIND_COUNT};
use crate::layer::{GeoBounds, Layer, MarkerKind, VIEWPORT_PAD_FRACTION};
use crate::settings::{AprsDisplayMode, GridStyle, MapSettings, RawMapSettings};
use crate::sources::{PropagationData, SourceClient};
use crate::surface::MapSurface;
use aprs_codec::Location;
use ephemeris::{sublunar_point, subsolar_point};
use geo_grid::GeoPoint;
use overlay_raster::{
    chaikin_smooth, idw_interpolate, raster_to_rgba, render_terminator, GridSample,
    CANONICAL_HEIGHT, CANONICAL_WIDTH, DEFAULT_TWILIGHT_DEG,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// IDW power parameter shared by all grid overlays.
const IDW_POWER: f64 = 2.0;
/// Corner-cutting passes applied to coverage blob hulls.
const CHAIKIN_PASSES: u32 = 3;

/// Per-category lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Disabled,
    Fetching,
    Rendered,
    /// Fetch failed or too little data this cycle; the previous layer
    /// group, if any, is still showing.
    Error,
}

#[derive(Debug, Clone, Copy)]
struct CategoryStatus {
    state: OverlayState,
    rendered_once: bool,
}

impl CategoryStatus {
    const fn initial() -> Self {
        Self {
            state: OverlayState::Disabled,
            rendered_once: false,
        }
    }
}

pub struct OverlayEngine<S: MapSurface> {
    surface: Arc<RwLock<S>>,
    sources: SourceClient,
    settings: std::sync::RwLock<MapSettings>,
    generations: [AtomicU64; KIND_COUNT],
    status: std::sync::Mutex<[CategoryStatus; KIND_COUNT]>,
}

impl<S: MapSurface> OverlayEngine<S> {
    pub fn new(surface: Arc<RwLock<S>>, sources: SourceClient) -> Self {
        Self {
            surface,
            sources,
            settings: std::sync::RwLock::new(MapSettings::default()),
            generations: std::array::from_fn(|_| AtomicU64::new(0)),
            status: std::sync::Mutex::new([CategoryStatus::initial(); KIND_COUNT]),
        }
    }

    pub fn settings(&self) -> MapSettings {
        self.settings.read().expect("settings lock").clone()
    }

    pub fn state(&self, kind: OverlayKind) -> OverlayState {
        self.status.lock().expect("status lock")[kind.index()].state
    }

    /// Whether the resolved settings enable a category at all.
    pub fn enabled(kind: OverlayKind, settings: &MapSettings) -> bool {
        match kind {
            OverlayKind::Terminator => settings.show_terminator,
            OverlayKind::SunMoon => settings.show_sun_moon,
            OverlayKind::Aurora => settings.show_aurora,
            OverlayKind::HfPropagation | OverlayKind::VhfPropagation => settings
                .propagation_source
                .is_some_and(|s| s.overlay_kind() == kind),
            OverlayKind::AprsLocations => settings.show_aprs_locations,
            OverlayKind::Grid => settings.grid_style != GridStyle::None,
        }
    }

    /// Replace the settings wholesale. Newly disabled categories are
    /// cleared immediately and their in-flight completions invalidated;
    /// the static grid redraws; everything else picks the change up on its
    /// next refresh.
    pub async fn apply_settings(&self, raw: &RawMapSettings) {
        let resolved = raw.resolve();
        *self.settings.write().expect("settings lock") = resolved.clone();

        for kind in OverlayKind::ALL {
            if !Self::enabled(kind, &resolved) {
                self.generations[kind.index()].fetch_add(1, Ordering::SeqCst);
                let mut surface = self.surface.write().await;
                surface.clear_layers(kind);
                let mut status = self.status.lock().expect("status lock");
                status[kind.index()] = CategoryStatus::initial();
            }
        }

        if Self::enabled(OverlayKind::Grid, &resolved) {
            self.refresh(OverlayKind::Grid).await;
        }
    }

    /// Refresh one category now: fetch (if the category fetches) and
    /// re-render its layer group.
    pub async fn refresh(&self, kind: OverlayKind) {
        let settings = self.settings();
        if !Self::enabled(kind, &settings) {
            return;
        }
        let gen = self.begin(kind);
        match kind {
            OverlayKind::Terminator => self.apply_terminator(now_ms(), gen).await,
            OverlayKind::SunMoon => self.apply_sun_moon(now_ms(), gen).await,
            OverlayKind::Aurora => match self.sources.fetch_aurora().await {
                Ok(samples) => self.apply_aurora(samples, gen).await,
                Err(e) => self.fail(kind, gen, &e.to_string()),
            },
            OverlayKind::HfPropagation => {
                let Some(source) = settings.propagation_source else {
                    return;
                };
                match self
                    .sources
                    .fetch_propagation(source, settings.propagation_aprs_hours)
                    .await
                {
                    Ok(data) => self.apply_hf(data.samples, source, gen).await,
                    Err(e) => self.fail(kind, gen, &e.to_string()),
                }
            }
            OverlayKind::VhfPropagation => {
                match self
                    .sources
                    .fetch_vhf_aprs(settings.propagation_aprs_hours)
                    .await
                {
                    Ok(data) => self.apply_vhf(data, gen).await,
                    Err(e) => self.fail(kind, gen, &e.to_string()),
                }
            }
            OverlayKind::AprsLocations => {
                match self
                    .sources
                    .fetch_locations(settings.propagation_aprs_hours)
                    .await
                {
                    Ok(locations) => self.apply_locations(locations, now_ms() / 1000.0, gen).await,
                    Err(e) => self.fail(kind, gen, &e.to_string()),
                }
            }
            OverlayKind::Grid => {
                let layers = build_grid_layers(settings.grid_style);
                self.commit(kind, gen, layers).await;
            }
        }
    }

    /// Refresh every enabled category.
    pub async fn refresh_all(&self) {
        for kind in OverlayKind::ALL {
            self.refresh(kind).await;
        }
    }

    /// Drive the refresh cadences forever. Time-dependent categories tick
    /// every minute, fetched categories every five; each refresh runs as
    /// its own task so a slow fetch never delays the others.
    pub async fn run(self: Arc<Self>)
    where
        S: 'static,
    {
        self.refresh_all().await;

        let mut fast = tokio::time::interval(Duration::from_secs(60));
        let mut slow = tokio::time::interval(Duration::from_secs(300));
        fast.tick().await;
        slow.tick().await;

        loop {
            tokio::select! {
                _ = fast.tick() => {
                    for kind in [OverlayKind::Terminator, OverlayKind::SunMoon] {
                        let engine = Arc::clone(&self);
                        tokio::spawn(async move { engine.refresh(kind).await });
                    }
                }
                _ = slow.tick() => {
                    for kind in [
                        OverlayKind::Aurora,
                        OverlayKind::HfPropagation,
                        OverlayKind::VhfPropagation,
                        OverlayKind::AprsLocations,
                    ] {
                        let engine = Arc::clone(&self);
                        tokio::spawn(async move { engine.refresh(kind).await });
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Per-category apply steps (pure layer building + guarded commit)
    // ------------------------------------------------------------------

    async fn apply_terminator(&self, timestamp_ms: f64, gen: u64) {
        match render_terminator(timestamp_ms, DEFAULT_TWILIGHT_DEG) {
            Some(raster) => {
                self.commit(OverlayKind::Terminator, gen, Layer::wrapped_images(raster))
                    .await;
            }
            None => self.skip(OverlayKind::Terminator, gen, "clock unavailable"),
        }
    }

    async fn apply_sun_moon(&self, timestamp_ms: f64, gen: u64) {
        let (Some(sun), Some(moon)) = (subsolar_point(timestamp_ms), sublunar_point(timestamp_ms))
        else {
            self.skip(OverlayKind::SunMoon, gen, "clock unavailable");
            return;
        };
        let layers = vec![
            Layer::Marker {
                point: sun,
                marker: MarkerKind::Sun,
            },
            Layer::Marker {
                point: moon,
                marker: MarkerKind::Moon,
            },
        ];
        self.commit(OverlayKind::SunMoon, gen, layers).await;
    }

    async fn apply_aurora(&self, samples: Vec<GridSample>, gen: u64) {
        let opacity = self.settings().aurora_opacity as f64 / 100.0;
        match build_aurora_layers(&samples, opacity) {
            Some(layers) => {
                self.commit(OverlayKind::Aurora, gen, layers).await;
            }
            None => self.skip(OverlayKind::Aurora, gen, "too few samples"),
        }
    }

    async fn apply_hf(&self, samples: Vec<GridSample>, source: PropagationSource, gen: u64) {
        let opacity = self.settings().propagation_opacity as f64 / 100.0;
        match build_hf_layers(&samples, source, opacity) {
            Some(layers) => {
                self.commit(OverlayKind::HfPropagation, gen, layers).await;
            }
            None => self.skip(OverlayKind::HfPropagation, gen, "too few samples"),
        }
    }

    async fn apply_vhf(&self, data: PropagationData, gen: u64) {
        let opacity = self.settings().propagation_opacity as f64 / 100.0;
        let viewport = self.surface.read().await.viewport_bounds();
        match build_vhf_layers(&data, viewport, opacity) {
            Some(layers) => {
                self.commit(OverlayKind::VhfPropagation, gen, layers).await;
            }
            None => self.skip(OverlayKind::VhfPropagation, gen, "no coverage data"),
        }
    }

    async fn apply_locations(&self, locations: Vec<Location>, now_s: f64, gen: u64) {
        if !now_s.is_finite() {
            self.skip(OverlayKind::AprsLocations, gen, "clock unavailable");
            return;
        }
        if locations.is_empty() {
            self.skip(OverlayKind::AprsLocations, gen, "no locations");
            return;
        }
        let settings = self.settings();
        let layers = build_location_layers(
            &locations,
            now_s,
            settings.propagation_aprs_hours,
            &settings.aprs_filter,
            settings.aprs_display_mode,
        );
        self.commit(OverlayKind::AprsLocations, gen, layers).await;
    }

    // ------------------------------------------------------------------
    // State machine plumbing
    // ------------------------------------------------------------------

    /// Start a fetch cycle: bump the generation and mark the category
    /// fetching. The previous layer group stays visible throughout.
    fn begin(&self, kind: OverlayKind) -> u64 {
        let gen = self.generations[kind.index()].fetch_add(1, Ordering::SeqCst) + 1;
        let mut status = self.status.lock().expect("status lock");
        status[kind.index()].state = OverlayState::Fetching;
        gen
    }

    fn is_current(&self, kind: OverlayKind, gen: u64) -> bool {
        self.generations[kind.index()].load(Ordering::SeqCst) == gen
    }

    /// Replace the category's layer group, unless a newer cycle has started.
    async fn commit(&self, kind: OverlayKind, gen: u64, layers: Vec<Layer>) -> bool {
        if !self.is_current(kind, gen) {
            debug!("{kind}: stale render discarded (gen {gen})");
            return false;
        }
        let mut surface = self.surface.write().await;
        surface.clear_layers(kind);
        for layer in layers {
            surface.add_layer(kind, layer);
        }
        drop(surface);

        let mut status = self.status.lock().expect("status lock");
        status[kind.index()] = CategoryStatus {
            state: OverlayState::Rendered,
            rendered_once: true,
        };
        true
    }

    /// The cycle produced nothing renderable; the prior group stays.
    fn skip(&self, kind: OverlayKind, gen: u64, reason: &str) {
        if !self.is_current(kind, gen) {
            return;
        }
        debug!("{kind}: render skipped: {reason}");
        let mut status = self.status.lock().expect("status lock");
        let entry = &mut status[kind.index()];
        entry.state = if entry.rendered_once {
            OverlayState::Rendered
        } else {
            OverlayState::Error
        };
    }

    /// The fetch failed; the prior group stays. Background overlay refresh
    /// failures are not surfaced to the user.
    fn fail(&self, kind: OverlayKind, gen: u64, error: &str) {
        if !self.is_current(kind, gen) {
            return;
        }
        warn!("{kind}: fetch failed, keeping previous layer: {error}");
        let mut status = self.status.lock().expect("status lock");
        status[kind.index()].state = OverlayState::Error;
    }

    #[cfg(test)]
    fn set_settings(&self, settings: MapSettings) {
        *self.settings.write().expect("settings lock") = settings;
    }
}

fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(f64::NAN)
}

// ============================================================================
// Pure layer builders
// ============================================================================

/// Aurora probability raster over the canonical grid. None when the sample
/// set is too small to interpolate.
pub fn build_aurora_layers(samples: &[GridSample], opacity: f64) -> Option<Vec<Layer>> {
    let field = idw_interpolate(samples, CANONICAL_WIDTH, CANONICAL_HEIGHT, IDW_POWER)?;
    let range = OverlayKind::Aurora.value_range().expect("aurora range");
    let ramp = OverlayKind::Aurora.ramp().expect("aurora ramp");
    let raster = raster_to_rgba(&field, range, &ramp, opacity);
    Some(Layer::wrapped_images(raster))
}

/// HF propagation raster for a grid-style source.
pub fn build_hf_layers(
    samples: &[GridSample],
    source: PropagationSource,
    opacity: f64,
) -> Option<Vec<Layer>> {
    let field = idw_interpolate(samples, CANONICAL_WIDTH, CANONICAL_HEIGHT, IDW_POWER)?;
    let raster = raster_to_rgba(&field, source.value_range(), &source.ramp(), opacity);
    Some(Layer::wrapped_images(raster))
}

/// VHF coverage: smoothed hull polygons when the response carries blobs
/// (blobs take precedence when both are present), interpolated raster from
/// grid samples otherwise.
///
/// Blobs are filtered against the padded viewport before any smoothing cost
/// is paid, and sorted by ascending intensity so the most salient coverage
/// paints on top.
pub fn build_vhf_layers(
    data: &PropagationData,
    viewport: GeoBounds,
    opacity: f64,
) -> Option<Vec<Layer>> {
    if !data.blobs.is_empty() {
        let padded = viewport.padded(VIEWPORT_PAD_FRACTION);
        let mut visible: Vec<_> = data
            .blobs
            .iter()
            .filter(|b| b.hull.iter().any(|p| padded.contains(*p)))
            .collect();
        if visible.is_empty() {
            return None;
        }
        visible.sort_by(|a, b| a.intensity.total_cmp(&b.intensity));

        let range = PropagationSource::VhfAprs.value_range();
        let ramp = PropagationSource::VhfAprs.ramp();
        let layers = visible
            .into_iter()
            .map(|blob| {
                let t = ((blob.intensity - range.min) / (range.max - range.min)).clamp(0.0, 1.0);
                Layer::Polygon {
                    points: chaikin_smooth(&blob.hull, CHAIKIN_PASSES),
                    color: ramp.eval(t),
                    opacity,
                }
            })
            .collect();
        return Some(layers);
    }
    let field = idw_interpolate(&data.samples, CANONICAL_WIDTH, CANONICAL_HEIGHT, IDW_POWER)?;
    let raster = raster_to_rgba(
        &field,
        PropagationSource::VhfAprs.value_range(),
        &PropagationSource::VhfAprs.ramp(),
        opacity,
    );
    Some(Layer::wrapped_images(raster))
}

/// APRS station markers. Entries older than the age threshold are excluded
/// here, at render time; the prefix filter keeps only matching callsigns.
pub fn build_location_layers(
    locations: &[Location],
    now_s: f64,
    max_age_hours: f64,
    prefix_filter: &[String],
    mode: AprsDisplayMode,
) -> Vec<Layer> {
    let cutoff = now_s - max_age_hours * 3600.0;
    locations
        .iter()
        .filter(|l| l.last_seen >= cutoff)
        .filter(|l| {
            prefix_filter.is_empty()
                || prefix_filter
                    .iter()
                    .any(|p| l.callsign.to_ascii_uppercase().starts_with(p.as_str()))
        })
        .map(|l| Layer::Marker {
            point: GeoPoint::new(l.lat, l.lon),
            marker: match mode {
                AprsDisplayMode::Symbols => MarkerKind::AprsStation {
                    callsign: l.callsign.clone(),
                    symbol_table: l.symbol_table,
                    symbol: l.symbol,
                },
                AprsDisplayMode::Dots => MarkerKind::AprsDot {
                    callsign: l.callsign.clone(),
                },
            },
        })
        .collect()
}

/// Static coordinate grid lines per style.
pub fn build_grid_layers(style: GridStyle) -> Vec<Layer> {
    let lat_line = |lat: f64, label: Option<String>| Layer::Polyline {
        points: vec![GeoPoint::new(lat, -180.0), GeoPoint::new(lat, 180.0)],
        label,
    };
    let lon_line = |lon: f64| Layer::Polyline {
        points: vec![GeoPoint::new(-90.0, lon), GeoPoint::new(90.0, lon)],
        label: None,
    };
    match style {
        GridStyle::None => Vec::new(),
        GridStyle::Tropics => vec![
            lat_line(0.0, Some("Equator".into())),
            lat_line(23.43661, Some("Tropic of Cancer".into())),
            lat_line(-23.43661, Some("Tropic of Capricorn".into())),
            lat_line(66.56339, Some("Arctic Circle".into())),
            lat_line(-66.56339, Some("Antarctic Circle".into())),
        ],
        GridStyle::LatLong => {
            let mut layers = Vec::new();
            let mut lat = -75.0;
            while lat <= 75.0 {
                layers.push(lat_line(lat, None));
                lat += 15.0;
            }
            let mut lon = -180.0;
            while lon < 180.0 {
                layers.push(lon_line(lon));
                lon += 30.0;
            }
            layers
        }
        GridStyle::Maidenhead => {
            // Field boundaries: 20 degrees of longitude by 10 of latitude
            let mut layers = Vec::new();
            let mut lat = -80.0;
            while lat <= 80.0 {
                layers.push(lat_line(lat, None));
                lat += 10.0;
            }
            let mut lon = -180.0;
            while lon < 180.0 {
                layers.push(lon_line(lon));
                lon += 20.0;
            }
            layers
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceEndpoints;
    use crate::surface::LayerStore;
    use overlay_raster::Blob;

    fn test_engine() -> OverlayEngine<LayerStore> {
        let surface = Arc::new(RwLock::new(LayerStore::world()));
        OverlayEngine::new(surface, SourceClient::new(SourceEndpoints::default()))
    }

    fn aurora_settings() -> MapSettings {
        MapSettings {
            show_aurora: true,
            ..MapSettings::default()
        }
    }

    fn samples() -> Vec<GridSample> {
        vec![
            GridSample::new(-30.0, 65.0, 60.0),
            GridSample::new(0.0, 68.0, 80.0),
            GridSample::new(30.0, 62.0, 40.0),
        ]
    }

    async fn group_len(engine: &OverlayEngine<LayerStore>, kind: OverlayKind) -> usize {
        engine
            .surface
            .read()
            .await
            .group(kind)
            .map(|g| g.len())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn empty_fetch_leaves_previous_layer_untouched() {
        let engine = test_engine();
        engine.set_settings(aurora_settings());

        let gen = engine.begin(OverlayKind::Aurora);
        engine.apply_aurora(samples(), gen).await;
        assert_eq!(engine.state(OverlayKind::Aurora), OverlayState::Rendered);
        assert_eq!(group_len(&engine, OverlayKind::Aurora).await, 3);

        // A later fetch returning no coordinates skips: no clear, no blank
        // frame, and the category still reads as rendered (stale-but-valid).
        let gen = engine.begin(OverlayKind::Aurora);
        engine.apply_aurora(Vec::new(), gen).await;
        assert_eq!(group_len(&engine, OverlayKind::Aurora).await, 3);
        assert_eq!(engine.state(OverlayKind::Aurora), OverlayState::Rendered);
    }

    #[tokio::test]
    async fn fetch_error_keeps_layer_and_reports_error_state() {
        let engine = test_engine();
        engine.set_settings(aurora_settings());

        let gen = engine.begin(OverlayKind::Aurora);
        engine.apply_aurora(samples(), gen).await;

        let gen = engine.begin(OverlayKind::Aurora);
        engine.fail(OverlayKind::Aurora, gen, "boom");
        assert_eq!(group_len(&engine, OverlayKind::Aurora).await, 3);
        assert_eq!(engine.state(OverlayKind::Aurora), OverlayState::Error);
    }

    #[tokio::test]
    async fn stale_completion_is_discarded() {
        let engine = test_engine();
        engine.set_settings(aurora_settings());

        let old_gen = engine.begin(OverlayKind::Aurora);
        let new_gen = engine.begin(OverlayKind::Aurora);

        // The older fetch completes after the newer one started: dropped.
        assert!(!engine.commit(OverlayKind::Aurora, old_gen, Vec::new()).await);
        engine.apply_aurora(samples(), new_gen).await;
        assert_eq!(group_len(&engine, OverlayKind::Aurora).await, 3);
    }

    #[tokio::test]
    async fn disabling_an_overlay_clears_its_group() {
        let engine = test_engine();
        engine.set_settings(aurora_settings());
        let gen = engine.begin(OverlayKind::Aurora);
        engine.apply_aurora(samples(), gen).await;
        assert_eq!(group_len(&engine, OverlayKind::Aurora).await, 3);

        engine.apply_settings(&RawMapSettings::default()).await;
        assert_eq!(group_len(&engine, OverlayKind::Aurora).await, 0);
        assert_eq!(engine.state(OverlayKind::Aurora), OverlayState::Disabled);
    }

    #[test]
    fn location_age_threshold_at_render_time() {
        let now_s = 1_700_000_000.0;
        let loc = |callsign: &str, age_hours: f64| Location {
            callsign: callsign.into(),
            lat: 40.0,
            lon: -74.0,
            last_seen: now_s - age_hours * 3600.0,
            symbol_table: '/',
            symbol: '-',
        };
        let layers = build_location_layers(
            &[loc("OLD7H", 7.0), loc("OK59", 5.9)],
            now_s,
            6.0,
            &[],
            AprsDisplayMode::Symbols,
        );
        assert_eq!(layers.len(), 1);
        match &layers[0] {
            Layer::Marker {
                marker: MarkerKind::AprsStation { callsign, .. },
                ..
            } => assert_eq!(callsign, "OK59"),
            other => panic!("unexpected layer {other:?}"),
        }
    }

    #[test]
    fn location_prefix_filter() {
        let now_s = 1_700_000_000.0;
        let loc = |callsign: &str| Location {
            callsign: callsign.into(),
            lat: 40.0,
            lon: -74.0,
            last_seen: now_s,
            symbol_table: '/',
            symbol: '-',
        };
        let layers = build_location_layers(
            &[loc("K1ABC"), loc("DB0XYZ"), loc("k1zzz")],
            now_s,
            6.0,
            &["K1".into()],
            AprsDisplayMode::Dots,
        );
        assert_eq!(layers.len(), 2);
    }

    #[test]
    fn vhf_blobs_take_precedence_over_coordinates() {
        let blob = Blob {
            center: GeoPoint::new(45.0, 10.0),
            hull: vec![
                GeoPoint::new(44.0, 9.0),
                GeoPoint::new(46.0, 9.0),
                GeoPoint::new(45.0, 11.0),
            ],
            intensity: 150.0,
        };
        let data = PropagationData {
            samples: vec![
                GridSample::new(9.0, 44.0, 100.0),
                GridSample::new(9.0, 46.0, 100.0),
                GridSample::new(11.0, 45.0, 100.0),
            ],
            blobs: vec![blob],
            value_label: "VHF path km".into(),
        };
        let layers = build_vhf_layers(&data, GeoBounds::WORLD, 0.6).unwrap();
        assert_eq!(layers.len(), 1);
        assert!(matches!(layers[0], Layer::Polygon { .. }));
    }

    #[test]
    fn vhf_falls_back_to_grid_when_no_blobs() {
        let data = PropagationData {
            samples: vec![
                GridSample::new(9.0, 44.0, 100.0),
                GridSample::new(9.0, 46.0, 150.0),
                GridSample::new(11.0, 45.0, 200.0),
            ],
            blobs: Vec::new(),
            value_label: "VHF path km".into(),
        };
        let layers = build_vhf_layers(&data, GeoBounds::WORLD, 0.6).unwrap();
        assert_eq!(layers.len(), 3);
        assert!(matches!(layers[0], Layer::Image(_)));
    }

    #[test]
    fn vhf_viewport_filter_and_draw_order() {
        let near = |intensity: f64, lon: f64| Blob {
            center: GeoPoint::new(45.0, lon),
            hull: vec![
                GeoPoint::new(44.0, lon - 1.0),
                GeoPoint::new(46.0, lon - 1.0),
                GeoPoint::new(45.0, lon + 1.0),
            ],
            intensity,
        };
        let data = PropagationData {
            samples: Vec::new(),
            // Two blobs in view (out of intensity order), one far outside
            blobs: vec![near(300.0, 10.0), near(100.0, 12.0), near(999.0, 160.0)],
            value_label: String::new(),
        };
        let viewport = GeoBounds::new(40.0, 5.0, 50.0, 15.0);
        let layers = build_vhf_layers(&data, viewport, 0.6).unwrap();
        assert_eq!(layers.len(), 2, "out-of-view blob must be dropped");

        // Ascending intensity: the weaker blob paints first
        let colors: Vec<[u8; 3]> = layers
            .iter()
            .map(|l| match l {
                Layer::Polygon { color, .. } => *color,
                other => panic!("unexpected layer {other:?}"),
            })
            .collect();
        let ramp = PropagationSource::VhfAprs.ramp();
        let range = PropagationSource::VhfAprs.value_range();
        let t100 = ((100.0 - range.min) / (range.max - range.min)).clamp(0.0, 1.0);
        assert_eq!(colors[0], ramp.eval(t100));
    }

    #[test]
    fn vhf_smoothing_rounds_hulls() {
        let data = PropagationData {
            samples: Vec::new(),
            blobs: vec![Blob {
                center: GeoPoint::new(45.0, 10.0),
                hull: vec![
                    GeoPoint::new(44.0, 9.0),
                    GeoPoint::new(46.0, 9.0),
                    GeoPoint::new(45.0, 11.0),
                ],
                intensity: 50.0,
            }],
            value_label: String::new(),
        };
        let layers = build_vhf_layers(&data, GeoBounds::WORLD, 0.6).unwrap();
        match &layers[0] {
            // 3 vertices doubled over three passes
            Layer::Polygon { points, .. } => assert_eq!(points.len(), 24),
            other => panic!("unexpected layer {other:?}"),
        }
    }

    #[test]
    fn grid_styles_produce_lines() {
        assert!(build_grid_layers(GridStyle::None).is_empty());
        assert_eq!(build_grid_layers(GridStyle::Tropics).len(), 5);
        // -75..=75 step 15 -> 11 lat lines; -180..150 step 30 -> 12 lon lines
        assert_eq!(build_grid_layers(GridStyle::LatLong).len(), 23);
        // -80..=80 step 10 -> 17 lat lines; -180..160 step 20 -> 18 lon lines
        assert_eq!(build_grid_layers(GridStyle::Maidenhead).len(), 35);
    }

    #[tokio::test]
    async fn terminator_commit_places_three_wrap_copies() {
        let engine = test_engine();
        engine.set_settings(MapSettings {
            show_terminator: true,
            ..MapSettings::default()
        });
        let gen = engine.begin(OverlayKind::Terminator);
        engine.apply_terminator(1_710_936_000_000.0, gen).await;
        assert_eq!(group_len(&engine, OverlayKind::Terminator).await, 3);
        assert_eq!(engine.state(OverlayKind::Terminator), OverlayState::Rendered);
    }

    #[tokio::test]
    async fn sun_moon_markers() {
        let engine = test_engine();
        engine.set_settings(MapSettings {
            show_sun_moon: true,
            ..MapSettings::default()
        });
        let gen = engine.begin(OverlayKind::SunMoon);
        engine.apply_sun_moon(1_710_936_000_000.0, gen).await;
        assert_eq!(group_len(&engine, OverlayKind::SunMoon).await, 2);

        // Unusable clock: skip, leaving the previous markers in place
        let gen = engine.begin(OverlayKind::SunMoon);
        engine.apply_sun_moon(f64::NAN, gen).await;
        assert_eq!(group_len(&engine, OverlayKind::SunMoon).await, 2);
    }
}
