//! Map overlay API routes.
//!
//! Mirrors the dashboard's map module API surface:
//! - `GET /api/map/propagation-data?source=&hours=` — grid samples and
//!   coverage blobs for the propagation overlay
//! - `GET /api/map/aprs-locations?hours=` — station locations from the
//!   local packet window (no live APRS-IS connection)
//! - `POST /api/map/aprs-packets` — TNC2 ingest feeding that window
//! - `GET /api/map/overlay/:kind` — the engine's rendered raster as PNG
//! - `GET|POST /api/map/settings` — resolved cell settings

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use aprs_codec::{clamp_window_hours, Location, MAX_WINDOW_HOURS};
use overlay_engine::{
    MapSettings, OverlayKind, PropagationSource, RawMapSettings,
};
use overlay_raster::Blob;

use crate::{png_out, AppState};

pub fn map_router(state: AppState) -> Router {
    Router::new()
        .route("/propagation-data", get(propagation_data))
        .route("/aprs-locations", get(aprs_locations))
        .route("/aprs-packets", post(ingest_packets))
        .route("/overlay/:kind", get(overlay_png))
        .route("/settings", get(get_settings).post(put_settings))
        .with_state(state)
}

#[derive(Deserialize)]
pub struct PropagationQuery {
    pub source: Option<String>,
    pub hours: Option<f64>,
}

/// Propagation payload in the dashboard wire shape.
#[derive(Serialize, Clone, Default)]
pub struct PropagationDataResponse {
    pub coordinates: Vec<[f64; 3]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<[f64; 5]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blobs: Vec<WireBlob>,
    #[serde(rename = "valueLabel")]
    pub value_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Coverage blob in the wire shape: hull vertices are [lat, lon].
#[derive(Serialize, Clone)]
pub struct WireBlob {
    pub lat: f64,
    pub lon: f64,
    pub hull: Vec<[f64; 2]>,
    #[serde(rename = "maxDist")]
    pub max_dist: f64,
}

impl From<&Blob> for WireBlob {
    fn from(blob: &Blob) -> Self {
        Self {
            lat: blob.center.lat,
            lon: blob.center.lon,
            hull: blob.hull.iter().map(|p| [p.lat, p.lon]).collect(),
            max_dist: blob.intensity,
        }
    }
}

async fn propagation_data(
    State(state): State<AppState>,
    Query(query): Query<PropagationQuery>,
) -> Response {
    let Some(source) = query.source.as_deref().and_then(PropagationSource::from_str) else {
        let body = PropagationDataResponse {
            error: Some("Invalid source".into()),
            ..Default::default()
        };
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };
    debug!("GET propagation-data source={source} hours={:?}", query.hours);
    let hours = clamp_window_hours(query.hours);

    if source == PropagationSource::VhfAprs {
        let cutoff = now_s() - hours * 3600.0;
        let window = state.window.read().await;
        let body = PropagationDataResponse {
            coordinates: window
                .segment_coords(cutoff)
                .iter()
                .map(|s| [s.lon, s.lat, s.value])
                .collect(),
            segments: window
                .path_segments(cutoff)
                .iter()
                .map(|s| [s.from.lon, s.from.lat, s.to.lon, s.to.lat, s.distance_km])
                .collect(),
            blobs: window.coverage_blobs(cutoff).iter().map(WireBlob::from).collect(),
            value_label: source.value_label().to_string(),
            error: None,
        };
        return Json(body).into_response();
    }

    // Upstream-backed sources go through the TTL cache.
    let cache_key = source.as_str().to_string();
    {
        let mut cache = state.propagation_cache.write().await;
        if let Some(entry) = cache.get(&cache_key) {
            return Json(entry.value.clone()).into_response();
        }
    }
    match state.sources.fetch_propagation(source, hours).await {
        Ok(data) => {
            let body = PropagationDataResponse {
                coordinates: data
                    .samples
                    .iter()
                    .map(|s| [s.lon, s.lat, s.value])
                    .collect(),
                segments: Vec::new(),
                blobs: Vec::new(),
                value_label: data.value_label,
                error: None,
            };
            state
                .propagation_cache
                .write()
                .await
                .put(cache_key, body.clone());
            Json(body).into_response()
        }
        Err(e) => {
            debug!("Propagation data failed: {e}");
            let body = PropagationDataResponse {
                error: Some("Failed to fetch propagation data".into()),
                value_label: String::new(),
                ..Default::default()
            };
            (StatusCode::BAD_GATEWAY, Json(body)).into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct LocationsQuery {
    pub hours: Option<f64>,
}

#[derive(Serialize)]
pub struct LocationsResponse {
    pub locations: Vec<WireLocation>,
}

/// Station location in the wire shape.
#[derive(Serialize)]
pub struct WireLocation {
    pub callsign: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "lastSeen")]
    pub last_seen: f64,
    #[serde(rename = "symbolTable")]
    pub symbol_table: String,
    pub symbol: String,
}

impl From<Location> for WireLocation {
    fn from(l: Location) -> Self {
        Self {
            callsign: l.callsign,
            lat: l.lat,
            lon: l.lon,
            last_seen: l.last_seen,
            symbol_table: l.symbol_table.to_string(),
            symbol: l.symbol.to_string(),
        }
    }
}

async fn aprs_locations(
    State(state): State<AppState>,
    Query(query): Query<LocationsQuery>,
) -> Json<LocationsResponse> {
    let hours = clamp_window_hours(query.hours);
    let cutoff = now_s() - hours * 3600.0;
    let window = state.window.read().await;
    Json(LocationsResponse {
        locations: window
            .locations(cutoff)
            .into_iter()
            .map(WireLocation::from)
            .collect(),
    })
}

#[derive(Deserialize)]
pub struct IngestRequest {
    pub packets: Vec<String>,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub ingested: usize,
    pub stations: usize,
}

/// Feed TNC2 lines into the packet window. The window is pruned to the
/// maximum supported lookback on every ingest.
async fn ingest_packets(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Json<IngestResponse> {
    let now = now_s();
    let mut window = state.window.write().await;
    for line in &req.packets {
        window.ingest(line, now);
    }
    window.prune(now - MAX_WINDOW_HOURS * 3600.0);
    Json(IngestResponse {
        ingested: req.packets.len(),
        stations: window.station_count(),
    })
}

/// The engine's current raster for a category, as PNG. 404 for categories
/// without a raster form, 503 while nothing has rendered yet.
async fn overlay_png(State(state): State<AppState>, Path(kind): Path<String>) -> Response {
    let kind = match kind.as_str() {
        "terminator" => OverlayKind::Terminator,
        "aurora" => OverlayKind::Aurora,
        "hf_propagation" => OverlayKind::HfPropagation,
        "vhf_propagation" => OverlayKind::VhfPropagation,
        _ => return (StatusCode::NOT_FOUND, "unknown overlay").into_response(),
    };
    let store = state.store.read().await;
    let Some(image) = store.raster(kind) else {
        return (StatusCode::SERVICE_UNAVAILABLE, "overlay not rendered").into_response();
    };
    match png_out::encode_png(&image.raster) {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Err(e) => {
            debug!("PNG encode failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "encode failed").into_response()
        }
    }
}

async fn get_settings(State(state): State<AppState>) -> Json<MapSettings> {
    Json(state.engine.settings())
}

/// Replace the cell settings wholesale and kick a refresh of every enabled
/// overlay in the background.
async fn put_settings(
    State(state): State<AppState>,
    Json(raw): Json<RawMapSettings>,
) -> Json<MapSettings> {
    state.engine.apply_settings(&raw).await;
    let engine = state.engine.clone();
    tokio::spawn(async move { engine.refresh_all().await });
    Json(state.engine.settings())
}

fn now_s() -> f64 {
    chrono::Utc::now().timestamp() as f64
}
