//! Sample source clients.
//!
//! Fetches the raw measurements each overlay interpolates:
//! - NOAA SWPC OVATION aurora grid
//! - KC2G ionosonde stations (MUF 3000 km and foF2)
//! - Open-Meteo coarse weather grid, reduced to surface refractivity
//! - The dashboard's own VHF/APRS propagation and location endpoints
//!
//! Every response body goes through a tolerant parse step: empty or
//! missing arrays yield empty sample sets (render nothing), non-2xx and
//! malformed JSON are fetch failures (prior layer retained by the engine).

use crate::kind::PropagationSource;
use aprs_codec::Location;
use futures::future::join_all;
use geo_grid::normalize_lon;
use overlay_raster::{Blob, GridSample};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Upstream returned status: {0}")]
    BadStatus(u16),
    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Upstream endpoint URLs, overridable for tests and self-hosted mirrors.
#[derive(Debug, Clone)]
pub struct SourceEndpoints {
    pub aurora_url: String,
    pub kc2g_url: String,
    pub open_meteo_url: String,
    /// Dashboard propagation-data endpoint (VHF/APRS samples).
    pub propagation_url: String,
    /// Dashboard aprs-locations endpoint.
    pub locations_url: String,
}

impl Default for SourceEndpoints {
    fn default() -> Self {
        Self {
            aurora_url: "https://services.swpc.noaa.gov/json/ovation_aurora_latest.json".into(),
            kc2g_url: "https://prop.kc2g.com/api/stations.json".into(),
            open_meteo_url: "https://api.open-meteo.com/v1/forecast".into(),
            propagation_url: "http://127.0.0.1:8199/api/map/propagation-data".into(),
            locations_url: "http://127.0.0.1:8199/api/map/aprs-locations".into(),
        }
    }
}

/// Coarse global grid for the tropo overlay: 40 points per sweep keeps the
/// upstream request count small.
const TROPO_GRID_LAT: [f64; 5] = [-60.0, -30.0, 0.0, 30.0, 60.0];
const TROPO_GRID_LON: [f64; 8] = [-180.0, -135.0, -90.0, -45.0, 0.0, 45.0, 90.0, 135.0];

const FETCH_TIMEOUT_SEC: u64 = 25;

/// Samples plus optional coverage blobs from one propagation fetch.
#[derive(Debug, Clone, Default)]
pub struct PropagationData {
    pub samples: Vec<GridSample>,
    pub blobs: Vec<Blob>,
    pub value_label: String,
}

pub struct SourceClient {
    client: reqwest::Client,
    endpoints: SourceEndpoints,
}

impl SourceClient {
    pub fn new(endpoints: SourceEndpoints) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SEC))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, endpoints }
    }

    pub fn endpoints(&self) -> &SourceEndpoints {
        &self.endpoints
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(FetchError::BadStatus(response.status().as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| FetchError::RequestFailed(e.to_string()))
    }

    /// Aurora probability grid from NOAA SWPC OVATION.
    pub async fn fetch_aurora(&self) -> Result<Vec<GridSample>> {
        let body = self.get_text(&self.endpoints.aurora_url).await?;
        parse_aurora(&body)
    }

    /// Ionosonde samples for one of the KC2G-backed sources.
    pub async fn fetch_kc2g(&self, source: PropagationSource) -> Result<Vec<GridSample>> {
        let body = self.get_text(&self.endpoints.kc2g_url).await?;
        parse_kc2g_stations(&body, source)
    }

    /// Weather-derived surface refractivity over a coarse global grid.
    /// Points that fail to fetch are skipped rather than failing the sweep.
    pub async fn fetch_tropo(&self) -> Result<Vec<GridSample>> {
        let futures: Vec<_> = TROPO_GRID_LAT
            .iter()
            .flat_map(|lat| TROPO_GRID_LON.iter().map(move |lon| (*lat, *lon)))
            .map(|(lat, lon)| {
                let url = format!(
                    "{}?latitude={:.2}&longitude={:.2}&current=temperature_2m,relative_humidity_2m,surface_pressure&timezone=UTC",
                    self.endpoints.open_meteo_url, lat, lon
                );
                async move {
                    match self.get_text(&url).await.and_then(|b| parse_open_meteo_point(&b)) {
                        Ok((t, rh, p)) => Some(GridSample::new(lon, lat, refractivity(t, rh, p))),
                        Err(e) => {
                            debug!("Open-Meteo point {lat},{lon} failed: {e}");
                            None
                        }
                    }
                }
            })
            .collect();

        Ok(join_all(futures).await.into_iter().flatten().collect())
    }

    /// VHF/APRS propagation data from the dashboard endpoint.
    pub async fn fetch_vhf_aprs(&self, hours: f64) -> Result<PropagationData> {
        let url = format!(
            "{}?source=vhf_aprs&hours={hours}",
            self.endpoints.propagation_url
        );
        let body = self.get_text(&url).await?;
        parse_propagation_response(&body)
    }

    /// Propagation data for any source, dispatched per variant.
    pub async fn fetch_propagation(
        &self,
        source: PropagationSource,
        hours: f64,
    ) -> Result<PropagationData> {
        match source {
            PropagationSource::Kc2gMuf | PropagationSource::Kc2gFof2 => {
                Ok(PropagationData {
                    samples: self.fetch_kc2g(source).await?,
                    blobs: Vec::new(),
                    value_label: source.value_label().to_string(),
                })
            }
            PropagationSource::Tropo => Ok(PropagationData {
                samples: self.fetch_tropo().await?,
                blobs: Vec::new(),
                value_label: source.value_label().to_string(),
            }),
            PropagationSource::VhfAprs => self.fetch_vhf_aprs(hours).await,
        }
    }

    /// APRS station locations from the dashboard endpoint. Age filtering
    /// happens at render time, not here.
    pub async fn fetch_locations(&self, hours: f64) -> Result<Vec<Location>> {
        let url = format!("{}?hours={hours}", self.endpoints.locations_url);
        let body = self.get_text(&url).await?;
        parse_locations(&body)
    }
}

impl Default for SourceClient {
    fn default() -> Self {
        Self::new(SourceEndpoints::default())
    }
}

// ============================================================================
// Response body parsing
// ============================================================================

#[derive(Deserialize)]
struct CoordinatesBody {
    #[serde(default)]
    coordinates: Vec<Vec<f64>>,
}

/// OVATION coordinates arrive as [lon 0..359, lat, probability].
pub fn parse_aurora(body: &str) -> Result<Vec<GridSample>> {
    let parsed: CoordinatesBody =
        serde_json::from_str(body).map_err(|e| FetchError::ParseError(e.to_string()))?;
    Ok(parsed
        .coordinates
        .iter()
        .filter_map(|triple| {
            let [lon, lat, value] = triple.as_slice() else {
                return None;
            };
            GridSample::from_triple(&[normalize_lon(*lon), *lat, *value])
        })
        .collect())
}

/// KC2G stations.json: a list of station records carrying `mufd` and
/// `fof2` alongside a nested `station` position. Field values may arrive
/// as numbers or strings; both are accepted.
pub fn parse_kc2g_stations(body: &str, source: PropagationSource) -> Result<Vec<GridSample>> {
    let parsed: Value =
        serde_json::from_str(body).map_err(|e| FetchError::ParseError(e.to_string()))?;
    let Some(items) = parsed.as_array() else {
        return Err(FetchError::ParseError("stations response is not a list".into()));
    };
    let field = match source {
        PropagationSource::Kc2gMuf => "mufd",
        PropagationSource::Kc2gFof2 => "fof2",
        _ => return Err(FetchError::ParseError(format!("not a KC2G source: {source}"))),
    };
    Ok(items
        .iter()
        .filter_map(|item| {
            let station = item.get("station")?;
            let lat = loose_f64(station.get("latitude")?)?;
            let lon = normalize_lon(loose_f64(station.get("longitude")?)?);
            let value = loose_f64(item.get(field)?)?;
            GridSample::from_triple(&[lon, lat, value])
        })
        .collect())
}

#[derive(Deserialize)]
struct OpenMeteoBody {
    current: OpenMeteoCurrent,
}

#[derive(Deserialize)]
struct OpenMeteoCurrent {
    temperature_2m: Option<f64>,
    relative_humidity_2m: Option<f64>,
    surface_pressure: Option<f64>,
}

fn parse_open_meteo_point(body: &str) -> Result<(f64, f64, f64)> {
    let parsed: OpenMeteoBody =
        serde_json::from_str(body).map_err(|e| FetchError::ParseError(e.to_string()))?;
    match (
        parsed.current.temperature_2m,
        parsed.current.relative_humidity_2m,
        parsed.current.surface_pressure,
    ) {
        (Some(t), Some(rh), Some(p)) => Ok((t, rh, p)),
        _ => Err(FetchError::ParseError("missing current weather fields".into())),
    }
}

/// Surface refractivity N from temperature (C), relative humidity (%), and
/// pressure (hPa), ITU-R P.453 form. Implausible inputs collapse to a
/// standard-atmosphere 280.
pub fn refractivity(t_c: f64, rh_pct: f64, p_hpa: f64) -> f64 {
    if !(t_c.abs() < 100.0 && (0.0..=100.0).contains(&rh_pct) && (500.0..1100.0).contains(&p_hpa)) {
        return 280.0;
    }
    let t_k = t_c + 273.15;
    let es = 6.112 * (17.62 * t_c / (243.12 + t_c)).exp();
    let e = (rh_pct / 100.0) * es;
    let n_dry = 77.6 * (p_hpa / t_k);
    let n_wet = 4810.0 * (e / (t_k * t_k));
    n_dry + n_wet
}

#[derive(Deserialize)]
struct WireBlob {
    lat: f64,
    lon: f64,
    #[serde(default)]
    hull: Vec<Vec<f64>>,
    #[serde(rename = "maxDist", default)]
    max_dist: f64,
}

#[derive(Deserialize)]
struct PropagationBody {
    #[serde(default)]
    coordinates: Vec<Vec<f64>>,
    #[serde(default)]
    blobs: Vec<WireBlob>,
    #[serde(rename = "valueLabel", default)]
    value_label: String,
}

/// Dashboard propagation response: grid `coordinates` plus optional
/// cluster `blobs` (hull vertices in [lat, lon] order).
pub fn parse_propagation_response(body: &str) -> Result<PropagationData> {
    let parsed: PropagationBody =
        serde_json::from_str(body).map_err(|e| FetchError::ParseError(e.to_string()))?;
    let samples = parsed
        .coordinates
        .iter()
        .filter_map(|t| GridSample::from_triple(t))
        .collect();
    let blobs = parsed
        .blobs
        .into_iter()
        .filter_map(|wb| {
            let hull: Vec<geo_grid::GeoPoint> = wb
                .hull
                .iter()
                .filter_map(|pair| match pair.as_slice() {
                    [lat, lon] => Some(geo_grid::GeoPoint::new(*lat, *lon)),
                    _ => None,
                })
                .collect();
            if hull.len() < 3 {
                return None;
            }
            Some(Blob {
                center: geo_grid::GeoPoint::new(wb.lat, wb.lon),
                hull,
                intensity: wb.max_dist,
            })
        })
        .collect();
    Ok(PropagationData {
        samples,
        blobs,
        value_label: parsed.value_label,
    })
}

#[derive(Deserialize)]
struct LocationsBody {
    #[serde(default)]
    locations: Vec<WireLocation>,
}

#[derive(Deserialize)]
struct WireLocation {
    callsign: String,
    lat: f64,
    lon: f64,
    #[serde(rename = "lastSeen")]
    last_seen: f64,
    #[serde(rename = "symbolTable", default)]
    symbol_table: String,
    #[serde(default)]
    symbol: String,
}

pub fn parse_locations(body: &str) -> Result<Vec<Location>> {
    let parsed: LocationsBody =
        serde_json::from_str(body).map_err(|e| FetchError::ParseError(e.to_string()))?;
    Ok(parsed
        .locations
        .into_iter()
        .filter(|l| l.lat.abs() <= 90.0 && l.lon.abs() <= 180.0)
        .map(|l| Location {
            callsign: l.callsign,
            lat: l.lat,
            lon: l.lon,
            last_seen: l.last_seen,
            symbol_table: l.symbol_table.chars().next().unwrap_or('/'),
            symbol: l.symbol.chars().next().unwrap_or('?'),
        })
        .collect())
}

/// JSON number or numeric string.
fn loose_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
