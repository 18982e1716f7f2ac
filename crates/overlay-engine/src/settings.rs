//! Per-cell settings resolution.
//!
//! Raw settings arrive as loosely-typed JSON (form values are strings, API
//! callers send numbers and booleans). Resolution never fails: every field
//! is optional, invalid values fall back to documented defaults, and the
//! resolved struct is rebuilt wholesale on every settings change or refresh
//! tick — never partially mutated.

use crate::kind::PropagationSource;
use aprs_codec::clamp_window_hours;
use geo_grid::{parse_center, GeoPoint};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapStyle {
    Carto,
    OpenTopoMap,
    Esri,
    NasaGibs,
}

impl MapStyle {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "carto" => Some(Self::Carto),
            "opentopomap" => Some(Self::OpenTopoMap),
            "esri" => Some(Self::Esri),
            "nasagibs" => Some(Self::NasaGibs),
            _ => None,
        }
    }

    /// NASA GIBS night-lights tiles stop at zoom 8.
    pub fn max_zoom(self) -> u8 {
        match self {
            Self::NasaGibs => 8,
            Self::OpenTopoMap => 17,
            Self::Esri => 19,
            Self::Carto => 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileStyle {
    CartoVoyager,
    CartoPositron,
    CartoPositronNolabels,
    CartoDark,
    CartoDarkNolabels,
    OtmDefault,
    EsriImagery,
    NasaNightlights,
}

impl TileStyle {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "carto_voyager" => Some(Self::CartoVoyager),
            "carto_positron" => Some(Self::CartoPositron),
            "carto_positron_nolabels" => Some(Self::CartoPositronNolabels),
            "carto_dark" => Some(Self::CartoDark),
            "carto_dark_nolabels" => Some(Self::CartoDarkNolabels),
            "otm_default" => Some(Self::OtmDefault),
            "esri_imagery" => Some(Self::EsriImagery),
            "nasa_nightlights" => Some(Self::NasaNightlights),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridStyle {
    None,
    Tropics,
    LatLong,
    Maidenhead,
}

impl GridStyle {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "tropics" => Some(Self::Tropics),
            "latlong" => Some(Self::LatLong),
            "maidenhead" => Some(Self::Maidenhead),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AprsDisplayMode {
    Symbols,
    Dots,
}

/// Raw per-cell settings as delivered by the configuration system.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMapSettings {
    #[serde(default)]
    pub map_style: Option<Value>,
    #[serde(default)]
    pub tile_style: Option<Value>,
    #[serde(default)]
    pub zoom: Option<Value>,
    #[serde(default)]
    pub center: Option<Value>,
    #[serde(default)]
    pub grid_style: Option<Value>,
    #[serde(default)]
    pub show_terminator: Option<Value>,
    #[serde(default)]
    pub show_sun_moon: Option<Value>,
    #[serde(default)]
    pub show_aurora: Option<Value>,
    #[serde(default)]
    pub aurora_opacity: Option<Value>,
    #[serde(default)]
    pub propagation_source: Option<Value>,
    #[serde(default)]
    pub propagation_opacity: Option<Value>,
    #[serde(default)]
    pub propagation_aprs_hours: Option<Value>,
    #[serde(default)]
    pub show_aprs_locations: Option<Value>,
    #[serde(default)]
    pub aprs_display_mode: Option<Value>,
    #[serde(default)]
    pub aprs_filter: Option<Value>,
}

/// Resolved map settings. Always complete; see field docs for defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapSettings {
    /// Default carto.
    pub map_style: MapStyle,
    /// Default carto_voyager.
    pub tile_style: TileStyle,
    /// 0-18, clamped to the style's max; default 2.
    pub zoom: u8,
    /// Decimal pair, DMS, or Maidenhead locator; default (20, 0).
    pub center: GeoPoint,
    /// Default none.
    pub grid_style: GridStyle,
    pub show_terminator: bool,
    pub show_sun_moon: bool,
    pub show_aurora: bool,
    /// 0-100, default 50.
    pub aurora_opacity: u8,
    /// None disables the propagation overlay.
    pub propagation_source: Option<PropagationSource>,
    /// 0-100, default 60.
    pub propagation_opacity: u8,
    /// Lookback for VHF/APRS data, clamped to 0.25-168; default 6.
    pub propagation_aprs_hours: f64,
    pub show_aprs_locations: bool,
    pub aprs_display_mode: AprsDisplayMode,
    /// Callsign prefixes; empty means no filtering.
    pub aprs_filter: Vec<String>,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            map_style: MapStyle::Carto,
            tile_style: TileStyle::CartoVoyager,
            zoom: 2,
            center: GeoPoint::new(20.0, 0.0),
            grid_style: GridStyle::None,
            show_terminator: false,
            show_sun_moon: false,
            show_aurora: false,
            aurora_opacity: 50,
            propagation_source: None,
            propagation_opacity: 60,
            propagation_aprs_hours: 6.0,
            show_aprs_locations: false,
            aprs_display_mode: AprsDisplayMode::Symbols,
            aprs_filter: Vec::new(),
        }
    }
}

impl RawMapSettings {
    /// Resolve raw values against the defaults. Never fails.
    pub fn resolve(&self) -> MapSettings {
        let defaults = MapSettings::default();

        let map_style = as_string(&self.map_style)
            .and_then(|s| MapStyle::from_str(&s))
            .unwrap_or(defaults.map_style);
        let tile_style = as_string(&self.tile_style)
            .and_then(|s| TileStyle::from_str(&s))
            .unwrap_or(defaults.tile_style);

        let zoom = as_f64(&self.zoom)
            .filter(|z| (0.0..=18.0).contains(z))
            .map(|z| z as u8)
            .unwrap_or(defaults.zoom)
            .min(map_style.max_zoom());

        let center = as_string(&self.center)
            .map(|s| parse_center(&s, defaults.center))
            .unwrap_or(defaults.center);

        MapSettings {
            map_style,
            tile_style,
            zoom,
            center,
            grid_style: as_string(&self.grid_style)
                .and_then(|s| GridStyle::from_str(&s))
                .unwrap_or(defaults.grid_style),
            show_terminator: as_flag(&self.show_terminator).unwrap_or(defaults.show_terminator),
            show_sun_moon: as_flag(&self.show_sun_moon).unwrap_or(defaults.show_sun_moon),
            show_aurora: as_flag(&self.show_aurora).unwrap_or(defaults.show_aurora),
            aurora_opacity: as_opacity(&self.aurora_opacity).unwrap_or(defaults.aurora_opacity),
            propagation_source: as_string(&self.propagation_source)
                .and_then(|s| PropagationSource::from_str(&s)),
            propagation_opacity: as_opacity(&self.propagation_opacity)
                .unwrap_or(defaults.propagation_opacity),
            propagation_aprs_hours: clamp_window_hours(as_f64(&self.propagation_aprs_hours)),
            show_aprs_locations: as_flag(&self.show_aprs_locations)
                .unwrap_or(defaults.show_aprs_locations),
            aprs_display_mode: match as_string(&self.aprs_display_mode).as_deref() {
                Some("dots") => AprsDisplayMode::Dots,
                Some("symbols") => AprsDisplayMode::Symbols,
                _ => defaults.aprs_display_mode,
            },
            aprs_filter: as_string(&self.aprs_filter)
                .map(|s| {
                    s.split(',')
                        .map(|p| p.trim().to_ascii_uppercase())
                        .filter(|p| !p.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.aprs_filter),
        }
    }
}

fn as_string(v: &Option<Value>) -> Option<String> {
    match v {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn as_f64(v: &Option<Value>) -> Option<f64> {
    match v {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// On/off settings come through as "1"/"0" form values or JSON booleans.
fn as_flag(v: &Option<Value>) -> Option<bool> {
    match v {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => match s.trim() {
            "1" => Some(true),
            "0" => Some(false),
            _ => None,
        },
        Some(Value::Number(n)) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

fn as_opacity(v: &Option<Value>) -> Option<u8> {
    as_f64(v).filter(|o| (0.0..=100.0).contains(o)).map(|o| o as u8)
}
