//! Overlay categories and propagation sources as enum dispatch: each
//! variant declares its own refresh cadence, value range, and color ramp.

use overlay_raster::{ColorRamp, ValueRange};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One overlay category. Each category owns exactly one layer group on the
/// map surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    Terminator,
    SunMoon,
    Aurora,
    HfPropagation,
    VhfPropagation,
    AprsLocations,
    Grid,
}

pub const KIND_COUNT: usize = 7;

impl OverlayKind {
    pub const ALL: [OverlayKind; KIND_COUNT] = [
        OverlayKind::Terminator,
        OverlayKind::SunMoon,
        OverlayKind::Aurora,
        OverlayKind::HfPropagation,
        OverlayKind::VhfPropagation,
        OverlayKind::AprsLocations,
        OverlayKind::Grid,
    ];

    pub fn index(self) -> usize {
        match self {
            OverlayKind::Terminator => 0,
            OverlayKind::SunMoon => 1,
            OverlayKind::Aurora => 2,
            OverlayKind::HfPropagation => 3,
            OverlayKind::VhfPropagation => 4,
            OverlayKind::AprsLocations => 5,
            OverlayKind::Grid => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OverlayKind::Terminator => "terminator",
            OverlayKind::SunMoon => "sun_moon",
            OverlayKind::Aurora => "aurora",
            OverlayKind::HfPropagation => "hf_propagation",
            OverlayKind::VhfPropagation => "vhf_propagation",
            OverlayKind::AprsLocations => "aprs_locations",
            OverlayKind::Grid => "grid",
        }
    }

    /// Refresh cadence. Time-dependent categories recompute every minute;
    /// fetched categories every five. The grid is static and only redraws
    /// on a settings change.
    pub fn refresh_interval(self) -> Option<Duration> {
        match self {
            OverlayKind::Terminator | OverlayKind::SunMoon => Some(Duration::from_secs(60)),
            OverlayKind::Aurora
            | OverlayKind::HfPropagation
            | OverlayKind::VhfPropagation
            | OverlayKind::AprsLocations => Some(Duration::from_secs(300)),
            OverlayKind::Grid => None,
        }
    }

    /// Value window for raster categories; None for marker/line categories.
    pub fn value_range(self) -> Option<ValueRange> {
        match self {
            OverlayKind::Aurora => Some(ValueRange::new(10.0, 100.0)),
            _ => None,
        }
    }

    pub fn ramp(self) -> Option<ColorRamp> {
        match self {
            OverlayKind::Aurora => Some(ColorRamp::aurora()),
            _ => None,
        }
    }
}

impl std::fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the propagation overlay takes its samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationSource {
    /// KC2G ionosonde network, MUF(3000) in MHz.
    Kc2gMuf,
    /// KC2G ionosonde network, foF2 critical frequency in MHz.
    Kc2gFof2,
    /// Weather-derived surface refractivity grid (N-units).
    Tropo,
    /// VHF path reports from the APRS network (path km).
    VhfAprs,
}

impl PropagationSource {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "kc2g_muf" => Some(Self::Kc2gMuf),
            "kc2g_fof2" => Some(Self::Kc2gFof2),
            "tropo" => Some(Self::Tropo),
            "vhf_aprs" => Some(Self::VhfAprs),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kc2gMuf => "kc2g_muf",
            Self::Kc2gFof2 => "kc2g_fof2",
            Self::Tropo => "tropo",
            Self::VhfAprs => "vhf_aprs",
        }
    }

    /// Which overlay category this source renders into.
    pub fn overlay_kind(self) -> OverlayKind {
        match self {
            Self::VhfAprs => OverlayKind::VhfPropagation,
            _ => OverlayKind::HfPropagation,
        }
    }

    pub fn value_label(self) -> &'static str {
        match self {
            Self::Kc2gMuf => "MUF",
            Self::Kc2gFof2 => "foF2",
            Self::Tropo => "Tropo",
            Self::VhfAprs => "VHF path km",
        }
    }

    /// Each source declares the value window it will draw.
    pub fn value_range(self) -> ValueRange {
        match self {
            Self::Kc2gMuf => ValueRange::new(3.0, 35.0),
            Self::Kc2gFof2 => ValueRange::new(1.0, 15.0),
            Self::Tropo => ValueRange::new(250.0, 400.0),
            Self::VhfAprs => ValueRange::new(20.0, 800.0),
        }
    }

    pub fn ramp(self) -> ColorRamp {
        match self {
            Self::Kc2gMuf => ColorRamp::muf(),
            Self::Kc2gFof2 => ColorRamp::fof2(),
            Self::Tropo => ColorRamp::tropo(),
            Self::VhfAprs => ColorRamp::vhf_path(),
        }
    }
}

impl std::fmt::Display for PropagationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trip() {
        for s in [
            PropagationSource::Kc2gMuf,
            PropagationSource::Kc2gFof2,
            PropagationSource::Tropo,
            PropagationSource::VhfAprs,
        ] {
            assert_eq!(PropagationSource::from_str(s.as_str()), Some(s));
        }
        assert_eq!(PropagationSource::from_str("bogus"), None);
    }

    #[test]
    fn indexes_are_dense_and_unique() {
        let mut seen = [false; KIND_COUNT];
        for k in OverlayKind::ALL {
            assert!(!seen[k.index()]);
            seen[k.index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn fetched_kinds_have_five_minute_cadence() {
        assert_eq!(
            OverlayKind::Aurora.refresh_interval(),
            Some(Duration::from_secs(300))
        );
        assert_eq!(OverlayKind::Grid.refresh_interval(), None);
        assert_eq!(
            OverlayKind::Terminator.refresh_interval(),
            Some(Duration::from_secs(60))
        );
    }
}
