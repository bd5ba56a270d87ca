// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Saved console preferences (map view, fence styling, geocoder, store).

use serde::{Deserialize, Serialize};

/// Config key the console stores its preferences under.
pub const CONSOLE_PREFS_KEY: &str = "console";

/// Everything the console reads at startup.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ConsolePrefs {
    /// Map container and viewport.
    pub map: MapPrefs,
    /// Zone circle styling and candidate defaults.
    pub fence: FencePrefs,
    /// Reverse-geocoding endpoint.
    pub geocoder: GeocoderPrefs,
    /// Backing store location.
    pub store: StorePrefs,
}

/// Map container and viewport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapPrefs {
    /// Container id the map binds to.
    pub container: String,
    /// Initial center `[lat, lon]`.
    pub center: [f64; 2],
    /// Initial zoom.
    pub zoom: u8,
    /// Tile URL template.
    pub tile_url: String,
    /// Deepest tile zoom.
    pub max_zoom: u8,
    /// Tile attribution markup.
    pub attribution: String,
}

impl Default for MapPrefs {
    fn default() -> Self {
        Self {
            container: "geofence-map".into(),
            center: [8.478491946468438, 124.64200829540064],
            zoom: 16,
            tile_url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".into(),
            max_zoom: 19,
            attribution:
                "&copy; <a href=\"http://www.openstreetmap.org/copyright\">OpenStreetMap</a>"
                    .into(),
        }
    }
}

/// Zone circle styling and candidate defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FencePrefs {
    /// Stroke color.
    pub stroke_color: String,
    /// Fill color.
    pub fill_color: String,
    /// Fill opacity.
    pub fill_opacity: f32,
    /// Radius (meters) given to a freshly placed candidate.
    pub default_radius_m: u32,
}

impl Default for FencePrefs {
    fn default() -> Self {
        Self {
            stroke_color: "red".into(),
            fill_color: "#f03".into(),
            fill_opacity: 0.5,
            default_radius_m: 10,
        }
    }
}

/// Reverse-geocoding endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeocoderPrefs {
    /// Base URL of the reverse endpoint.
    pub endpoint: String,
    /// API key; the `GEOAPIFY_API_KEY` environment variable wins when set.
    pub api_key: Option<String>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for GeocoderPrefs {
    fn default() -> Self {
        Self {
            endpoint: "https://api.geoapify.com/v1/geocode/reverse".into(),
            api_key: None,
            timeout_ms: 10_000,
        }
    }
}

/// Backing store location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorePrefs {
    /// JSON file holding the geofence collection.
    pub path: String,
    /// How often subscribers re-read the file, in milliseconds.
    pub poll_ms: u64,
}

impl Default for StorePrefs {
    fn default() -> Self {
        Self {
            path: "geofences.json".into(),
            poll_ms: 500,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn partial_prefs_fill_in_defaults() {
        let prefs: ConsolePrefs =
            serde_json::from_str(r#"{"fence":{"default_radius_m":25}}"#).expect("decode");
        assert_eq!(prefs.fence.default_radius_m, 25);
        assert_eq!(prefs.fence.stroke_color, "red");
        assert_eq!(prefs.map.zoom, 16);
        assert_eq!(prefs.store.poll_ms, 500);
    }
}
