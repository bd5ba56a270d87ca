// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Saved prefs to runtime settings.

use std::time::Duration;

use geofence_app_core::config::{ConfigService, ConfigStore};
use geofence_app_core::prefs::{ConsolePrefs, CONSOLE_PREFS_KEY};
use geofence_geocode::GeoapifyConfig;
use geofence_map_port::{CircleStyle, LatLng, MapView, MarkerIcon, TileLayer};
use geofence_sync::SessionConfig;
use tracing::warn;

/// Environment variable that overrides the saved API key.
pub(crate) const API_KEY_ENV: &str = "GEOAPIFY_API_KEY";

/// Best-effort prefs load: defaults are persisted on first run, anything
/// unreadable falls back to defaults.
pub(crate) fn load_prefs<S: ConfigStore>(config: &ConfigService<S>) -> ConsolePrefs {
    match config.load_or_init::<ConsolePrefs>(CONSOLE_PREFS_KEY) {
        Ok(prefs) => prefs,
        Err(err) => {
            warn!(?err, "console prefs unavailable; using defaults");
            ConsolePrefs::default()
        }
    }
}

pub(crate) fn session_config(prefs: &ConsolePrefs) -> SessionConfig {
    let [lat, lon] = prefs.map.center;
    SessionConfig {
        container: prefs.map.container.clone(),
        view: MapView {
            center: LatLng::new(lat, lon),
            zoom: prefs.map.zoom,
            tiles: TileLayer {
                url_template: prefs.map.tile_url.clone(),
                max_zoom: prefs.map.max_zoom,
                attribution: prefs.map.attribution.clone(),
            },
        },
        style: CircleStyle {
            color: prefs.fence.stroke_color.clone(),
            fill_color: prefs.fence.fill_color.clone(),
            fill_opacity: prefs.fence.fill_opacity.clamp(0.0, 1.0),
        },
        marker_icon: MarkerIcon::default(),
        default_radius_m: prefs.fence.default_radius_m,
    }
}

/// API key from the environment value if set, else from prefs.
pub(crate) fn api_key(prefs: &ConsolePrefs, env: Option<String>) -> Option<String> {
    env.filter(|key| !key.trim().is_empty())
        .or_else(|| prefs.geocoder.api_key.clone())
        .filter(|key| !key.trim().is_empty())
}

pub(crate) fn geocoder_config(prefs: &ConsolePrefs, api_key: String) -> GeoapifyConfig {
    GeoapifyConfig {
        endpoint: prefs.geocoder.endpoint.clone(),
        api_key,
        timeout: Duration::from_millis(prefs.geocoder.timeout_ms.max(1)),
    }
}
