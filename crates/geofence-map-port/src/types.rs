// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Core overlay types for the map port contract.
//!
//! These are plain values; the engine adapter decides how to draw them.

use alloc::string::String;
use core::fmt;

/// Geographic position in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLng {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl LatLng {
    /// Construct a position.
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Opaque overlay handle minted by a surface.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverlayHandle(pub u64);

/// DOM id of a control injected inside popup markup.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ControlId(pub String);

impl ControlId {
    /// Wrap a DOM id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the DOM id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raster tile source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileLayer {
    /// URL template with `{z}/{x}/{y}` placeholders.
    pub url_template: String,
    /// Deepest zoom level served.
    pub max_zoom: u8,
    /// Attribution markup shown by the engine.
    pub attribution: String,
}

impl Default for TileLayer {
    fn default() -> Self {
        Self {
            url_template: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".into(),
            max_zoom: 19,
            attribution:
                "&copy; <a href=\"http://www.openstreetmap.org/copyright\">OpenStreetMap</a>"
                    .into(),
        }
    }
}

/// Initial map viewport.
#[derive(Clone, Debug, PartialEq)]
pub struct MapView {
    /// Center of the viewport.
    pub center: LatLng,
    /// Zoom level.
    pub zoom: u8,
    /// Tile layer to install.
    pub tiles: TileLayer,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center: LatLng::new(8.478491946468438, 124.64200829540064),
            zoom: 16,
            tiles: TileLayer::default(),
        }
    }
}

/// Stroke/fill styling for zone circles.
#[derive(Clone, Debug, PartialEq)]
pub struct CircleStyle {
    /// Stroke color (CSS color).
    pub color: String,
    /// Fill color (CSS color).
    pub fill_color: String,
    /// Fill opacity in `0.0..=1.0`.
    pub fill_opacity: f32,
}

impl Default for CircleStyle {
    fn default() -> Self {
        Self {
            color: "red".into(),
            fill_color: "#f03".into(),
            fill_opacity: 0.5,
        }
    }
}

/// Circle overlay definition.
#[derive(Clone, Debug, PartialEq)]
pub struct CircleDef {
    /// Circle center.
    pub center: LatLng,
    /// Radius in meters.
    pub radius_m: f64,
    /// Visual style.
    pub style: CircleStyle,
}

/// Marker icon geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerIcon {
    /// Icon image URL.
    pub url: String,
    /// Icon size in pixels.
    pub size: [f32; 2],
    /// Pixel of the icon that sits on the marker position.
    pub anchor: [f32; 2],
    /// Popup offset relative to the anchor.
    pub popup_anchor: [f32; 2],
}

impl Default for MarkerIcon {
    fn default() -> Self {
        Self {
            url: "/marker.ico".into(),
            size: [25.0, 25.0],
            anchor: [12.5, 25.0],
            popup_anchor: [1.0, -25.0],
        }
    }
}

/// Marker overlay definition.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerDef {
    /// Marker position.
    pub position: LatLng,
    /// Marker icon.
    pub icon: MarkerIcon,
}
