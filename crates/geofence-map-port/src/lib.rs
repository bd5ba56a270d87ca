// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Map surface port contract for the geofence console.
//!
//! This crate defines the contract between the sync layer and whatever map
//! engine draws the overlays (a browser map, a native widget, a log sink).
//!
//! # Design Principles
//!
//! - **Surfaces are dumb**: they add, move and remove what they are told. No record logic.
//! - **Handles are opaque**: the surface mints [`OverlayHandle`]s; callers only hand them back.
//! - **One open popup**: opening a popup closes whichever one was open.
//!
//! # Crate Features
//!
//! - `std` (default): Enables std library. Disable for no_std contexts.

#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

use thiserror::Error;

/// Error type for surface operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// The container the map should bind to does not exist.
    #[error("container unavailable: {0}")]
    ContainerUnavailable(alloc::string::String),
    /// The handle does not name a live overlay on this surface.
    #[error("unknown overlay: {0:?}")]
    UnknownOverlay(OverlayHandle),
    /// The surface has been disposed.
    #[error("surface disposed")]
    Disposed,
    /// A backend-specific error occurred.
    #[error("backend error: {0}")]
    Backend(alloc::string::String),
}

mod popup;
mod port;
mod types;

pub use popup::{PopupContent, PopupControl, PopupRow};
pub use port::MapSurface;
pub use types::{
    CircleDef, CircleStyle, ControlId, LatLng, MapView, MarkerDef, MarkerIcon, OverlayHandle,
    TileLayer,
};
