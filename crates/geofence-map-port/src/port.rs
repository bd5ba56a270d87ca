// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Map surface trait defining the overlay contract.

use crate::{CircleDef, LatLng, MapView, MarkerDef, OverlayHandle, PopupContent, SurfaceError};

/// Map surface port trait.
///
/// One surface is bound to one container for its whole life. The owner drives
/// it from a single task; nothing here is expected to be thread-safe.
///
/// # Popups
///
/// Popup content is plain markup injected by the engine. The engine only
/// reports that a popup opened or closed; wiring the controls inside it is
/// the caller's job (see the dispatcher in the sync layer).
pub trait MapSurface {
    /// Center/zoom the map and install its tile layer.
    fn set_view(&mut self, view: &MapView) -> Result<(), SurfaceError>;

    /// Add a circle overlay.
    fn add_circle(&mut self, def: &CircleDef) -> Result<OverlayHandle, SurfaceError>;

    /// Move a circle without changing its radius.
    fn set_circle_center(
        &mut self,
        handle: OverlayHandle,
        center: LatLng,
    ) -> Result<(), SurfaceError>;

    /// Resize a circle without moving its center.
    fn set_circle_radius(
        &mut self,
        handle: OverlayHandle,
        radius_m: f64,
    ) -> Result<(), SurfaceError>;

    /// Add a marker overlay.
    fn add_marker(&mut self, def: &MarkerDef) -> Result<OverlayHandle, SurfaceError>;

    /// Move a marker.
    fn set_marker_position(
        &mut self,
        handle: OverlayHandle,
        position: LatLng,
    ) -> Result<(), SurfaceError>;

    /// Remove an overlay (and any popup bound to it).
    fn remove_overlay(&mut self, handle: OverlayHandle) -> Result<(), SurfaceError>;

    /// Bind (or replace) the popup attached to an overlay.
    fn bind_popup(
        &mut self,
        handle: OverlayHandle,
        content: &PopupContent,
    ) -> Result<(), SurfaceError>;

    /// Drop the popup bound to an overlay, closing it if open (no-op when none
    /// is bound).
    fn unbind_popup(&mut self, handle: OverlayHandle) -> Result<(), SurfaceError>;

    /// Open the popup bound to an overlay, closing any other open popup.
    fn open_popup(&mut self, handle: OverlayHandle) -> Result<(), SurfaceError>;

    /// Close whichever popup is open (no-op when none is).
    fn close_popup(&mut self);

    /// Release the surface and everything drawn on it.
    fn dispose(&mut self);
}
