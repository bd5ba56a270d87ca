// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Map surface that draws into the log.

use std::collections::{BTreeSet, HashMap};

use geofence_map_port::{
    CircleDef, LatLng, MapSurface, MapView, MarkerDef, OverlayHandle, PopupContent, SurfaceError,
};
use tracing::{debug, info};

/// Every overlay operation becomes a `tracing` event on target `map`.
#[derive(Debug, Default)]
pub(crate) struct LogSurface {
    container: String,
    live: BTreeSet<OverlayHandle>,
    popups: HashMap<OverlayHandle, PopupContent>,
    open: Option<OverlayHandle>,
    next_handle: u64,
    disposed: bool,
}

impl LogSurface {
    /// Bind to a named container; blank names have nothing to bind to.
    pub(crate) fn open(container: &str) -> Result<Self, SurfaceError> {
        if container.trim().is_empty() {
            return Err(SurfaceError::ContainerUnavailable(container.to_string()));
        }
        info!(target: "map", container, "surface opened");
        Ok(Self {
            container: container.to_string(),
            ..Self::default()
        })
    }

    fn check(&self, handle: OverlayHandle) -> Result<(), SurfaceError> {
        if self.disposed {
            return Err(SurfaceError::Disposed);
        }
        if !self.live.contains(&handle) {
            return Err(SurfaceError::UnknownOverlay(handle));
        }
        Ok(())
    }

    fn mint(&mut self) -> Result<OverlayHandle, SurfaceError> {
        if self.disposed {
            return Err(SurfaceError::Disposed);
        }
        self.next_handle += 1;
        let handle = OverlayHandle(self.next_handle);
        self.live.insert(handle);
        Ok(handle)
    }
}

impl MapSurface for LogSurface {
    fn set_view(&mut self, view: &MapView) -> Result<(), SurfaceError> {
        if self.disposed {
            return Err(SurfaceError::Disposed);
        }
        info!(
            target: "map",
            lat = view.center.lat,
            lon = view.center.lng,
            zoom = view.zoom,
            tiles = %view.tiles.url_template,
            "view set"
        );
        Ok(())
    }

    fn add_circle(&mut self, def: &CircleDef) -> Result<OverlayHandle, SurfaceError> {
        let handle = self.mint()?;
        info!(
            target: "map",
            overlay = handle.0,
            lat = def.center.lat,
            lon = def.center.lng,
            radius_m = def.radius_m,
            color = %def.style.color,
            "circle added"
        );
        Ok(handle)
    }

    fn set_circle_center(
        &mut self,
        handle: OverlayHandle,
        center: LatLng,
    ) -> Result<(), SurfaceError> {
        self.check(handle)?;
        info!(target: "map", overlay = handle.0, lat = center.lat, lon = center.lng, "circle moved");
        Ok(())
    }

    fn set_circle_radius(
        &mut self,
        handle: OverlayHandle,
        radius_m: f64,
    ) -> Result<(), SurfaceError> {
        self.check(handle)?;
        info!(target: "map", overlay = handle.0, radius_m, "circle resized");
        Ok(())
    }

    fn add_marker(&mut self, def: &MarkerDef) -> Result<OverlayHandle, SurfaceError> {
        let handle = self.mint()?;
        info!(
            target: "map",
            overlay = handle.0,
            lat = def.position.lat,
            lon = def.position.lng,
            icon = %def.icon.url,
            "marker added"
        );
        Ok(handle)
    }

    fn set_marker_position(
        &mut self,
        handle: OverlayHandle,
        position: LatLng,
    ) -> Result<(), SurfaceError> {
        self.check(handle)?;
        info!(target: "map", overlay = handle.0, lat = position.lat, lon = position.lng, "marker moved");
        Ok(())
    }

    fn remove_overlay(&mut self, handle: OverlayHandle) -> Result<(), SurfaceError> {
        self.check(handle)?;
        self.live.remove(&handle);
        self.popups.remove(&handle);
        if self.open == Some(handle) {
            self.open = None;
        }
        info!(target: "map", overlay = handle.0, "overlay removed");
        Ok(())
    }

    fn bind_popup(
        &mut self,
        handle: OverlayHandle,
        content: &PopupContent,
    ) -> Result<(), SurfaceError> {
        self.check(handle)?;
        debug!(target: "map", overlay = handle.0, markup = %content.to_markup(), "popup bound");
        self.popups.insert(handle, content.clone());
        Ok(())
    }

    fn unbind_popup(&mut self, handle: OverlayHandle) -> Result<(), SurfaceError> {
        self.check(handle)?;
        if self.popups.remove(&handle).is_some() {
            debug!(target: "map", overlay = handle.0, "popup unbound");
        }
        if self.open == Some(handle) {
            self.open = None;
        }
        Ok(())
    }

    fn open_popup(&mut self, handle: OverlayHandle) -> Result<(), SurfaceError> {
        self.check(handle)?;
        let Some(content) = self.popups.get(&handle) else {
            return Err(SurfaceError::Backend(format!(
                "no popup bound to overlay {}",
                handle.0
            )));
        };
        let controls: Vec<&str> = content.control_ids().map(|id| id.as_str()).collect();
        info!(
            target: "map",
            overlay = handle.0,
            text = %content.text(),
            ?controls,
            "popup opened"
        );
        self.open = Some(handle);
        Ok(())
    }

    fn close_popup(&mut self) {
        if let Some(handle) = self.open.take() {
            info!(target: "map", overlay = handle.0, "popup closed");
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.live.clear();
        self.popups.clear();
        self.open = None;
        self.disposed = true;
        info!(target: "map", container = %self.container, "surface disposed");
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use geofence_map_port::{CircleStyle, MarkerIcon};

    #[test]
    fn blank_container_is_unavailable() {
        assert!(matches!(
            LogSurface::open("  "),
            Err(SurfaceError::ContainerUnavailable(_))
        ));
    }

    #[test]
    fn handles_are_tracked_until_removed() {
        let mut surface = LogSurface::open("geofence-map").unwrap();
        let circle = surface
            .add_circle(&CircleDef {
                center: LatLng::new(8.47, 124.64),
                radius_m: 20.0,
                style: CircleStyle::default(),
            })
            .unwrap();
        let marker = surface
            .add_marker(&MarkerDef {
                position: LatLng::new(8.48, 124.65),
                icon: MarkerIcon::default(),
            })
            .unwrap();
        assert_ne!(circle, marker);
        assert!(surface.open_popup(circle).is_err());
        surface
            .bind_popup(marker, &PopupContent::new().row("Address", "Y Ave"))
            .unwrap();
        surface.open_popup(marker).unwrap();
        surface.unbind_popup(marker).unwrap();
        assert!(surface.open_popup(marker).is_err());
        surface
            .bind_popup(circle, &PopupContent::new().row("Address", "X St"))
            .unwrap();
        surface.open_popup(circle).unwrap();
        surface.remove_overlay(circle).unwrap();
        assert_eq!(
            surface.set_circle_radius(circle, 5.0),
            Err(SurfaceError::UnknownOverlay(circle))
        );
        surface.dispose();
        assert_eq!(
            surface.set_marker_position(marker, LatLng::new(0.0, 0.0)),
            Err(SurfaceError::Disposed)
        );
    }
}
