// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Headless map surface for testing the sync layer without a map engine.
//!
//! `MockSurface` keeps overlays in ordered maps and counts every mutating
//! call. Clones share state: hand one clone to a session and keep another to
//! inspect the map after the session has taken ownership.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use geofence_map_port::{
    CircleDef, LatLng, MapSurface, MapView, MarkerDef, OverlayHandle, PopupContent, SurfaceError,
};

/// Counters for overlay operations issued against a [`MockSurface`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceOps {
    /// Circles and markers added.
    pub adds: usize,
    /// Overlays removed.
    pub removes: usize,
    /// Circle/marker moves.
    pub moves: usize,
    /// Circle radius changes.
    pub resizes: usize,
    /// Popup (re)binds.
    pub popup_binds: usize,
}

impl SurfaceOps {
    /// Adds plus removes: the structural churn of a pass.
    pub fn structural(&self) -> usize {
        self.adds + self.removes
    }
}

/// Mock map surface for testing.
#[derive(Clone, Default)]
pub struct MockSurface {
    inner: Arc<Mutex<MockSurfaceInner>>,
}

#[derive(Default)]
struct MockSurfaceInner {
    view: Option<MapView>,
    circles: BTreeMap<OverlayHandle, CircleDef>,
    markers: BTreeMap<OverlayHandle, MarkerDef>,
    popups: HashMap<OverlayHandle, PopupContent>,
    open_popup: Option<OverlayHandle>,
    next_handle: u64,
    ops: SurfaceOps,
    fail_adds: usize,
    fail_circle_moves: usize,
    disposed: bool,
}

impl MockSurfaceInner {
    fn live(&self) -> Result<(), SurfaceError> {
        if self.disposed {
            return Err(SurfaceError::Disposed);
        }
        Ok(())
    }

    fn mint(&mut self) -> Result<OverlayHandle, SurfaceError> {
        self.live()?;
        if self.fail_adds > 0 {
            self.fail_adds -= 1;
            return Err(SurfaceError::Backend("simulated add failure".into()));
        }
        self.next_handle += 1;
        self.ops.adds += 1;
        Ok(OverlayHandle(self.next_handle))
    }

    fn exists(&self, handle: OverlayHandle) -> bool {
        self.circles.contains_key(&handle) || self.markers.contains_key(&handle)
    }
}

impl MockSurface {
    /// Create a new, empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockSurfaceInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next `n` add calls fail with a backend error.
    pub fn fail_next_adds(&self, n: usize) {
        self.lock().fail_adds = n;
    }

    /// Make the next `n` circle moves fail with a backend error.
    pub fn fail_next_circle_moves(&self, n: usize) {
        self.lock().fail_circle_moves = n;
    }

    /// View installed by `set_view`.
    pub fn view(&self) -> Option<MapView> {
        self.lock().view.clone()
    }

    /// Live circles in handle order.
    pub fn circles(&self) -> Vec<(OverlayHandle, CircleDef)> {
        self.lock()
            .circles
            .iter()
            .map(|(h, c)| (*h, c.clone()))
            .collect()
    }

    /// Live markers in handle order.
    pub fn markers(&self) -> Vec<(OverlayHandle, MarkerDef)> {
        self.lock()
            .markers
            .iter()
            .map(|(h, m)| (*h, m.clone()))
            .collect()
    }

    /// Number of live circles.
    pub fn circle_count(&self) -> usize {
        self.lock().circles.len()
    }

    /// Number of live markers.
    pub fn marker_count(&self) -> usize {
        self.lock().markers.len()
    }

    /// Popup bound to an overlay.
    pub fn popup(&self, handle: OverlayHandle) -> Option<PopupContent> {
        self.lock().popups.get(&handle).cloned()
    }

    /// Overlay whose popup is currently open.
    pub fn opened_popup(&self) -> Option<OverlayHandle> {
        self.lock().open_popup
    }

    /// Operation counters so far.
    pub fn ops(&self) -> SurfaceOps {
        self.lock().ops
    }

    /// Whether dispose has been called.
    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }
}

impl MapSurface for MockSurface {
    fn set_view(&mut self, view: &MapView) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.live()?;
        inner.view = Some(view.clone());
        Ok(())
    }

    fn add_circle(&mut self, def: &CircleDef) -> Result<OverlayHandle, SurfaceError> {
        let mut inner = self.lock();
        let handle = inner.mint()?;
        inner.circles.insert(handle, def.clone());
        Ok(handle)
    }

    fn set_circle_center(
        &mut self,
        handle: OverlayHandle,
        center: LatLng,
    ) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.live()?;
        if inner.fail_circle_moves > 0 {
            inner.fail_circle_moves -= 1;
            return Err(SurfaceError::Backend("simulated move failure".into()));
        }
        let circle = inner
            .circles
            .get_mut(&handle)
            .ok_or(SurfaceError::UnknownOverlay(handle))?;
        circle.center = center;
        inner.ops.moves += 1;
        Ok(())
    }

    fn set_circle_radius(
        &mut self,
        handle: OverlayHandle,
        radius_m: f64,
    ) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.live()?;
        let circle = inner
            .circles
            .get_mut(&handle)
            .ok_or(SurfaceError::UnknownOverlay(handle))?;
        circle.radius_m = radius_m;
        inner.ops.resizes += 1;
        Ok(())
    }

    fn add_marker(&mut self, def: &MarkerDef) -> Result<OverlayHandle, SurfaceError> {
        let mut inner = self.lock();
        let handle = inner.mint()?;
        inner.markers.insert(handle, def.clone());
        Ok(handle)
    }

    fn set_marker_position(
        &mut self,
        handle: OverlayHandle,
        position: LatLng,
    ) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.live()?;
        let marker = inner
            .markers
            .get_mut(&handle)
            .ok_or(SurfaceError::UnknownOverlay(handle))?;
        marker.position = position;
        inner.ops.moves += 1;
        Ok(())
    }

    fn remove_overlay(&mut self, handle: OverlayHandle) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.live()?;
        let removed =
            inner.circles.remove(&handle).is_some() || inner.markers.remove(&handle).is_some();
        if !removed {
            return Err(SurfaceError::UnknownOverlay(handle));
        }
        inner.popups.remove(&handle);
        if inner.open_popup == Some(handle) {
            inner.open_popup = None;
        }
        inner.ops.removes += 1;
        Ok(())
    }

    fn bind_popup(
        &mut self,
        handle: OverlayHandle,
        content: &PopupContent,
    ) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.live()?;
        if !inner.exists(handle) {
            return Err(SurfaceError::UnknownOverlay(handle));
        }
        inner.popups.insert(handle, content.clone());
        inner.ops.popup_binds += 1;
        Ok(())
    }

    fn unbind_popup(&mut self, handle: OverlayHandle) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.live()?;
        if !inner.exists(handle) {
            return Err(SurfaceError::UnknownOverlay(handle));
        }
        inner.popups.remove(&handle);
        if inner.open_popup == Some(handle) {
            inner.open_popup = None;
        }
        Ok(())
    }

    fn open_popup(&mut self, handle: OverlayHandle) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.live()?;
        if !inner.popups.contains_key(&handle) {
            return Err(SurfaceError::UnknownOverlay(handle));
        }
        inner.open_popup = Some(handle);
        Ok(())
    }

    fn close_popup(&mut self) {
        self.lock().open_popup = None;
    }

    fn dispose(&mut self) {
        let mut inner = self.lock();
        inner.circles.clear();
        inner.markers.clear();
        inner.popups.clear();
        inner.open_popup = None;
        inner.disposed = true;
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use geofence_map_port::{CircleStyle, MarkerIcon};

    fn circle(lat: f64, lng: f64, radius_m: f64) -> CircleDef {
        CircleDef {
            center: LatLng::new(lat, lng),
            radius_m,
            style: CircleStyle::default(),
        }
    }

    #[test]
    fn clones_share_state() {
        let probe = MockSurface::new();
        let mut owned = probe.clone();
        let h = owned.add_circle(&circle(8.47, 124.64, 20.0)).unwrap();
        owned.set_circle_radius(h, 35.0).unwrap();
        assert_eq!(probe.circle_count(), 1);
        assert!((probe.circles()[0].1.radius_m - 35.0).abs() < f64::EPSILON);
        assert_eq!(probe.ops().adds, 1);
        assert_eq!(probe.ops().resizes, 1);
    }

    #[test]
    fn removing_an_overlay_drops_its_open_popup() {
        let mut surface = MockSurface::new();
        let h = surface.add_circle(&circle(0.0, 0.0, 5.0)).unwrap();
        surface
            .bind_popup(h, &PopupContent::new().row("Address", "Y Ave"))
            .unwrap();
        surface.open_popup(h).unwrap();
        assert_eq!(surface.opened_popup(), Some(h));
        surface.remove_overlay(h).unwrap();
        assert_eq!(surface.opened_popup(), None);
        assert!(surface.popup(h).is_none());
        assert_eq!(
            surface.remove_overlay(h),
            Err(SurfaceError::UnknownOverlay(h))
        );
    }

    #[test]
    fn unbinding_closes_the_popup_and_keeps_the_overlay() {
        let mut surface = MockSurface::new();
        let h = surface.add_circle(&circle(0.0, 0.0, 5.0)).unwrap();
        surface.unbind_popup(h).unwrap();
        surface
            .bind_popup(h, &PopupContent::new().row("Address", "Y Ave"))
            .unwrap();
        surface.open_popup(h).unwrap();
        surface.unbind_popup(h).unwrap();
        assert!(surface.popup(h).is_none());
        assert_eq!(surface.opened_popup(), None);
        assert_eq!(surface.circle_count(), 1);
    }

    #[test]
    fn scripted_circle_move_failures_leave_the_circle_put() {
        let mut surface = MockSurface::new();
        let h = surface.add_circle(&circle(0.0, 0.0, 5.0)).unwrap();
        surface.fail_next_circle_moves(1);
        assert!(matches!(
            surface.set_circle_center(h, LatLng::new(1.0, 1.0)),
            Err(SurfaceError::Backend(_))
        ));
        assert_eq!(surface.circles()[0].1.center, LatLng::new(0.0, 0.0));
        surface.set_circle_center(h, LatLng::new(1.0, 1.0)).unwrap();
        assert_eq!(surface.circles()[0].1.center, LatLng::new(1.0, 1.0));
    }

    #[test]
    fn scripted_add_failures_do_not_mint_handles() {
        let mut surface = MockSurface::new();
        surface.fail_next_adds(1);
        let marker = MarkerDef {
            position: LatLng::new(1.0, 2.0),
            icon: MarkerIcon::default(),
        };
        assert!(matches!(
            surface.add_marker(&marker),
            Err(SurfaceError::Backend(_))
        ));
        assert!(surface.add_marker(&marker).is_ok());
        assert_eq!(surface.marker_count(), 1);
        assert_eq!(surface.ops().adds, 1);
    }

    #[test]
    fn disposed_surface_rejects_everything() {
        let mut surface = MockSurface::new();
        surface.add_circle(&circle(0.0, 0.0, 5.0)).unwrap();
        surface.dispose();
        assert!(surface.is_disposed());
        assert_eq!(surface.circle_count(), 0);
        assert_eq!(
            surface.add_circle(&circle(0.0, 0.0, 5.0)),
            Err(SurfaceError::Disposed)
        );
        assert_eq!(
            surface.set_view(&MapView::default()),
            Err(SurfaceError::Disposed)
        );
    }
}
