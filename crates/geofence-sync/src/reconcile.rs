// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Snapshot-to-overlay reconciliation.
//!
//! Each pass diffs the incoming full record set against the entries already
//! drawn: removed ids lose their circle, new ids get one, changed records are
//! moved/resized/rebound in place. A second pass over the same set touches
//! nothing. Per-record surface failures are logged and the record is retried
//! on the next snapshot; they never abort the pass.

use std::collections::{BTreeMap, HashMap};

use geofence_map_port::{
    CircleDef, CircleStyle, LatLng, MapSurface, OverlayHandle, SurfaceError,
};
use geofence_model::{GeofenceRecord, RecordId};
use tracing::{debug, warn};

use crate::popup::record_popup;

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Overlays created for new records.
    pub added: usize,
    /// Overlays changed in place.
    pub updated: usize,
    /// Overlays removed for records gone from the snapshot.
    pub removed: usize,
    /// Records whose overlay could not be brought up to date.
    pub failed: usize,
}

impl ReconcileReport {
    /// True when the pass changed nothing on the surface.
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }
}

/// Rendered state for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayEntry {
    /// Record this overlay draws.
    pub record_id: RecordId,
    /// Circle handle on the surface.
    pub circle: OverlayHandle,
    /// Bumped every time the popup is rebound.
    pub popup_version: u64,
    record: GeofenceRecord,
}

impl OverlayEntry {
    /// Record as last drawn.
    pub fn record(&self) -> &GeofenceRecord {
        &self.record
    }
}

fn center_of(record: &GeofenceRecord) -> LatLng {
    LatLng::new(record.location.latitude, record.location.longitude)
}

fn radius_of(record: &GeofenceRecord) -> f64 {
    f64::from(record.radius_meters)
}

/// Owns the record overlays on one surface.
#[derive(Debug, Default)]
pub struct OverlayReconciler {
    style: CircleStyle,
    entries: BTreeMap<RecordId, OverlayEntry>,
    by_circle: HashMap<OverlayHandle, RecordId>,
}

impl OverlayReconciler {
    /// Empty reconciler drawing circles in `style`.
    pub fn new(style: CircleStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    /// Number of drawn records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is drawn.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drawn record ids in id order.
    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.entries.keys()
    }

    /// Entry for a record id.
    pub fn entry(&self, id: &RecordId) -> Option<&OverlayEntry> {
        self.entries.get(id)
    }

    /// Current version of a record.
    pub fn record(&self, id: &RecordId) -> Option<&GeofenceRecord> {
        self.entries.get(id).map(OverlayEntry::record)
    }

    /// Record drawn by a circle handle.
    pub fn record_for_overlay(&self, handle: OverlayHandle) -> Option<&GeofenceRecord> {
        self.by_circle.get(&handle).and_then(|id| self.record(id))
    }

    /// Bring the surface in line with `records` (the full current set).
    ///
    /// A repeated id keeps its last occurrence.
    pub fn reconcile<S>(&mut self, surface: &mut S, records: &[GeofenceRecord]) -> ReconcileReport
    where
        S: MapSurface + ?Sized,
    {
        let incoming: BTreeMap<&RecordId, &GeofenceRecord> =
            records.iter().map(|r| (&r.id, r)).collect();
        let mut report = ReconcileReport::default();

        let gone: Vec<RecordId> = self
            .entries
            .keys()
            .filter(|id| !incoming.contains_key(id))
            .cloned()
            .collect();
        for id in gone {
            if self.remove_entry(surface, &id) {
                report.removed += 1;
            } else {
                report.failed += 1;
            }
        }

        for (id, record) in incoming {
            let unchanged = self.entries.get(id).map(|entry| entry.record == *record);
            match unchanged {
                Some(true) => {}
                Some(false) => match self.update_entry(surface, record) {
                    Ok(()) => report.updated += 1,
                    Err(err) => {
                        warn!(?err, record = %id, "overlay update failed; retrying next snapshot");
                        report.failed += 1;
                    }
                },
                None => match self.add_entry(surface, record) {
                    Ok(()) => report.added += 1,
                    Err(err) => {
                        warn!(?err, record = %id, "overlay add failed; retrying next snapshot");
                        report.failed += 1;
                    }
                },
            }
        }

        debug!(
            added = report.added,
            updated = report.updated,
            removed = report.removed,
            failed = report.failed,
            drawn = self.entries.len(),
            "reconciled"
        );
        report
    }

    /// Remove every record overlay. Returns how many were removed.
    pub fn clear<S>(&mut self, surface: &mut S) -> usize
    where
        S: MapSurface + ?Sized,
    {
        let ids: Vec<RecordId> = self.entries.keys().cloned().collect();
        let mut removed = 0;
        for id in ids {
            if self.remove_entry(surface, &id) {
                removed += 1;
            }
        }
        // whatever failed to come off is forgotten; the surface is about to go
        self.entries.clear();
        self.by_circle.clear();
        removed
    }

    fn add_entry<S>(&mut self, surface: &mut S, record: &GeofenceRecord) -> Result<(), SurfaceError>
    where
        S: MapSurface + ?Sized,
    {
        let circle = surface.add_circle(&CircleDef {
            center: center_of(record),
            radius_m: radius_of(record),
            style: self.style.clone(),
        })?;
        if let Err(err) = surface.bind_popup(circle, &record_popup(record)) {
            if let Err(cleanup) = surface.remove_overlay(circle) {
                warn!(?cleanup, record = %record.id, "could not remove half-built overlay");
            }
            return Err(err);
        }
        self.by_circle.insert(circle, record.id.clone());
        self.entries.insert(
            record.id.clone(),
            OverlayEntry {
                record_id: record.id.clone(),
                circle,
                popup_version: 1,
                record: record.clone(),
            },
        );
        Ok(())
    }

    fn update_entry<S>(
        &mut self,
        surface: &mut S,
        record: &GeofenceRecord,
    ) -> Result<(), SurfaceError>
    where
        S: MapSurface + ?Sized,
    {
        let Some(entry) = self.entries.get_mut(&record.id) else {
            return Ok(());
        };
        let old = &entry.record;
        if old.location != record.location {
            surface.set_circle_center(entry.circle, center_of(record))?;
        }
        if old.radius_meters != record.radius_meters {
            surface.set_circle_radius(entry.circle, radius_of(record))?;
        }
        if old.deployment != record.deployment
            || old.address != record.address
            || old.radius_meters != record.radius_meters
        {
            surface.bind_popup(entry.circle, &record_popup(record))?;
            entry.popup_version += 1;
        }
        // committed only once every surface call succeeded
        entry.record = record.clone();
        Ok(())
    }

    fn remove_entry<S>(&mut self, surface: &mut S, id: &RecordId) -> bool
    where
        S: MapSurface + ?Sized,
    {
        let Some(entry) = self.entries.get(id) else {
            return false;
        };
        match surface.remove_overlay(entry.circle) {
            Ok(()) | Err(SurfaceError::UnknownOverlay(_)) => {}
            Err(err) => {
                warn!(?err, record = %id, "overlay removal failed; retrying next snapshot");
                return false;
            }
        }
        self.by_circle.remove(&entry.circle);
        self.entries.remove(id);
        true
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use geofence_dry_tests::{MockSurface, RecordBuilder};

    fn alpha() -> GeofenceRecord {
        RecordBuilder::new("g1")
            .deployment("Alpha")
            .radius(20)
            .at(8.47, 124.64)
            .build()
    }

    #[test]
    fn snapshot_then_empty_snapshot() {
        let mut surface = MockSurface::new();
        let mut rec = OverlayReconciler::default();

        let report = rec.reconcile(&mut surface, &[alpha()]);
        assert_eq!(report.added, 1);
        let (handle, circle) = surface.circles().pop().unwrap();
        assert_eq!(circle.center, LatLng::new(8.47, 124.64));
        assert!((circle.radius_m - 20.0).abs() < f64::EPSILON);
        assert_eq!(circle.style, CircleStyle::default());
        let text = surface.popup(handle).unwrap().text();
        assert!(text.contains("Alpha"));
        assert!(text.contains("20m"));

        let report = rec.reconcile(&mut surface, &[]);
        assert_eq!(report.removed, 1);
        assert_eq!(surface.circle_count(), 0);
        assert!(rec.is_empty());
    }

    #[test]
    fn second_pass_is_a_noop() {
        let mut surface = MockSurface::new();
        let mut rec = OverlayReconciler::default();
        let snap = [alpha(), RecordBuilder::new("g2").radius(5).build()];
        rec.reconcile(&mut surface, &snap);
        let before = surface.ops();
        let report = rec.reconcile(&mut surface, &snap);
        assert!(report.is_noop());
        assert_eq!(surface.ops(), before);
    }

    #[test]
    fn edits_update_in_place() {
        let mut surface = MockSurface::new();
        let mut rec = OverlayReconciler::default();
        rec.reconcile(&mut surface, &[alpha()]);
        let handle = rec.entry(&RecordId::new("g1")).unwrap().circle;

        let edited = RecordBuilder::new("g1")
            .deployment("Alpha-2")
            .radius(35)
            .at(8.47, 124.64)
            .build();
        let report = rec.reconcile(&mut surface, &[edited]);
        assert_eq!(report.updated, 1);
        assert_eq!(report.added + report.removed, 0);

        let entry = rec.entry(&RecordId::new("g1")).unwrap();
        assert_eq!(entry.circle, handle);
        assert_eq!(entry.popup_version, 2);
        assert!(surface.popup(handle).unwrap().text().contains("Alpha-2"));
        assert_eq!(surface.ops().moves, 0);
        assert_eq!(surface.ops().resizes, 1);
    }

    #[test]
    fn failed_add_is_retried_on_next_snapshot() {
        let mut surface = MockSurface::new();
        let mut rec = OverlayReconciler::default();
        surface.fail_next_adds(1);
        let report = rec.reconcile(&mut surface, &[alpha()]);
        assert_eq!(report.failed, 1);
        assert!(rec.is_empty());

        let report = rec.reconcile(&mut surface, &[alpha()]);
        assert_eq!(report.added, 1);
        assert_eq!(surface.circle_count(), 1);
    }

    #[test]
    fn overlay_lookup_follows_the_current_record() {
        let mut surface = MockSurface::new();
        let mut rec = OverlayReconciler::default();
        rec.reconcile(&mut surface, &[alpha()]);
        let handle = rec.entry(&RecordId::new("g1")).unwrap().circle;
        rec.reconcile(
            &mut surface,
            &[RecordBuilder::new("g1").deployment("Renamed").at(8.47, 124.64).build()],
        );
        assert_eq!(rec.record_for_overlay(handle).unwrap().deployment, "Renamed");
        assert!(rec.record_for_overlay(OverlayHandle(999)).is_none());
    }

    #[test]
    fn clear_removes_everything() {
        let mut surface = MockSurface::new();
        let mut rec = OverlayReconciler::default();
        rec.reconcile(&mut surface, &[alpha(), RecordBuilder::new("g2").build()]);
        assert_eq!(rec.clear(&mut surface), 2);
        assert_eq!(surface.circle_count(), 0);
        assert!(rec.record(&RecordId::new("g1")).is_none());
    }
}
