// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Popup control dispatch.
//!
//! Popup markup carries plain buttons; the engine only says which popup is
//! open. When a record popup opens, a delegation table keyed by control id is
//! built for that popup alone and replaces whatever was bound before. A click
//! resolves the record through the reconciler at click time, so an edit
//! always sees the latest snapshot's fields.

use std::collections::HashMap;

use geofence_map_port::{ControlId, OverlayHandle};
use geofence_model::{GeofenceRecord, RecordId};
use tracing::debug;

use crate::popup::{delete_control_id, edit_control_id};
use crate::reconcile::OverlayReconciler;

/// Control kinds injected into record popups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PopupAction {
    /// Hand the record to the edit form.
    Edit,
    /// Delete the record.
    Delete,
}

/// Resolved outcome of a control click.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Open the edit form on this (current) record.
    Edit(GeofenceRecord),
    /// Delete this record.
    Delete(RecordId),
}

#[derive(Debug)]
struct OpenPopup {
    overlay: OverlayHandle,
    record_id: RecordId,
    bindings: HashMap<ControlId, PopupAction>,
}

/// Delegation table for the one open record popup.
#[derive(Debug, Default)]
pub struct InteractionDispatcher {
    open: Option<OpenPopup>,
}

impl InteractionDispatcher {
    /// Nothing bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the controls of the popup that just opened on `overlay`.
    ///
    /// Replaces any previous bindings. Overlays that do not draw a record
    /// (the candidate marker) leave the table empty. Returns the number of
    /// controls bound.
    pub fn attach(&mut self, overlay: OverlayHandle, reconciler: &OverlayReconciler) -> usize {
        self.open = reconciler.record_for_overlay(overlay).map(|record| {
            let bindings = HashMap::from([
                (edit_control_id(&record.id), PopupAction::Edit),
                (delete_control_id(&record.id), PopupAction::Delete),
            ]);
            OpenPopup {
                overlay,
                record_id: record.id.clone(),
                bindings,
            }
        });
        let bound = self.open.as_ref().map_or(0, |open| open.bindings.len());
        debug!(?overlay, bound, "popup bindings attached");
        bound
    }

    /// Drop all bindings. Returns how many were dropped.
    pub fn detach(&mut self) -> usize {
        self.open.take().map_or(0, |open| open.bindings.len())
    }

    /// Overlay whose popup is bound.
    pub fn open_overlay(&self) -> Option<OverlayHandle> {
        self.open.as_ref().map(|open| open.overlay)
    }

    /// Record the bound popup belongs to.
    pub fn bound_record(&self) -> Option<&RecordId> {
        self.open.as_ref().map(|open| &open.record_id)
    }

    /// Drop the bindings if their record has left the drawn set.
    pub fn retain_live(&mut self, reconciler: &OverlayReconciler) -> bool {
        let stale = self
            .open
            .as_ref()
            .is_some_and(|open| reconciler.entry(&open.record_id).is_none());
        if stale {
            self.detach();
        }
        stale
    }

    /// Resolve a click on `control`. `None` when it is not bound to the open
    /// popup or its record is gone.
    pub fn click(&self, control: &ControlId, reconciler: &OverlayReconciler) -> Option<Dispatch> {
        let open = self.open.as_ref()?;
        let action = *open.bindings.get(control)?;
        let Some(record) = reconciler.record(&open.record_id) else {
            debug!(record = %open.record_id, "click on a popup whose record is gone");
            return None;
        };
        Some(match action {
            PopupAction::Edit => Dispatch::Edit(record.clone()),
            PopupAction::Delete => Dispatch::Delete(record.id.clone()),
        })
    }
}
