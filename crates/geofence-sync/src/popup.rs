// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Popup content for record circles and the candidate marker.

use geofence_map_port::{ControlId, PopupContent};
use geofence_model::{GeofenceRecord, RecordId};

const EDIT_PREFIX: &str = "showModalBtn_";
const DELETE_PREFIX: &str = "deleteBtn_";

/// DOM id of a record's Edit button.
pub fn edit_control_id(id: &RecordId) -> ControlId {
    ControlId::new(format!("{EDIT_PREFIX}{id}"))
}

/// DOM id of a record's Delete button.
pub fn delete_control_id(id: &RecordId) -> ControlId {
    ControlId::new(format!("{DELETE_PREFIX}{id}"))
}

/// Deployment, address and radius rows plus Edit/Delete controls.
pub fn record_popup(record: &GeofenceRecord) -> PopupContent {
    PopupContent::new()
        .row("Deployment", record.deployment.as_str())
        .row("Address", record.address.as_str())
        .row("Fence Radius", format!("{}m", record.radius_meters))
        .control(edit_control_id(&record.id), "Edit")
        .control(delete_control_id(&record.id), "Delete")
}

/// Address-only popup shown on the candidate marker.
pub fn candidate_popup(address: &str) -> PopupContent {
    PopupContent::new().row("Address", address)
}
