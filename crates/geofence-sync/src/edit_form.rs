// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Edit form for an existing geofence: deployment and radius only.

use geofence_model::{parse_radius, GeofencePatch, GeofenceRecord, RecordId};

use crate::ValidationError;

/// Field values of the edit form, seeded from the record being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    /// Record under edit.
    pub id: RecordId,
    /// Deployment field.
    pub deployment: String,
    /// Radius field as typed.
    pub radius: String,
}

impl EditForm {
    /// Form with explicit field values.
    pub fn new(id: RecordId, deployment: impl Into<String>, radius: impl Into<String>) -> Self {
        Self {
            id,
            deployment: deployment.into(),
            radius: radius.into(),
        }
    }

    /// Form pre-filled with a record's current values.
    pub fn from_record(record: &GeofenceRecord) -> Self {
        Self::new(
            record.id.clone(),
            record.deployment.as_str(),
            record.radius_meters.to_string(),
        )
    }

    /// Validate and build the patch to write.
    pub fn submit(&self) -> Result<(RecordId, GeofencePatch), ValidationError> {
        let deployment = self.deployment.trim();
        if deployment.is_empty() {
            return Err(ValidationError::MissingDeployment);
        }
        if self.radius.trim().is_empty() {
            return Err(ValidationError::MissingRadius);
        }
        let radius = parse_radius(&self.radius).ok_or(ValidationError::InvalidRadius)?;
        Ok((
            self.id.clone(),
            GeofencePatch {
                deployment: Some(deployment.to_string()),
                radius_meters: Some(radius),
            },
        ))
    }
}
