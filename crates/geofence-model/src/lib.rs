// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Geofence records and the live-feed frames that carry them.
//! Pure data (records, snapshots, diffs) with deterministic hashing/serialization.

use std::collections::BTreeMap;
use std::fmt;

use blake3::Hash;
use ciborium::ser::into_writer;
use serde::{Deserialize, Serialize};

pub mod radius;

pub use radius::parse_radius;

/// Monotonic feed epoch.
pub type EpochId = u64;
/// Blake3 state hash (32 bytes).
pub type Hash32 = [u8; 32];

/// Opaque record identifier assigned by the store on creation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap a store-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Center of a zone, in double-precision degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl GeoPoint {
    /// Construct a point from latitude/longitude degrees.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A persisted geofence as delivered by the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceRecord {
    /// Store-assigned identifier.
    pub id: RecordId,
    /// Free-text deployment label (may be empty on read).
    #[serde(default)]
    pub deployment: String,
    /// Resolved human-readable address.
    #[serde(default)]
    pub address: String,
    /// Zone radius in meters (always positive).
    #[serde(rename = "radius", with = "radius")]
    pub radius_meters: u32,
    /// Zone center.
    pub location: GeoPoint,
}

impl GeofenceRecord {
    /// Attach a store id to a document body.
    pub fn from_document(id: RecordId, doc: NewGeofence) -> Self {
        Self {
            id,
            deployment: doc.deployment,
            address: doc.address,
            radius_meters: doc.radius_meters,
            location: doc.location,
        }
    }

    /// Strip the id, leaving the stored document body.
    pub fn to_document(&self) -> NewGeofence {
        NewGeofence {
            deployment: self.deployment.clone(),
            address: self.address.clone(),
            radius_meters: self.radius_meters,
            location: self.location,
        }
    }
}

/// Document body written on create (and stored per id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGeofence {
    /// Deployment label.
    #[serde(default)]
    pub deployment: String,
    /// Resolved address.
    #[serde(default)]
    pub address: String,
    /// Radius in meters.
    #[serde(rename = "radius", with = "radius")]
    pub radius_meters: u32,
    /// Zone center.
    pub location: GeoPoint,
}

/// Partial update issued by the edit form; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeofencePatch {
    /// Replacement deployment label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
    /// Replacement radius in meters.
    #[serde(
        default,
        rename = "radius",
        skip_serializing_if = "Option::is_none",
        with = "radius::optional"
    )]
    pub radius_meters: Option<u32>,
}

impl GeofencePatch {
    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.deployment.is_none() && self.radius_meters.is_none()
    }

    /// Apply the patch to a stored document.
    pub fn apply_to(&self, doc: &mut NewGeofence) {
        if let Some(deployment) = &self.deployment {
            doc.deployment.clone_from(deployment);
        }
        if let Some(radius) = self.radius_meters {
            doc.radius_meters = radius;
        }
    }
}

/// Single structural change carried by a diff frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FenceOp {
    /// Insert or replace a record wholesale.
    Put(GeofenceRecord),
    /// Remove a record by id.
    Remove {
        /// Identifier of the removed record.
        id: RecordId,
    },
}

/// Id-ordered record set used to rebuild full snapshots from diffs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FenceSet {
    records: BTreeMap<RecordId, GeofenceRecord>,
}

impl FenceSet {
    /// Build a set from a record list; a repeated id keeps the last entry.
    pub fn from_records(records: impl IntoIterator<Item = GeofenceRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect::<BTreeMap<_, _>>();
        Self { records }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the set holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by id.
    pub fn get(&self, id: &RecordId) -> Option<&GeofenceRecord> {
        self.records.get(id)
    }

    /// Records in id order.
    pub fn records(&self) -> Vec<GeofenceRecord> {
        self.records.values().cloned().collect()
    }

    /// Apply a structural op; removing a missing id is an error.
    pub fn apply_op(&mut self, op: FenceOp) -> anyhow::Result<()> {
        match op {
            FenceOp::Put(record) => {
                self.records.insert(record.id.clone(), record);
            }
            FenceOp::Remove { id } => {
                if self.records.remove(&id).is_none() {
                    anyhow::bail!("missing record: {}", id);
                }
            }
        }
        Ok(())
    }

    /// Canonical serialization (id order) for hashing/comparison.
    pub fn to_canonical_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let ordered: Vec<&GeofenceRecord> = self.records.values().collect();
        let mut bytes = Vec::new();
        into_writer(&ordered, &mut bytes)
            .map_err(|err| anyhow::anyhow!("canonical serialize: {err}"))?;
        Ok(bytes)
    }

    /// Compute blake3 hash of the canonical form.
    pub fn compute_hash(&self) -> anyhow::Result<Hash32> {
        let h: Hash = blake3::hash(&self.to_canonical_bytes()?);
        Ok(h.into())
    }
}

/// Full listing of the collection at an epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FenceSnapshot {
    /// Epoch identifier for this snapshot.
    pub epoch: EpochId,
    /// Every record currently in the collection.
    pub records: Vec<GeofenceRecord>,
    /// Optional hash of the canonical record set.
    pub state_hash: Option<Hash32>,
}

/// Diff between consecutive epochs (gapless in live feeds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FenceDiff {
    /// Base epoch (pre-diff).
    pub from_epoch: EpochId,
    /// Target epoch (post-diff, expected = from_epoch + 1).
    pub to_epoch: EpochId,
    /// Ops to apply in order.
    pub ops: Vec<FenceOp>,
    /// Optional hash of the post-state.
    pub state_hash: Option<Hash32>,
}

/// Live-feed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeedFrame {
    /// Full listing for an epoch.
    Snapshot(FenceSnapshot),
    /// Gapless diff between consecutive epochs.
    Diff(FenceDiff),
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(id: &str, deployment: &str, radius: u32) -> GeofenceRecord {
        GeofenceRecord {
            id: RecordId::new(id),
            deployment: deployment.into(),
            address: "X St".into(),
            radius_meters: radius,
            location: GeoPoint::new(8.47, 124.64),
        }
    }

    #[test]
    fn legacy_string_radius_is_accepted() {
        let json = r#"{
            "id": "g1",
            "deployment": "Alpha",
            "address": "X St",
            "radius": "20",
            "location": { "latitude": 8.47, "longitude": 124.64 }
        }"#;
        let rec: GeofenceRecord = serde_json::from_str(json).expect("decode");
        assert_eq!(rec.radius_meters, 20);
        assert_eq!(rec.id.as_str(), "g1");
    }

    #[test]
    fn zero_or_garbage_radius_is_rejected() {
        for radius in [r#""0""#, r#""abc""#, "0", "-4"] {
            let json = format!(
                r#"{{"id":"g1","radius":{radius},"location":{{"latitude":0.0,"longitude":0.0}}}}"#
            );
            assert!(
                serde_json::from_str::<GeofenceRecord>(&json).is_err(),
                "radius {radius} should be rejected"
            );
        }
    }

    #[test]
    fn empty_deployment_is_tolerated() {
        let json = r#"{"id":"g2","radius":5,"location":{"latitude":1.0,"longitude":2.0}}"#;
        let rec: GeofenceRecord = serde_json::from_str(json).expect("decode");
        assert!(rec.deployment.is_empty());
        assert!(rec.address.is_empty());
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut doc = record("g1", "Alpha", 20).to_document();
        GeofencePatch {
            deployment: None,
            radius_meters: Some(35),
        }
        .apply_to(&mut doc);
        assert_eq!(doc.deployment, "Alpha");
        assert_eq!(doc.radius_meters, 35);
    }

    #[test]
    fn remove_of_missing_record_errors() {
        let mut set = FenceSet::from_records([record("g1", "Alpha", 20)]);
        assert!(set
            .apply_op(FenceOp::Remove {
                id: RecordId::new("nope")
            })
            .is_err());
        set.apply_op(FenceOp::Remove {
            id: RecordId::new("g1"),
        })
        .unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn hash_ignores_input_order() {
        let a = FenceSet::from_records([record("g1", "Alpha", 20), record("g2", "Bravo", 15)]);
        let b = FenceSet::from_records([record("g2", "Bravo", 15), record("g1", "Alpha", 20)]);
        assert_eq!(a.compute_hash().unwrap(), b.compute_hash().unwrap());

        let c = FenceSet::from_records([record("g1", "Alpha", 21), record("g2", "Bravo", 15)]);
        assert_ne!(a.compute_hash().unwrap(), c.compute_hash().unwrap());
    }
}
