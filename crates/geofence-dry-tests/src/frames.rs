// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Record, snapshot and diff builders for tests.

use geofence_model::{
    EpochId, FeedFrame, FenceDiff, FenceOp, FenceSet, FenceSnapshot, GeoPoint, GeofenceRecord,
    Hash32, RecordId,
};

/// Builder for [`GeofenceRecord`] fixtures.
///
/// # Example
///
/// ```
/// use geofence_dry_tests::RecordBuilder;
///
/// let rec = RecordBuilder::new("g1").deployment("Alpha").radius(20).build();
/// assert_eq!(rec.radius_meters, 20);
/// assert_eq!(rec.address, "X St");
/// ```
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: GeofenceRecord,
}

impl RecordBuilder {
    /// Defaults: empty deployment, address `"X St"`, radius 20 m at (8.47, 124.64).
    pub fn new(id: &str) -> Self {
        Self {
            record: GeofenceRecord {
                id: RecordId::new(id),
                deployment: String::new(),
                address: "X St".into(),
                radius_meters: 20,
                location: GeoPoint::new(8.47, 124.64),
            },
        }
    }

    /// Set the deployment label.
    pub fn deployment(mut self, deployment: &str) -> Self {
        self.record.deployment = deployment.into();
        self
    }

    /// Set the address.
    pub fn address(mut self, address: &str) -> Self {
        self.record.address = address.into();
        self
    }

    /// Set the radius in meters.
    pub fn radius(mut self, radius_meters: u32) -> Self {
        self.record.radius_meters = radius_meters;
        self
    }

    /// Set the center.
    pub fn at(mut self, latitude: f64, longitude: f64) -> Self {
        self.record.location = GeoPoint::new(latitude, longitude);
        self
    }

    /// Finish.
    pub fn build(self) -> GeofenceRecord {
        self.record
    }
}

/// Builder for snapshot frames.
#[derive(Default)]
pub struct SnapshotBuilder {
    epoch: EpochId,
    records: Vec<GeofenceRecord>,
    state_hash: Option<Hash32>,
}

impl SnapshotBuilder {
    /// Epoch 0, no records, no hash.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the epoch ID.
    pub fn epoch(mut self, epoch: EpochId) -> Self {
        self.epoch = epoch;
        self
    }

    /// Add a record.
    pub fn record(mut self, record: GeofenceRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Set an explicit (possibly wrong) state hash.
    pub fn state_hash(mut self, hash: Hash32) -> Self {
        self.state_hash = Some(hash);
        self
    }

    /// Stamp the hash of the records added so far.
    pub fn hashed(mut self) -> Self {
        self.state_hash = FenceSet::from_records(self.records.clone())
            .compute_hash()
            .ok();
        self
    }

    /// Build the bare snapshot.
    pub fn build(self) -> FenceSnapshot {
        FenceSnapshot {
            epoch: self.epoch,
            records: self.records,
            state_hash: self.state_hash,
        }
    }

    /// Build and wrap as a feed frame.
    pub fn frame(self) -> FeedFrame {
        FeedFrame::Snapshot(self.build())
    }
}

/// Builder for diff frames.
#[derive(Default)]
pub struct DiffBuilder {
    from_epoch: EpochId,
    to_epoch: EpochId,
    ops: Vec<FenceOp>,
    state_hash: Option<Hash32>,
}

impl DiffBuilder {
    /// Diff `from -> to` with no ops.
    pub fn new(from_epoch: EpochId, to_epoch: EpochId) -> Self {
        Self {
            from_epoch,
            to_epoch,
            ..Self::default()
        }
    }

    /// Upsert a record.
    pub fn put(mut self, record: GeofenceRecord) -> Self {
        self.ops.push(FenceOp::Put(record));
        self
    }

    /// Remove a record by id.
    pub fn remove(mut self, id: &str) -> Self {
        self.ops.push(FenceOp::Remove {
            id: RecordId::new(id),
        });
        self
    }

    /// Set an explicit post-state hash.
    pub fn state_hash(mut self, hash: Hash32) -> Self {
        self.state_hash = Some(hash);
        self
    }

    /// Build and wrap as a feed frame.
    pub fn frame(self) -> FeedFrame {
        FeedFrame::Diff(FenceDiff {
            from_epoch: self.from_epoch,
            to_epoch: self.to_epoch,
            ops: self.ops,
            state_hash: self.state_hash,
        })
    }
}
