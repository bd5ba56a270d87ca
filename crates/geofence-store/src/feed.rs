// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Feed normalization: turn snapshot-or-diff frames into full snapshots.
//!
//! Consumers reconcile against whole record sets only; a delta feed is folded
//! into the last good set here so downstream diffing stays trivially
//! idempotent.

use geofence_model::{EpochId, FeedFrame, FenceDiff, FenceSet, FenceSnapshot, GeofenceRecord};
use thiserror::Error;

/// Reasons a frame could not be folded in. The last good set is kept; any of
/// these means the feed must be re-opened from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// A diff arrived before any snapshot.
    #[error("diff received before snapshot")]
    DiffBeforeSnapshot,
    /// A diff does not continue from the local epoch.
    #[error("non-sequential diff: from={from}, to={to}, local={local}")]
    Gap {
        /// Diff base epoch.
        from: EpochId,
        /// Diff target epoch.
        to: EpochId,
        /// Epoch held locally.
        local: EpochId,
    },
    /// An op could not be applied (e.g. removing an unknown id).
    #[error("failed applying op: {0}")]
    Apply(String),
    /// The rebuilt set does not match the frame's state hash.
    #[error("state hash mismatch at epoch {0}")]
    HashMismatch(EpochId),
}

/// Folds frames into the latest full record set.
#[derive(Debug, Default)]
pub struct FeedNormalizer {
    state: Option<(EpochId, FenceSet)>,
}

impl FeedNormalizer {
    /// Empty normalizer (expects a snapshot first).
    pub fn new() -> Self {
        Self::default()
    }

    /// Epoch of the last good set, if any.
    pub fn epoch(&self) -> Option<EpochId> {
        self.state.as_ref().map(|(epoch, _)| *epoch)
    }

    /// Forget everything; the next frame must be a snapshot.
    pub fn reset(&mut self) {
        self.state = None;
    }

    /// Fold a frame in and return the full, id-ordered record set it implies.
    pub fn apply(&mut self, frame: FeedFrame) -> Result<Vec<GeofenceRecord>, FeedError> {
        match frame {
            FeedFrame::Snapshot(snapshot) => self.apply_snapshot(snapshot),
            FeedFrame::Diff(diff) => self.apply_diff(diff),
        }
    }

    fn apply_snapshot(&mut self, snapshot: FenceSnapshot) -> Result<Vec<GeofenceRecord>, FeedError> {
        let set = FenceSet::from_records(snapshot.records);
        verify(&set, snapshot.epoch, snapshot.state_hash)?;
        let records = set.records();
        self.state = Some((snapshot.epoch, set));
        Ok(records)
    }

    fn apply_diff(&mut self, diff: FenceDiff) -> Result<Vec<GeofenceRecord>, FeedError> {
        let Some((epoch, set)) = &self.state else {
            return Err(FeedError::DiffBeforeSnapshot);
        };
        if diff.from_epoch != *epoch || epoch.checked_add(1) != Some(diff.to_epoch) {
            return Err(FeedError::Gap {
                from: diff.from_epoch,
                to: diff.to_epoch,
                local: *epoch,
            });
        }
        let mut next = set.clone();
        for op in diff.ops {
            next.apply_op(op)
                .map_err(|err| FeedError::Apply(format!("{err:#}")))?;
        }
        verify(&next, diff.to_epoch, diff.state_hash)?;
        let records = next.records();
        self.state = Some((diff.to_epoch, next));
        Ok(records)
    }
}

fn verify(
    set: &FenceSet,
    epoch: EpochId,
    expected: Option<geofence_model::Hash32>,
) -> Result<(), FeedError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match set.compute_hash() {
        Ok(actual) if actual == expected => Ok(()),
        Ok(_) => Err(FeedError::HashMismatch(epoch)),
        Err(err) => Err(FeedError::Apply(format!("{err:#}"))),
    }
}
