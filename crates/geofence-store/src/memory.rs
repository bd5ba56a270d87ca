// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-process authoritative store with a push feed.
//!
//! Every subscriber gets the current snapshot on subscribe and one frame per
//! committed write. Clones share the same collection, so a test (or a second
//! "client") can write through one clone and observe through another.

use std::future::{ready, Future};
use std::sync::{Arc, Mutex, MutexGuard};

use geofence_model::{
    EpochId, FeedFrame, FenceDiff, FenceOp, FenceSet, FenceSnapshot, GeofencePatch,
    GeofenceRecord, NewGeofence, RecordId,
};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{new_record_id, FeedEvent, PersistenceGateway, StoreError, Subscription};

/// Shape of the frames pushed after the initial snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedMode {
    /// Every write pushes the full set.
    #[default]
    Snapshots,
    /// Every write pushes a gapless diff.
    Diffs,
}

/// Shared in-memory geofence collection.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    records: FenceSet,
    epoch: EpochId,
    mode: FeedMode,
    subscribers: Vec<mpsc::UnboundedSender<FeedEvent>>,
    fail_writes: bool,
    write_count: usize,
}

impl MemoryStoreInner {
    fn snapshot(&self) -> FenceSnapshot {
        FenceSnapshot {
            epoch: self.epoch,
            records: self.records.records(),
            state_hash: self.records.compute_hash().ok(),
        }
    }

    fn commit(&mut self, op: FenceOp) -> Result<(), StoreError> {
        let id = match &op {
            FenceOp::Put(record) => record.id.clone(),
            FenceOp::Remove { id } => id.clone(),
        };
        self.records
            .apply_op(op.clone())
            .map_err(|_| StoreError::NotFound(id))?;
        self.epoch = self.epoch.wrapping_add(1);
        let frame = match self.mode {
            FeedMode::Snapshots => FeedFrame::Snapshot(self.snapshot()),
            FeedMode::Diffs => FeedFrame::Diff(FenceDiff {
                from_epoch: self.epoch - 1,
                to_epoch: self.epoch,
                ops: vec![op],
                state_hash: self.records.compute_hash().ok(),
            }),
        };
        self.subscribers
            .retain(|tx| tx.send(FeedEvent::Frame(frame.clone())).is_ok());
        debug!(epoch = self.epoch, subscribers = self.subscribers.len(), "published");
        Ok(())
    }

    fn check_writable(&mut self) -> Result<(), StoreError> {
        self.write_count += 1;
        if self.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

impl MemoryStore {
    /// Empty store pushing full snapshots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store with the given feed shape.
    pub fn with_mode(mode: FeedMode) -> Self {
        let store = Self::default();
        store.lock().mode = mode;
        store
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace a record as another client would (bypasses write failures).
    pub fn put_external(&self, record: GeofenceRecord) {
        // Put never fails
        let _ = self.lock().commit(FenceOp::Put(record));
    }

    /// Delete a record as another client would.
    pub fn remove_external(&self, id: &RecordId) -> Result<(), StoreError> {
        self.lock().commit(FenceOp::Remove { id: id.clone() })
    }

    /// Make every subsequent gateway write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Push an error event to every live subscriber.
    pub fn inject_feed_error(&self, message: &str) {
        self.lock().subscribers.retain(|tx| {
            tx.send(FeedEvent::Error(StoreError::Unavailable(message.to_string())))
                .is_ok()
        });
    }

    /// Push a raw frame to every live subscriber (feed-level testing).
    pub fn inject_frame(&self, frame: FeedFrame) {
        self.lock()
            .subscribers
            .retain(|tx| tx.send(FeedEvent::Frame(frame.clone())).is_ok());
    }

    /// Current records in id order.
    pub fn records(&self) -> Vec<GeofenceRecord> {
        self.lock().records.records()
    }

    /// Current epoch.
    pub fn epoch(&self) -> EpochId {
        self.lock().epoch
    }

    /// Number of subscriptions that are still open.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }

    /// Gateway writes attempted so far (including failed ones).
    pub fn write_count(&self) -> usize {
        self.lock().write_count
    }

    fn create_now(&self, doc: NewGeofence) -> Result<RecordId, StoreError> {
        let mut inner = self.lock();
        inner.check_writable()?;
        let id = new_record_id();
        inner.commit(FenceOp::Put(GeofenceRecord::from_document(id.clone(), doc)))?;
        Ok(id)
    }

    fn update_now(&self, id: &RecordId, patch: &GeofencePatch) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_writable()?;
        let Some(current) = inner.records.get(id) else {
            return Err(StoreError::NotFound(id.clone()));
        };
        let mut doc = current.to_document();
        patch.apply_to(&mut doc);
        inner.commit(FenceOp::Put(GeofenceRecord::from_document(id.clone(), doc)))
    }

    fn delete_now(&self, id: &RecordId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_writable()?;
        inner.commit(FenceOp::Remove { id: id.clone() })
    }
}

impl PersistenceGateway for MemoryStore {
    fn subscribe(&self) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let first = FeedFrame::Snapshot(inner.snapshot());
        tx.send(FeedEvent::Frame(first))
            .map_err(|_| StoreError::Unavailable("subscriber closed".into()))?;
        inner.subscribers.push(tx);
        Ok(Subscription::new(rx))
    }

    fn create(
        &self,
        doc: NewGeofence,
    ) -> impl Future<Output = Result<RecordId, StoreError>> + Send {
        ready(self.create_now(doc))
    }

    fn update(
        &self,
        id: &RecordId,
        patch: GeofencePatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        ready(self.update_now(id, &patch))
    }

    fn delete_by_id(&self, id: &RecordId) -> impl Future<Output = Result<(), StoreError>> + Send {
        ready(self.delete_now(id))
    }
}
