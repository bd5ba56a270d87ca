// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persistence gateway for the geofence collection.
//!
//! The gateway exposes a live feed (snapshots or diffs, see [`FeedNormalizer`])
//! plus create/update/delete-by-id writes. Writes never return data to the
//! caller beyond the new id; their effect arrives through the feed like any
//! other client's write.

use std::future::Future;

use geofence_model::{FeedFrame, GeofencePatch, NewGeofence, RecordId};
use rand::{distributions::Alphanumeric, Rng};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub mod feed;
pub mod file;
pub mod memory;

pub use feed::{FeedError, FeedNormalizer};
pub use file::JsonFileStore;
pub use memory::{FeedMode, MemoryStore};

/// Collection the console reads and writes.
pub const DEFAULT_COLLECTION: &str = "Geofences";

/// Length of store-minted record ids.
pub const RECORD_ID_LEN: usize = 20;

/// Error type for gateway operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this id exists.
    #[error("record not found: {0}")]
    NotFound(RecordId),
    /// The store refused or could not reach the backend.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Document (de)serialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One item delivered by a live subscription.
#[derive(Debug)]
pub enum FeedEvent {
    /// A snapshot or diff frame.
    Frame(FeedFrame),
    /// The feed reported a failure; the subscription stays open.
    Error(StoreError),
}

/// Live subscription handle. Dropping it cancels the feed.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<FeedEvent>,
    producer: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a receiver fed by the store itself.
    pub fn new(rx: mpsc::UnboundedReceiver<FeedEvent>) -> Self {
        Self { rx, producer: None }
    }

    /// Wrap a receiver fed by a background task; the task is aborted on drop.
    pub fn with_producer(rx: mpsc::UnboundedReceiver<FeedEvent>, producer: JoinHandle<()>) -> Self {
        Self {
            rx,
            producer: Some(producer),
        }
    }

    /// Wait for the next event; `None` once the store side has gone away.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        self.rx.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_next(&mut self) -> Option<FeedEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(task) = self.producer.take() {
            task.abort();
        }
    }
}

/// Document-store port for the geofence collection.
///
/// Implementations are bound to one collection at construction. All writes
/// are independent; a failure of one says nothing about the others.
pub trait PersistenceGateway: Send + Sync + 'static {
    /// Open a live feed. The first frame is a snapshot of the current set.
    ///
    /// Must be called from within a tokio runtime.
    fn subscribe(&self) -> Result<Subscription, StoreError>;

    /// Create a record; the store assigns the id.
    fn create(
        &self,
        doc: NewGeofence,
    ) -> impl Future<Output = Result<RecordId, StoreError>> + Send;

    /// Apply a partial update to an existing record.
    fn update(
        &self,
        id: &RecordId,
        patch: GeofencePatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete a record by id.
    fn delete_by_id(&self, id: &RecordId) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Mint a random alphanumeric record id.
pub fn new_record_id() -> RecordId {
    let id: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RECORD_ID_LEN)
        .map(char::from)
        .collect();
    RecordId::new(id)
}
