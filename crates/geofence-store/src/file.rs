// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! JSON-file-backed store.
//!
//! The collection lives in one file as a JSON object keyed by record id:
//!
//! ```json
//! { "Xy12...": { "deployment": "Alpha", "address": "X St", "radius": "20",
//!               "location": { "latitude": 8.47, "longitude": 124.64 } } }
//! ```
//!
//! Subscribers poll the file and receive a fresh snapshot whenever its bytes
//! change, so edits made by another process (or by hand) show up like any
//! other remote write.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use geofence_model::{
    FeedFrame, FenceSnapshot, GeofencePatch, GeofenceRecord, NewGeofence, RecordId,
};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};
use tokio::time;
use tracing::{debug, warn};

use crate::{new_record_id, FeedEvent, PersistenceGateway, StoreError, Subscription};

/// Store backed by a single JSON file.
#[derive(Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    poll: Duration,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    /// Store at `path`, polled every `poll` by subscribers.
    pub fn new(path: impl Into<PathBuf>, poll: Duration) -> Self {
        Self {
            path: path.into(),
            poll: poll.max(Duration::from_millis(10)),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// File the collection lives in.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the current records (missing file = empty collection).
    pub async fn load(&self) -> Result<Vec<GeofenceRecord>, StoreError> {
        let docs = read_documents(&self.path).await?;
        Ok(records_from(docs))
    }

    async fn write_documents(&self, docs: &Map<String, Value>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(docs)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn create_doc(&self, doc: NewGeofence) -> Result<RecordId, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut docs = read_documents(&self.path).await?;
        let id = new_record_id();
        docs.insert(id.as_str().to_string(), serde_json::to_value(&doc)?);
        self.write_documents(&docs).await?;
        Ok(id)
    }

    async fn update_doc(&self, id: RecordId, patch: GeofencePatch) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut docs = read_documents(&self.path).await?;
        let Some(current) = docs.get(id.as_str()) else {
            return Err(StoreError::NotFound(id));
        };
        let mut doc: NewGeofence = serde_json::from_value(current.clone())?;
        patch.apply_to(&mut doc);
        docs.insert(id.as_str().to_string(), serde_json::to_value(&doc)?);
        self.write_documents(&docs).await
    }

    async fn delete_doc(&self, id: RecordId) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut docs = read_documents(&self.path).await?;
        if docs.remove(id.as_str()).is_none() {
            return Err(StoreError::NotFound(id));
        }
        self.write_documents(&docs).await
    }
}

async fn read_bytes(path: &Path) -> Result<Vec<u8>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(StoreError::Io(err)),
    }
}

async fn read_documents(path: &Path) -> Result<Map<String, Value>, StoreError> {
    parse_documents(&read_bytes(path).await?)
}

fn parse_documents(bytes: &[u8]) -> Result<Map<String, Value>, StoreError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    Ok(serde_json::from_slice(bytes)?)
}

/// Malformed documents are skipped, never fatal.
fn records_from(docs: Map<String, Value>) -> Vec<GeofenceRecord> {
    docs.into_iter()
        .filter_map(|(id, value)| match serde_json::from_value::<NewGeofence>(value) {
            Ok(doc) => Some(GeofenceRecord::from_document(RecordId::new(id), doc)),
            Err(err) => {
                warn!(record = %id, %err, "skipping malformed geofence document");
                None
            }
        })
        .collect()
}

async fn poll_file(path: PathBuf, every: Duration, tx: mpsc::UnboundedSender<FeedEvent>) {
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    let mut last_seen: Option<blake3::Hash> = None;
    let mut epoch = 0;
    loop {
        ticker.tick().await;
        if tx.is_closed() {
            break;
        }
        let event = match read_bytes(&path).await {
            Ok(bytes) => {
                let digest = blake3::hash(&bytes);
                if last_seen == Some(digest) {
                    continue;
                }
                last_seen = Some(digest);
                match parse_documents(&bytes) {
                    Ok(docs) => {
                        let snapshot = FenceSnapshot {
                            epoch,
                            records: records_from(docs),
                            state_hash: None,
                        };
                        epoch = epoch.wrapping_add(1);
                        debug!(epoch = snapshot.epoch, path = %path.display(), "file changed");
                        FeedEvent::Frame(FeedFrame::Snapshot(snapshot))
                    }
                    Err(err) => FeedEvent::Error(err),
                }
            }
            Err(err) => FeedEvent::Error(err),
        };
        if tx.send(event).is_err() {
            break;
        }
    }
}

impl PersistenceGateway for JsonFileStore {
    fn subscribe(&self) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let producer = tokio::spawn(poll_file(self.path.clone(), self.poll, tx));
        Ok(Subscription::with_producer(rx, producer))
    }

    fn create(
        &self,
        doc: NewGeofence,
    ) -> impl Future<Output = Result<RecordId, StoreError>> + Send {
        self.create_doc(doc)
    }

    fn update(
        &self,
        id: &RecordId,
        patch: GeofencePatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.update_doc(id.clone(), patch)
    }

    fn delete_by_id(&self, id: &RecordId) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.delete_doc(id.clone())
    }
}
