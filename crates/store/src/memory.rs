//! In-memory store and backup sink.
//!
//! Back the test suite and local tooling. Both carry failure-injection
//! hooks: per-id write/delete failures, a fatal commit trigger after N
//! batches, and a commit log recording every committed chunk size.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{BackupSink, BatchOutcome, RecordStore, StoreError, StoreOp};

/// Default batch ceiling, matching the production document store.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, BTreeMap<String, Value>>,
    /// Ids that fail (not fatally) inside any batch commit.
    failing_ids: HashSet<String>,
    /// When set, the Nth batch commit (0-based) errors fatally.
    fail_on_commit: Option<usize>,
    commits_seen: usize,
    /// Size of every committed chunk, in order.
    commit_log: Vec<usize>,
}

/// An in-memory [`RecordStore`].
pub struct MemoryStore {
    max_batch_size: usize,
    state: Mutex<MemoryState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_max_batch_size(DEFAULT_MAX_BATCH_SIZE)
    }

    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self {
            max_batch_size,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Seed a collection with documents keyed by id.
    pub async fn seed(&self, collection: &str, documents: Vec<(String, Value)>) {
        let mut state = self.state.lock().await;
        let coll = state.collections.entry(collection.to_string()).or_default();
        for (id, doc) in documents {
            coll.insert(id, doc);
        }
    }

    /// Mark an id as failing inside batch commits.
    pub async fn fail_id(&self, id: &str) {
        self.state.lock().await.failing_ids.insert(id.to_string());
    }

    /// Make the Nth batch commit (0-based) fail fatally.
    pub async fn fail_on_commit(&self, n: usize) {
        self.state.lock().await.fail_on_commit = Some(n);
    }

    /// Number of documents currently in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .await
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Sizes of every committed chunk, in commit order.
    pub async fn commit_log(&self) -> Vec<usize> {
        self.state.lock().await.commit_log.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .collections
            .get(collection)
            .and_then(|coll| coll.get(id))
            .cloned())
    }

    async fn query(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .collections
            .get(collection)
            .map(|coll| coll.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state
            .collections
            .get_mut(collection)
            .map_or(false, |coll| coll.remove(id).is_some()))
    }

    async fn batch_write(&self, ops: Vec<StoreOp>) -> Result<BatchOutcome, StoreError> {
        if ops.len() > self.max_batch_size {
            return Err(StoreError::BatchTooLarge {
                size: ops.len(),
                max: self.max_batch_size,
            });
        }

        let mut state = self.state.lock().await;

        let commit_index = state.commits_seen;
        state.commits_seen += 1;
        if state.fail_on_commit == Some(commit_index) {
            return Err(StoreError::Unavailable(
                "injected commit failure".to_string(),
            ));
        }
        state.commit_log.push(ops.len());

        let mut outcome = BatchOutcome::default();
        for op in ops {
            if state.failing_ids.contains(op.id()) {
                outcome.failed.push(op.id().to_string());
                continue;
            }
            match op {
                StoreOp::Put {
                    collection,
                    id,
                    document,
                } => {
                    state
                        .collections
                        .entry(collection)
                        .or_default()
                        .insert(id.clone(), document);
                    outcome.succeeded.push(id);
                }
                StoreOp::Delete { collection, id } => {
                    let existed = state
                        .collections
                        .get_mut(&collection)
                        .map_or(false, |coll| coll.remove(&id).is_some());
                    if existed {
                        outcome.succeeded.push(id);
                    } else {
                        outcome.failed.push(id);
                    }
                }
            }
        }
        Ok(outcome)
    }
}

/// An in-memory [`BackupSink`].
#[derive(Default)]
pub struct MemoryBackupSink {
    fail: std::sync::atomic::AtomicBool,
    snapshots: Mutex<Vec<(String, Value)>>,
}

impl MemoryBackupSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent snapshot write fail.
    pub fn fail_writes(&self) {
        self.fail.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn snapshots(&self) -> Vec<(String, Value)> {
        self.snapshots.lock().await.clone()
    }
}

#[async_trait]
impl BackupSink for MemoryBackupSink {
    async fn write_snapshot(&self, name: &str, payload: Value) -> Result<(), StoreError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected backup failure".to_string(),
            ));
        }
        self.snapshots
            .lock()
            .await
            .push((name.to_string(), payload));
        Ok(())
    }
}
