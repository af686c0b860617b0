//! The live-store seam of the reconciliation engine.
//!
//! The surrounding platform owns persistence; this crate only defines
//! the contracts the engine consumes:
//!
//! - [`RecordStore`] — a document store with per-collection get /
//!   query / delete and a bounded-size atomic batch write.
//! - [`BackupSink`] — a destination for pre-operation snapshots.
//! - [`memory`] — in-memory implementations backing the test suite and
//!   local tooling, with failure-injection hooks.

use async_trait::async_trait;
use serde_json::Value;

pub mod memory;

pub use memory::{MemoryBackupSink, MemoryStore};

// ── Collections ──────────────────────────────────────────────────────

pub const COLLECTION_EVENTS: &str = "events";
pub const COLLECTION_CLUBS: &str = "clubs";
pub const COLLECTION_ZONES: &str = "zones";
pub const COLLECTION_EVENT_TYPES: &str = "event-types";

// ── Operations ───────────────────────────────────────────────────────

/// One write or delete against a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Put {
        collection: String,
        id: String,
        document: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl StoreOp {
    pub fn put(collection: &str, id: &str, document: Value) -> Self {
        Self::Put {
            collection: collection.to_string(),
            id: id.to_string(),
            document,
        }
    }

    pub fn delete(collection: &str, id: &str) -> Self {
        Self::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Put { id, .. } | Self::Delete { id, .. } => id,
        }
    }
}

/// Per-id outcome of one committed batch.
///
/// The store commits a batch atomically at the container level but may
/// still report individual ids as failed (missing document, denied
/// write); those failures do not abort the rest of the batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

// ── Errors ───────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached; a batch carrying this error was
    /// not committed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A batch larger than the store's documented ceiling was refused
    /// outright.
    #[error("Batch of {size} operations exceeds the store maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },
}

// ── Contracts ────────────────────────────────────────────────────────

/// The document store holding the live records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Documented maximum number of operations accepted by a single
    /// [`batch_write`](Self::batch_write) call.
    fn max_batch_size(&self) -> usize;

    /// Fetch a single document.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Fetch every document in a collection.
    async fn query(&self, collection: &str) -> Result<Vec<Value>, StoreError>;

    /// Delete a single document. Returns whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Commit a batch of operations atomically, reporting per-id
    /// success and failure.
    async fn batch_write(&self, ops: Vec<StoreOp>) -> Result<BatchOutcome, StoreError>;
}

/// Destination for pre-operation backup snapshots.
#[async_trait]
pub trait BackupSink: Send + Sync {
    /// Persist a named snapshot. Failures are reported to the caller,
    /// which treats them as non-fatal.
    async fn write_snapshot(&self, name: &str, payload: Value) -> Result<(), StoreError>;
}
