//! Bounded-size batch execution against the record store.
//!
//! Operations accumulate in a buffer; reaching the flush trigger
//! commits the buffer atomically and starts a new one. The trigger
//! sits below the store's hard ceiling to leave headroom, so no commit
//! ever reaches the documented maximum. Suspension points exist only
//! at commit boundaries — one chunk is in flight at a time.

use chrono::Utc;
use rallydesk_core::records::EventRecord;
use rallydesk_store::{BackupSink, RecordStore, StoreError, StoreOp};
use tracing::debug;

/// Fraction of the store's batch ceiling used as the flush trigger.
/// With the common ceiling of 500 this flushes at 450.
pub fn flush_trigger(max_batch_size: usize) -> usize {
    (max_batch_size * 9 / 10).max(1)
}

/// Per-id outcome of a batched execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// Operations handed to the executor.
    pub attempted: usize,
    /// Ids written or deleted (for a dry run: that would have been).
    pub succeeded: Vec<String>,
    /// Ids the store reported as failed inside committed chunks.
    pub failed: Vec<String>,
    /// Chunks committed to the store. Zero for a dry run.
    pub chunks_committed: usize,
}

/// Buffered, chunked writer against a [`RecordStore`].
///
/// A store-level commit error propagates to the caller; the report
/// keeps the state accumulated up to that point, so already-committed
/// chunks remain accounted for (per-chunk atomicity only).
pub struct BatchExecutor<'a> {
    store: &'a dyn RecordStore,
    dry_run: bool,
    trigger: usize,
    buffer: Vec<StoreOp>,
    report: ExecutionReport,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(store: &'a dyn RecordStore, dry_run: bool) -> Self {
        Self {
            store,
            dry_run,
            trigger: flush_trigger(store.max_batch_size()),
            buffer: Vec::new(),
            report: ExecutionReport::default(),
        }
    }

    /// Append one operation, committing the buffer when it reaches the
    /// flush trigger.
    pub async fn push(&mut self, op: StoreOp) -> Result<(), StoreError> {
        self.buffer.push(op);
        if self.buffer.len() >= self.trigger {
            self.flush().await?;
        }
        Ok(())
    }

    /// Commit any buffered operations as one chunk.
    pub async fn flush(&mut self) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::take(&mut self.buffer);
        self.report.attempted += chunk.len();

        if self.dry_run {
            self.report
                .succeeded
                .extend(chunk.iter().map(|op| op.id().to_string()));
            return Ok(());
        }

        let size = chunk.len();
        let outcome = self.store.batch_write(chunk).await?;
        self.report.chunks_committed += 1;
        debug!(
            chunk = self.report.chunks_committed,
            size,
            failed = outcome.failed.len(),
            "Committed batch chunk"
        );
        self.report.succeeded.extend(outcome.succeeded);
        self.report.failed.extend(outcome.failed);
        Ok(())
    }

    pub fn report(&self) -> &ExecutionReport {
        &self.report
    }

    pub fn into_report(self) -> ExecutionReport {
        self.report
    }
}

/// Write a timestamp-named snapshot of the records about to be mutated.
///
/// Returns the snapshot name. Callers record a failure as a non-fatal
/// error; a missing backup never blocks the operation.
pub async fn write_backup(
    sink: &dyn BackupSink,
    label: &str,
    records: &[EventRecord],
) -> Result<String, StoreError> {
    let name = format!("{label}-backup-{}", Utc::now().format("%Y%m%dT%H%M%SZ"));
    let payload = serde_json::to_value(records)
        .map_err(|e| StoreError::Unavailable(format!("Failed to serialize backup: {e}")))?;
    sink.write_snapshot(&name, payload).await?;
    Ok(name)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rallydesk_store::{MemoryBackupSink, MemoryStore};
    use serde_json::json;

    fn put(i: usize) -> StoreOp {
        StoreOp::put("events", &format!("e{i}"), json!({"id": format!("e{i}")}))
    }

    #[test]
    fn trigger_leaves_headroom_below_ceiling() {
        assert_eq!(flush_trigger(500), 450);
        assert_eq!(flush_trigger(10), 9);
        assert_eq!(flush_trigger(1), 1);
    }

    #[tokio::test]
    async fn commits_in_chunks_at_the_trigger() {
        let store = MemoryStore::with_max_batch_size(10);
        let mut executor = BatchExecutor::new(&store, false);
        for i in 0..21 {
            executor.push(put(i)).await.unwrap();
        }
        executor.flush().await.unwrap();
        let report = executor.into_report();

        assert_eq!(report.attempted, 21);
        assert_eq!(report.succeeded.len(), 21);
        assert_eq!(report.chunks_committed, 3);
        // Two full chunks at the trigger, then the remainder.
        assert_eq!(store.commit_log().await, vec![9, 9, 3]);
        assert_eq!(store.count("events").await, 21);
    }

    #[tokio::test]
    async fn no_commit_exceeds_the_trigger() {
        let store = MemoryStore::with_max_batch_size(10);
        let mut executor = BatchExecutor::new(&store, false);
        for i in 0..50 {
            executor.push(put(i)).await.unwrap();
        }
        executor.flush().await.unwrap();
        assert!(store.commit_log().await.iter().all(|&size| size <= 9));
    }

    #[tokio::test]
    async fn dry_run_commits_nothing_but_counts_everything() {
        let store = MemoryStore::with_max_batch_size(10);
        let mut executor = BatchExecutor::new(&store, true);
        for i in 0..21 {
            executor.push(put(i)).await.unwrap();
        }
        executor.flush().await.unwrap();
        let report = executor.into_report();

        assert_eq!(report.attempted, 21);
        assert_eq!(report.succeeded.len(), 21);
        assert_eq!(report.chunks_committed, 0);
        assert!(store.commit_log().await.is_empty());
        assert_eq!(store.count("events").await, 0);
    }

    #[tokio::test]
    async fn per_id_failures_do_not_stop_later_chunks() {
        let store = MemoryStore::with_max_batch_size(10);
        store.fail_id("e0").await;
        let mut executor = BatchExecutor::new(&store, false);
        for i in 0..15 {
            executor.push(put(i)).await.unwrap();
        }
        executor.flush().await.unwrap();
        let report = executor.into_report();

        assert_eq!(report.failed, vec!["e0"]);
        assert_eq!(report.succeeded.len(), 14);
        assert_eq!(report.chunks_committed, 2);
    }

    #[tokio::test]
    async fn fatal_commit_keeps_earlier_chunks() {
        let store = MemoryStore::with_max_batch_size(10);
        store.fail_on_commit(1).await;
        let mut executor = BatchExecutor::new(&store, false);

        let mut fatal = None;
        for i in 0..18 {
            if let Err(e) = executor.push(put(i)).await {
                fatal = Some(e);
                break;
            }
        }
        if fatal.is_none() {
            fatal = executor.flush().await.err();
        }

        assert!(fatal.is_some());
        let report = executor.into_report();
        assert_eq!(report.chunks_committed, 1);
        assert_eq!(report.succeeded.len(), 9);
        // The first chunk stays committed.
        assert_eq!(store.count("events").await, 9);
    }

    #[tokio::test]
    async fn empty_flush_is_a_no_op() {
        let store = MemoryStore::new();
        let mut executor = BatchExecutor::new(&store, false);
        executor.flush().await.unwrap();
        assert_eq!(executor.report().chunks_committed, 0);
    }

    #[tokio::test]
    async fn backup_snapshot_carries_the_records() {
        let sink = MemoryBackupSink::new();
        let records = vec![EventRecord {
            id: "e1".to_string(),
            name: "Spring Rally".to_string(),
            date: "2025-09-15".parse().unwrap(),
            club_id: None,
            zone_id: None,
            event_type_id: None,
            status: "approved".to_string(),
        }];
        let name = write_backup(&sink, "purge", &records).await.unwrap();
        assert!(name.starts_with("purge-backup-"));

        let snapshots = sink.snapshots().await;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].1[0]["id"], "e1");
    }
}
