//! The `analyze`, `purge`, `import`, and `rollback_import` operations.
//!
//! Each operation runs within one request/response cycle: validate
//! config → read archive → match / detect conflicts → execute batches
//! → aggregate. Validation, integrity, and incompatibility failures
//! all surface before the store is touched; failures past that point
//! are collected into the returned [`OperationResult`].

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use rallydesk_archive::{archive_stats, read_archive, ArchiveContents, ArchiveStats};
use rallydesk_core::config::OperationConfig;
use rallydesk_core::conflict::{
    detect_conflicts, renamed_import_id, renamed_import_name, ConflictItem, ConflictResolution,
};
use rallydesk_core::matching::{match_records, MatchResult, NameResolver};
use rallydesk_core::records::{ClubRecord, EventRecord, ZoneRecord};
use rallydesk_core::report::{OperationResult, OperationSummary};
use rallydesk_store::{
    BackupSink, RecordStore, StoreError, StoreOp, COLLECTION_CLUBS, COLLECTION_EVENTS,
    COLLECTION_ZONES,
};

use crate::error::EngineError;
use crate::executor::{write_backup, BatchExecutor};

// ---------------------------------------------------------------------------
// Analyze
// ---------------------------------------------------------------------------

/// The outcome of a read-only archive analysis.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeReport {
    pub analysis: ArchiveStats,
    pub matches: Vec<MatchResult>,
}

/// Validate an archive and match its events against the live store.
/// Read-only; never mutates anything.
pub async fn analyze(
    bytes: &[u8],
    config: &OperationConfig,
    store: &dyn RecordStore,
) -> Result<AnalyzeReport, EngineError> {
    config.validate()?;
    let contents = read_archive(bytes, config.validate_manifest)?;
    let analysis = archive_stats(&contents);

    let live = load_collection::<EventRecord>(store, COLLECTION_EVENTS).await?;
    let clubs = load_collection::<ClubRecord>(store, COLLECTION_CLUBS).await?;
    let zones = load_collection::<ZoneRecord>(store, COLLECTION_ZONES).await?;
    let matches = match_records(&live, &contents.events, &clubs, &zones);

    info!(
        archive_records = analysis.total_records,
        live_records = live.len(),
        matches = matches.len(),
        "Archive analysis complete"
    );
    Ok(AnalyzeReport { analysis, matches })
}

/// Detect import conflicts between an archive and the live store, for
/// the operator to resolve before committing an import.
pub async fn detect_import_conflicts(
    bytes: &[u8],
    config: &OperationConfig,
    store: &dyn RecordStore,
) -> Result<Vec<ConflictItem>, EngineError> {
    config.validate()?;
    let contents = read_archive(bytes, config.validate_manifest)?;
    let live = load_collection::<EventRecord>(store, COLLECTION_EVENTS).await?;
    Ok(detect_conflicts(
        &contents.events,
        &live,
        &contents.clubs,
        &contents.event_types,
    ))
}

// ---------------------------------------------------------------------------
// Purge
// ---------------------------------------------------------------------------

/// Delete the live records matched by an archive, restricted by the
/// configured zone / club / date / status filters.
pub async fn purge(
    bytes: &[u8],
    config: &OperationConfig,
    store: &dyn RecordStore,
    backup: &dyn BackupSink,
) -> Result<OperationResult, EngineError> {
    let started = Instant::now();
    let operation_id = Uuid::new_v4().to_string();
    config.validate()?;

    let contents = read_archive(bytes, config.validate_manifest)?;
    let live = load_collection::<EventRecord>(store, COLLECTION_EVENTS).await?;
    let clubs = load_collection::<ClubRecord>(store, COLLECTION_CLUBS).await?;
    let zones = load_collection::<ZoneRecord>(store, COLLECTION_ZONES).await?;
    let live_by_id: HashMap<&str, &EventRecord> =
        live.iter().map(|r| (r.id.as_str(), r)).collect();

    let matches = match_records(&live, &contents.events, &clubs, &zones);
    let total_matches = matches.len();
    let selected: Vec<MatchResult> = matches
        .into_iter()
        .filter(|m| {
            let date = live_by_id
                .get(m.live_id.as_str())
                .map_or(m.archive_record.date, |r| r.date);
            config.filters.selects(&m.zone, &m.club, date) && config.selects_status(&m.status)
        })
        .collect();

    let mut result = OperationResult::new(operation_id.clone());
    result.matched = selected.len();
    result.skipped = total_matches - selected.len();

    if config.create_backup && !config.dry_run {
        let to_delete: Vec<EventRecord> = selected
            .iter()
            .filter_map(|m| live_by_id.get(m.live_id.as_str()).copied().cloned())
            .collect();
        match write_backup(backup, "purge", &to_delete).await {
            Ok(name) => result.backup_created = Some(name),
            Err(e) => {
                warn!(operation = %operation_id, error = %e, "Backup failed; continuing");
                result.errors.push(format!("Backup failed (continuing): {e}"));
            }
        }
    }

    let mut executor = BatchExecutor::new(store, config.dry_run);
    let mut fatal: Option<StoreError> = None;
    for m in &selected {
        if let Err(e) = executor
            .push(StoreOp::delete(COLLECTION_EVENTS, &m.live_id))
            .await
        {
            fatal = Some(e);
            break;
        }
    }
    if fatal.is_none() {
        fatal = executor.flush().await.err();
    }
    let report = executor.into_report();

    for id in &report.failed {
        let name = live_by_id
            .get(id.as_str())
            .map_or("unknown record", |r| r.name.as_str());
        result
            .errors
            .push(format!("Failed to delete '{name}' ({id})"));
    }

    result.affected = report.succeeded.len();
    result.chunks_committed = report.chunks_committed;
    if let Some(e) = fatal {
        result.success = false;
        result.errors.push(format!(
            "Store commit failed after {} committed chunk(s): {e}",
            report.chunks_committed
        ));
        error!(operation = %operation_id, error = %e, "Purge aborted on store failure");
    }

    let succeeded: HashSet<&str> = report.succeeded.iter().map(String::as_str).collect();
    result.summary = OperationSummary::from_matches(
        selected
            .iter()
            .filter(|m| succeeded.contains(m.live_id.as_str())),
    );

    result.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        operation = %operation_id,
        matched = result.matched,
        deleted = result.affected,
        skipped = result.skipped,
        dry_run = config.dry_run,
        success = result.success,
        "Purge complete"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// One write planned by the import pipeline, with the display context
/// needed for error reporting and the summary.
struct PlannedWrite {
    op: StoreOp,
    id: String,
    display_name: String,
    zone: String,
    club: String,
    status: String,
    /// Created under a new id (as opposed to overwriting a live one).
    created: bool,
}

/// Import the archive's events into the live store, honouring the
/// caller-resolved conflicts.
///
/// Blocking conflicts without a supplied resolution default to skip;
/// the merge resolution is unsupported and behaves as skip with a
/// warning.
pub async fn import(
    bytes: &[u8],
    config: &OperationConfig,
    resolutions: &[ConflictItem],
    store: &dyn RecordStore,
    backup: &dyn BackupSink,
) -> Result<OperationResult, EngineError> {
    let started = Instant::now();
    let operation_id = Uuid::new_v4().to_string();
    config.validate()?;

    let contents = read_archive(bytes, config.validate_manifest)?;
    let live = load_collection::<EventRecord>(store, COLLECTION_EVENTS).await?;

    let conflicts = detect_conflicts(
        &contents.events,
        &live,
        &contents.clubs,
        &contents.event_types,
    );
    let chosen: HashMap<&str, ConflictResolution> = resolutions
        .iter()
        .filter_map(|c| c.resolution.map(|r| (c.id.as_str(), r)))
        .collect();
    let blocking: HashMap<&str, &ConflictItem> = conflicts
        .iter()
        .filter(|c| c.conflict_type.is_blocking())
        .map(|c| (c.imported.id.as_str(), c))
        .collect();

    let mut result = OperationResult::new(operation_id.clone());
    for advisory in conflicts.iter().filter(|c| !c.conflict_type.is_blocking()) {
        result.warnings.push(advisory.message.clone());
    }
    if config.skip_ancillary_files && !contents.ancillary_files.is_empty() {
        result.warnings.push(format!(
            "Skipped {} ancillary archive file(s)",
            contents.ancillary_files.len()
        ));
    }

    let planned = plan_import_writes(&contents, config, &blocking, &chosen, &mut result);
    result.matched = planned.len();

    if config.create_backup && !config.dry_run {
        let live_by_id: HashMap<&str, &EventRecord> =
            live.iter().map(|r| (r.id.as_str(), r)).collect();
        let overwritten: Vec<EventRecord> = planned
            .iter()
            .filter(|w| !w.created)
            .filter_map(|w| live_by_id.get(w.id.as_str()).copied().cloned())
            .collect();
        if !overwritten.is_empty() {
            match write_backup(backup, "import", &overwritten).await {
                Ok(name) => result.backup_created = Some(name),
                Err(e) => {
                    warn!(operation = %operation_id, error = %e, "Backup failed; continuing");
                    result.errors.push(format!("Backup failed (continuing): {e}"));
                }
            }
        }
    }

    let mut executor = BatchExecutor::new(store, config.dry_run);
    let mut fatal: Option<StoreError> = None;
    for write in &planned {
        if let Err(e) = executor.push(write.op.clone()).await {
            fatal = Some(e);
            break;
        }
    }
    if fatal.is_none() {
        fatal = executor.flush().await.err();
    }
    let report = executor.into_report();

    let planned_by_id: HashMap<&str, &PlannedWrite> =
        planned.iter().map(|w| (w.id.as_str(), w)).collect();
    for id in &report.failed {
        let name = planned_by_id
            .get(id.as_str())
            .map_or("unknown record", |w| w.display_name.as_str());
        result.errors.push(format!("Failed to write '{name}' ({id})"));
    }

    let succeeded: HashSet<&str> = report.succeeded.iter().map(String::as_str).collect();
    for write in &planned {
        if succeeded.contains(write.id.as_str()) {
            result
                .summary
                .record(&write.zone, &write.club, &write.status, None);
            if write.created {
                result.created_ids.push(write.id.clone());
            }
        }
    }

    result.affected = report.succeeded.len();
    result.chunks_committed = report.chunks_committed;
    if let Some(e) = fatal {
        result.success = false;
        result.errors.push(format!(
            "Store commit failed after {} committed chunk(s): {e}",
            report.chunks_committed
        ));
        error!(operation = %operation_id, error = %e, "Import aborted on store failure");
    }

    result.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        operation = %operation_id,
        imported = result.affected,
        skipped = result.skipped,
        conflicts = conflicts.len(),
        dry_run = config.dry_run,
        success = result.success,
        "Import complete"
    );
    Ok(result)
}

/// Turn the archive's events into planned writes, applying filters and
/// conflict resolutions. Skips are counted on `result`.
fn plan_import_writes(
    contents: &ArchiveContents,
    config: &OperationConfig,
    blocking: &HashMap<&str, &ConflictItem>,
    chosen: &HashMap<&str, ConflictResolution>,
    result: &mut OperationResult,
) -> Vec<PlannedWrite> {
    let resolver = NameResolver::new(&contents.clubs, &contents.zones);
    let rename_ts = Utc::now().timestamp();
    let mut planned = Vec::new();

    for event in &contents.events {
        let (club, zone) = resolver.resolve(event);
        if !config.filters.selects(&zone, &club, event.date) || !config.selects_status(&event.status)
        {
            result.skipped += 1;
            continue;
        }

        let Some(conflict) = blocking.get(event.id.as_str()) else {
            planned.push(planned_create(event.clone(), club, zone));
            continue;
        };

        if config.allow_duplicates && conflict.conflict_type.is_name_collision() {
            planned.push(planned_create(event.clone(), club, zone));
            continue;
        }

        let resolution = chosen
            .get(conflict.id.as_str())
            .copied()
            .unwrap_or(ConflictResolution::Skip);
        match resolution {
            ConflictResolution::Skip => result.skipped += 1,
            ConflictResolution::Merge => {
                result.skipped += 1;
                result.warnings.push(format!(
                    "Merge resolution is not supported; '{}' was skipped",
                    event.name
                ));
            }
            ConflictResolution::Overwrite => {
                // Blocking conflicts always carry the colliding record.
                let Some(existing) = conflict.existing.as_ref() else {
                    result.skipped += 1;
                    continue;
                };
                let mut record = event.clone();
                record.id = existing.id.clone();
                let op = record_put(&record);
                planned.push(PlannedWrite {
                    op,
                    id: record.id.clone(),
                    display_name: record.name.clone(),
                    zone,
                    club,
                    status: record.status.clone(),
                    created: false,
                });
            }
            ConflictResolution::Rename => {
                let mut record = event.clone();
                record.id = renamed_import_id(&event.id, rename_ts);
                record.name = renamed_import_name(&event.name);
                planned.push(planned_create(record, club, zone));
            }
        }
    }

    planned
}

fn planned_create(record: EventRecord, club: String, zone: String) -> PlannedWrite {
    let op = record_put(&record);
    PlannedWrite {
        op,
        id: record.id.clone(),
        display_name: record.name.clone(),
        zone,
        club,
        status: record.status.clone(),
        created: true,
    }
}

fn record_put(record: &EventRecord) -> StoreOp {
    // EventRecord serialization is infallible.
    let document = serde_json::to_value(record).unwrap_or(serde_json::Value::Null);
    StoreOp::put(COLLECTION_EVENTS, &record.id, document)
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

/// Compensate a completed import by deleting exactly the ids it
/// created, using the same chunking discipline as the import itself.
pub async fn rollback_import(store: &dyn RecordStore, created_ids: &[String]) -> OperationResult {
    let started = Instant::now();
    let operation_id = Uuid::new_v4().to_string();
    let mut result = OperationResult::new(operation_id.clone());
    result.matched = created_ids.len();

    let mut executor = BatchExecutor::new(store, false);
    let mut fatal: Option<StoreError> = None;
    for id in created_ids {
        if let Err(e) = executor.push(StoreOp::delete(COLLECTION_EVENTS, id)).await {
            fatal = Some(e);
            break;
        }
    }
    if fatal.is_none() {
        fatal = executor.flush().await.err();
    }
    let report = executor.into_report();

    for id in &report.failed {
        result
            .errors
            .push(format!("Failed to delete imported record {id}"));
    }
    result.affected = report.succeeded.len();
    result.chunks_committed = report.chunks_committed;
    if let Some(e) = fatal {
        result.success = false;
        result.errors.push(format!(
            "Store commit failed after {} committed chunk(s): {e}",
            report.chunks_committed
        ));
        error!(operation = %operation_id, error = %e, "Rollback aborted on store failure");
    }

    result.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        operation = %operation_id,
        deleted = result.affected,
        success = result.success,
        "Import rollback complete"
    );
    result
}

// ---------------------------------------------------------------------------
// Store loading
// ---------------------------------------------------------------------------

/// Load and deserialize a live collection. Malformed documents are
/// skipped with a warning rather than failing the whole operation.
async fn load_collection<T: serde::de::DeserializeOwned>(
    store: &dyn RecordStore,
    collection: &str,
) -> Result<Vec<T>, EngineError> {
    let documents = store.query(collection).await?;
    let mut records = Vec::with_capacity(documents.len());
    for document in documents {
        match serde_json::from_value::<T>(document) {
            Ok(record) => records.push(record),
            Err(e) => warn!(collection, error = %e, "Skipping malformed live document"),
        }
    }
    Ok(records)
}
