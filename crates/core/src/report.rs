//! Operation result and summary aggregation.
//!
//! The summary is a pure reduction over the records an operation
//! actually processed; it has no failure modes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::matching::MatchResult;

// ── Summary ──────────────────────────────────────────────────────────

/// Counting maps keyed by display names.
///
/// Ordered maps keep serialized output deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    pub by_zone: BTreeMap<String, usize>,
    pub by_club: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
    pub by_match_type: BTreeMap<String, usize>,
}

impl OperationSummary {
    /// Count one processed record. `match_type` is absent for imported
    /// records, which have no retained match.
    pub fn record(&mut self, zone: &str, club: &str, status: &str, match_type: Option<&str>) {
        *self.by_zone.entry(zone.to_string()).or_default() += 1;
        *self.by_club.entry(club.to_string()).or_default() += 1;
        *self.by_status.entry(status.to_string()).or_default() += 1;
        if let Some(mt) = match_type {
            *self.by_match_type.entry(mt.to_string()).or_default() += 1;
        }
    }

    /// Reduce a set of matches into a summary.
    pub fn from_matches<'a>(matches: impl IntoIterator<Item = &'a MatchResult>) -> Self {
        let mut summary = Self::default();
        for m in matches {
            summary.record(&m.zone, &m.club, &m.status, Some(m.match_type.as_str()));
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.by_zone.values().sum()
    }
}

// ── Operation result ─────────────────────────────────────────────────

/// The outcome of one analyze-backed purge or import run, returned to
/// the caller and never persisted by this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    /// Run id, attached to every log event of the operation.
    pub operation_id: String,
    /// False only on a fatal store failure mid-operation; per-item
    /// failures alone leave this true.
    pub success: bool,
    /// Records selected for the operation after matching and filtering.
    pub matched: usize,
    /// Records actually deleted (purge) or created/updated (import).
    /// For a dry run, the count that would have been affected.
    pub affected: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Snapshot name when a backup was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_created: Option<String>,
    /// Chunks committed before completion or fatal failure.
    pub chunks_committed: usize,
    /// Ids created by an import, for compensating rollback.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub created_ids: Vec<String>,
    pub elapsed_ms: u64,
    pub summary: OperationSummary,
}

impl OperationResult {
    pub fn new(operation_id: String) -> Self {
        Self {
            operation_id,
            success: true,
            matched: 0,
            affected: 0,
            skipped: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            backup_created: None,
            chunks_committed: 0,
            created_ids: Vec::new(),
            elapsed_ms: 0,
            summary: OperationSummary::default(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::MatchType;
    use crate::records::EventRecord;

    fn match_result(zone: &str, club: &str, status: &str, match_type: MatchType) -> MatchResult {
        MatchResult {
            live_id: "e1".to_string(),
            archive_record: EventRecord {
                id: "e1".to_string(),
                name: "Spring Rally".to_string(),
                date: "2025-09-15".parse().unwrap(),
                club_id: None,
                zone_id: None,
                event_type_id: None,
                status: status.to_string(),
            },
            confidence: 85.0,
            match_type,
            club: club.to_string(),
            zone: zone.to_string(),
            status: status.to_string(),
        }
    }

    #[test]
    fn counts_by_every_dimension() {
        let matches = vec![
            match_result("North", "North Riders", "approved", MatchType::Exact),
            match_result("North", "Hilltop", "pending", MatchType::Near),
            match_result("South", "North Riders", "approved", MatchType::Exact),
        ];
        let summary = OperationSummary::from_matches(&matches);

        assert_eq!(summary.by_zone["North"], 2);
        assert_eq!(summary.by_zone["South"], 1);
        assert_eq!(summary.by_club["North Riders"], 2);
        assert_eq!(summary.by_status["approved"], 2);
        assert_eq!(summary.by_match_type["exact"], 2);
        assert_eq!(summary.by_match_type["near"], 1);
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn empty_input_yields_empty_summary() {
        let summary = OperationSummary::from_matches(&[]);
        assert_eq!(summary, OperationSummary::default());
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn imported_records_have_no_match_type_bucket() {
        let mut summary = OperationSummary::default();
        summary.record("North", "North Riders", "approved", None);
        assert_eq!(summary.by_zone["North"], 1);
        assert!(summary.by_match_type.is_empty());
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = OperationResult::new("op-1".to_string());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["operationId"], "op-1");
        assert!(json["summary"]["byZone"].is_object());
        assert!(json.get("backupCreated").is_none());
        assert!(json.get("createdIds").is_none());
    }
}
