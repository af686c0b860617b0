//! Import conflict taxonomy, detection, and resolution semantics.
//!
//! Detection is deliberately stricter than the matcher: only exact,
//! case-sensitive id and name collisions raise blocking conflicts, so a
//! fuzzy near-match can never cause an accidental overwrite. Reference
//! gaps (club / event type missing from the archive) are advisory and
//! never block a write.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::records::{ClubRecord, EventRecord, EventTypeRecord};

// ── Conflict type ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Archive record id collides with a live record id.
    DuplicateId,
    /// Names collide on records with the same date.
    DuplicateName,
    /// Names collide on records with different dates.
    DateConflict,
    /// Archive record references a club absent from the archive.
    ClubMissing,
    /// Archive record references an event type absent from the archive.
    TypeMissing,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateId => "duplicate_id",
            Self::DuplicateName => "duplicate_name",
            Self::DateConflict => "date_conflict",
            Self::ClubMissing => "club_missing",
            Self::TypeMissing => "type_missing",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "duplicate_id" => Some(Self::DuplicateId),
            "duplicate_name" => Some(Self::DuplicateName),
            "date_conflict" => Some(Self::DateConflict),
            "club_missing" => Some(Self::ClubMissing),
            "type_missing" => Some(Self::TypeMissing),
            _ => None,
        }
    }

    /// All valid conflict type values.
    pub const ALL: &'static [&'static str] = &[
        "duplicate_id",
        "duplicate_name",
        "date_conflict",
        "club_missing",
        "type_missing",
    ];

    pub fn severity(&self) -> ConflictSeverity {
        match self {
            Self::DuplicateId => ConflictSeverity::High,
            Self::DuplicateName | Self::DateConflict => ConflictSeverity::Medium,
            Self::ClubMissing | Self::TypeMissing => ConflictSeverity::Low,
        }
    }

    /// Whether a conflict of this type requires a resolution before the
    /// record may be written.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::DuplicateId | Self::DuplicateName | Self::DateConflict
        )
    }

    /// Whether this is a name-level collision (downgradable by the
    /// allow-duplicates setting).
    pub fn is_name_collision(&self) -> bool {
        matches!(self, Self::DuplicateName | Self::DateConflict)
    }
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Severity ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    High,
    Medium,
    Low,
}

impl ConflictSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Resolution ───────────────────────────────────────────────────────

/// Operator-chosen handling for a blocking conflict, applied at write
/// time by the batch executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Do not write the archive record; count it as skipped.
    Skip,
    /// Write the archive record under the existing live id, replacing
    /// its fields.
    Overwrite,
    /// Write under a freshly generated id with a suffixed name.
    Rename,
    /// Unsupported; behaves as skip and is flagged as a warning.
    Merge,
}

impl ConflictResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Overwrite => "overwrite",
            Self::Rename => "rename",
            Self::Merge => "merge",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "skip" => Some(Self::Skip),
            "overwrite" => Some(Self::Overwrite),
            "rename" => Some(Self::Rename),
            "merge" => Some(Self::Merge),
            _ => None,
        }
    }

    /// All valid resolution values.
    pub const ALL: &'static [&'static str] = &["skip", "overwrite", "rename", "merge"];
}

impl std::fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Conflict item ────────────────────────────────────────────────────

/// A detected overlap between an archive record intended for import and
/// the live dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictItem {
    /// Stable conflict id: `{type}:{archive record id}`.
    pub id: String,
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub severity: ConflictSeverity,
    /// The colliding live record, where one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing: Option<EventRecord>,
    /// The archive record being imported.
    pub imported: EventRecord,
    /// Caller-supplied resolution; `None` until decided (blocking
    /// conflicts default to skip at write time).
    pub resolution: Option<ConflictResolution>,
    pub message: String,
}

impl ConflictItem {
    fn new(
        conflict_type: ConflictType,
        existing: Option<&EventRecord>,
        imported: &EventRecord,
        message: String,
    ) -> Self {
        Self {
            id: format!("{}:{}", conflict_type, imported.id),
            conflict_type,
            severity: conflict_type.severity(),
            existing: existing.cloned(),
            imported: imported.clone(),
            resolution: None,
            message,
        }
    }
}

// ── Detection ────────────────────────────────────────────────────────

/// Detect conflicts between archive records intended for import and the
/// existing live records.
///
/// Id and name comparisons are exact and case-sensitive. Each archive
/// record raises at most one blocking conflict (an id collision takes
/// precedence over a name collision) plus any advisory reference gaps.
pub fn detect_conflicts(
    archive_records: &[EventRecord],
    live_records: &[EventRecord],
    archive_clubs: &[ClubRecord],
    archive_event_types: &[EventTypeRecord],
) -> Vec<ConflictItem> {
    let live_by_id: HashMap<&str, &EventRecord> =
        live_records.iter().map(|r| (r.id.as_str(), r)).collect();
    let live_by_name: HashMap<&str, &EventRecord> =
        live_records.iter().map(|r| (r.name.as_str(), r)).collect();
    let club_ids: HashSet<&str> = archive_clubs.iter().map(|c| c.id.as_str()).collect();
    let type_ids: HashSet<&str> = archive_event_types
        .iter()
        .map(|t| t.id.as_str())
        .collect();

    let mut conflicts = Vec::new();

    for imported in archive_records {
        if let Some(existing) = live_by_id.get(imported.id.as_str()) {
            conflicts.push(ConflictItem::new(
                ConflictType::DuplicateId,
                Some(existing),
                imported,
                format!(
                    "Archive event '{}' has the same id as live event '{}' ({})",
                    imported.name, existing.name, existing.id
                ),
            ));
        } else if let Some(existing) = live_by_name.get(imported.name.as_str()) {
            let conflict_type = if existing.date == imported.date {
                ConflictType::DuplicateName
            } else {
                ConflictType::DateConflict
            };
            conflicts.push(ConflictItem::new(
                conflict_type,
                Some(existing),
                imported,
                format!(
                    "Archive event '{}' ({}) has the same name as live event {} ({})",
                    imported.name, imported.date, existing.id, existing.date
                ),
            ));
        }

        if let Some(club_id) = &imported.club_id {
            if !club_ids.contains(club_id.as_str()) {
                conflicts.push(ConflictItem::new(
                    ConflictType::ClubMissing,
                    None,
                    imported,
                    format!(
                        "Archive event '{}' references club '{club_id}' not present in the archive",
                        imported.name
                    ),
                ));
            }
        }
        if let Some(type_id) = &imported.event_type_id {
            if !type_ids.contains(type_id.as_str()) {
                conflicts.push(ConflictItem::new(
                    ConflictType::TypeMissing,
                    None,
                    imported,
                    format!(
                        "Archive event '{}' references event type '{type_id}' not present in the archive",
                        imported.name
                    ),
                ));
            }
        }
    }

    conflicts
}

// ── Rename helpers ───────────────────────────────────────────────────

/// Suffix appended to the name of a record imported under a new id.
pub const IMPORTED_NAME_SUFFIX: &str = " (Imported)";

/// Generate the id for a record imported under the rename resolution.
///
/// The unix timestamp keeps the id disjoint from any live id space.
pub fn renamed_import_id(archive_id: &str, unix_ts: i64) -> String {
    format!("{archive_id}_imported_{unix_ts}")
}

/// Generate the display name for a record imported under the rename
/// resolution.
pub fn renamed_import_name(name: &str) -> String {
    format!("{name}{IMPORTED_NAME_SUFFIX}")
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn event(id: &str, name: &str, day: &str) -> EventRecord {
        EventRecord {
            id: id.to_string(),
            name: name.to_string(),
            date: day.parse::<NaiveDate>().unwrap(),
            club_id: None,
            zone_id: None,
            event_type_id: None,
            status: "approved".to_string(),
        }
    }

    // -- detection ------------------------------------------------------------

    #[test]
    fn id_collision_is_high_severity() {
        let live = vec![event("e1", "Spring Rally", "2025-09-15")];
        let archive = vec![event("e1", "Autumn Rally", "2025-10-01")];
        let conflicts = detect_conflicts(&archive, &live, &[], &[]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::DuplicateId);
        assert_eq!(conflicts[0].severity, ConflictSeverity::High);
        assert_eq!(conflicts[0].existing.as_ref().unwrap().id, "e1");
        assert!(conflicts[0].resolution.is_none());
    }

    #[test]
    fn name_collision_same_date_is_duplicate_name() {
        let live = vec![event("e1", "Spring Rally", "2025-09-15")];
        let archive = vec![event("a1", "Spring Rally", "2025-09-15")];
        let conflicts = detect_conflicts(&archive, &live, &[], &[]);
        assert_eq!(conflicts[0].conflict_type, ConflictType::DuplicateName);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Medium);
    }

    #[test]
    fn name_collision_different_date_is_date_conflict() {
        let live = vec![event("e1", "Spring Rally", "2025-09-15")];
        let archive = vec![event("a1", "Spring Rally", "2025-10-20")];
        let conflicts = detect_conflicts(&archive, &live, &[], &[]);
        assert_eq!(conflicts[0].conflict_type, ConflictType::DateConflict);
    }

    #[test]
    fn id_collision_takes_precedence_over_name_collision() {
        let live = vec![event("e1", "Spring Rally", "2025-09-15")];
        let archive = vec![event("e1", "Spring Rally", "2025-09-15")];
        let conflicts = detect_conflicts(&archive, &live, &[], &[]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::DuplicateId);
    }

    #[test]
    fn name_matching_is_case_sensitive() {
        let live = vec![event("e1", "Spring Rally", "2025-09-15")];
        let archive = vec![event("a1", "SPRING RALLY", "2025-09-15")];
        assert!(detect_conflicts(&archive, &live, &[], &[]).is_empty());
    }

    #[test]
    fn unresolved_club_reference_is_advisory() {
        let mut rec = event("a1", "Spring Rally", "2025-09-15");
        rec.club_id = Some("c404".to_string());
        let conflicts = detect_conflicts(&[rec], &[], &[], &[]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::ClubMissing);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Low);
        assert!(!conflicts[0].conflict_type.is_blocking());
        assert!(conflicts[0].existing.is_none());
    }

    #[test]
    fn resolved_club_reference_raises_nothing() {
        let mut rec = event("a1", "Spring Rally", "2025-09-15");
        rec.club_id = Some("c1".to_string());
        let clubs = vec![ClubRecord {
            id: "c1".to_string(),
            name: "North Riders".to_string(),
            zone_id: None,
        }];
        assert!(detect_conflicts(&[rec], &[], &clubs, &[]).is_empty());
    }

    #[test]
    fn unresolved_event_type_reference_is_advisory() {
        let mut rec = event("a1", "Spring Rally", "2025-09-15");
        rec.event_type_id = Some("t404".to_string());
        let conflicts = detect_conflicts(&[rec], &[], &[], &[]);
        assert_eq!(conflicts[0].conflict_type, ConflictType::TypeMissing);
    }

    #[test]
    fn no_conflicts_for_disjoint_records() {
        let live = vec![event("e1", "Spring Rally", "2025-09-15")];
        let archive = vec![event("a1", "Winter Gymkhana", "2025-01-10")];
        assert!(detect_conflicts(&archive, &live, &[], &[]).is_empty());
    }

    #[test]
    fn conflict_ids_name_type_and_record() {
        let live = vec![event("e1", "Spring Rally", "2025-09-15")];
        let archive = vec![event("e1", "Autumn Rally", "2025-10-01")];
        let conflicts = detect_conflicts(&archive, &live, &[], &[]);
        assert_eq!(conflicts[0].id, "duplicate_id:e1");
    }

    // -- enums ----------------------------------------------------------------

    #[test]
    fn conflict_type_round_trip() {
        for s in ConflictType::ALL {
            assert_eq!(ConflictType::from_str(s).unwrap().as_str(), *s);
        }
        assert!(ConflictType::from_str("unknown").is_none());
    }

    #[test]
    fn resolution_round_trip() {
        for s in ConflictResolution::ALL {
            assert_eq!(ConflictResolution::from_str(s).unwrap().as_str(), *s);
        }
        assert!(ConflictResolution::from_str("delete").is_none());
    }

    #[test]
    fn name_collisions_are_downgradable() {
        assert!(ConflictType::DuplicateName.is_name_collision());
        assert!(ConflictType::DateConflict.is_name_collision());
        assert!(!ConflictType::DuplicateId.is_name_collision());
    }

    // -- rename helpers -------------------------------------------------------

    #[test]
    fn renamed_id_embeds_archive_id_and_timestamp() {
        assert_eq!(renamed_import_id("e1", 1_757_894_400), "e1_imported_1757894400");
    }

    #[test]
    fn renamed_name_gets_suffix() {
        assert_eq!(renamed_import_name("Rally"), "Rally (Imported)");
    }
}
