//! ZIP container reading and typed collection parsing.

use std::collections::{BTreeSet, HashMap};
use std::io::{Cursor, Read};

use rallydesk_core::config::DateRange;
use rallydesk_core::records::{
    ClubRecord, EventRecord, EventTypeRecord, ZoneRecord, UNKNOWN_NAME,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zip::ZipArchive;

use crate::error::ArchiveError;
use crate::manifest::{check_version, verify_checksums, Manifest, MANIFEST_FILE_NAME};

// ── Member names ─────────────────────────────────────────────────────

pub const EVENTS_FILE: &str = "events.json";
pub const CLUBS_FILE: &str = "clubs.json";
pub const ZONES_FILE: &str = "zones.json";
pub const EVENT_TYPES_FILE: &str = "event-types.json";

/// Record collections every export archive must contain.
pub const REQUIRED_FILES: &[&str] = &[EVENTS_FILE, CLUBS_FILE, ZONES_FILE, EVENT_TYPES_FILE];

// ── Types ────────────────────────────────────────────────────────────

/// The typed contents of a validated export archive.
#[derive(Debug, Clone)]
pub struct ArchiveContents {
    pub events: Vec<EventRecord>,
    pub clubs: Vec<ClubRecord>,
    pub zones: Vec<ZoneRecord>,
    pub event_types: Vec<EventTypeRecord>,
    pub manifest: Option<Manifest>,
    /// Non-record members (schedule PDFs etc.), sorted by name.
    pub ancillary_files: Vec<String>,
}

/// Archive-level statistics derived from the parsed collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveStats {
    pub total_records: usize,
    /// Min/max event date, absent for an empty event collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    /// Distinct zone display names referenced by the events.
    pub zones: Vec<String>,
    /// Distinct club display names referenced by the events.
    pub clubs: Vec<String>,
    /// Distinct event-type display names referenced by the events.
    pub event_types: Vec<String>,
}

// ── Reading ──────────────────────────────────────────────────────────

/// Read and validate an export archive from raw bytes.
///
/// Structural problems (unreadable container, missing required members,
/// malformed JSON) are accumulated into a single validation error.
/// When `validate_manifest` is set, the manifest must be present, its
/// version supported, and every listed checksum correct — all before
/// any collection is handed to the caller.
pub fn read_archive(bytes: &[u8], validate_manifest: bool) -> Result<ArchiveContents, ArchiveError> {
    let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(|e| ArchiveError::Validation {
        problems: vec![format!("Not a readable ZIP archive: {e}")],
    })?;

    let mut members: HashMap<String, Vec<u8>> = HashMap::new();
    for i in 0..zip.len() {
        let mut file = zip.by_index(i).map_err(|e| ArchiveError::Validation {
            problems: vec![format!("Unreadable archive member at index {i}: {e}")],
        })?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf).map_err(|e| ArchiveError::Validation {
            problems: vec![format!("Failed to read archive member '{name}': {e}")],
        })?;
        members.insert(name, buf);
    }

    // Required members are checked together so one upload round-trip
    // surfaces every gap.
    let missing: Vec<String> = REQUIRED_FILES
        .iter()
        .filter(|name| !members.contains_key(**name))
        .map(|name| format!("Missing required archive file: {name}"))
        .collect();
    if !missing.is_empty() {
        return Err(ArchiveError::Validation { problems: missing });
    }

    let manifest = members
        .get(MANIFEST_FILE_NAME)
        .map(|bytes| {
            serde_json::from_slice::<Manifest>(bytes).map_err(|e| ArchiveError::Validation {
                problems: vec![format!("Malformed {MANIFEST_FILE_NAME}: {e}")],
            })
        })
        .transpose()?;

    if validate_manifest {
        let Some(manifest) = &manifest else {
            return Err(ArchiveError::Validation {
                problems: vec![format!(
                    "{MANIFEST_FILE_NAME} is required when manifest validation is enabled"
                )],
            });
        };
        check_version(manifest)?;
        verify_checksums(manifest, &members)?;
    }

    let mut problems = Vec::new();
    let events = parse_member::<EventRecord>(&members, EVENTS_FILE, &mut problems);
    let clubs = parse_member::<ClubRecord>(&members, CLUBS_FILE, &mut problems);
    let zones = parse_member::<ZoneRecord>(&members, ZONES_FILE, &mut problems);
    let event_types = parse_member::<EventTypeRecord>(&members, EVENT_TYPES_FILE, &mut problems);
    if !problems.is_empty() {
        return Err(ArchiveError::Validation { problems });
    }

    let mut ancillary_files: Vec<String> = members
        .keys()
        .filter(|name| !REQUIRED_FILES.contains(&name.as_str()) && *name != MANIFEST_FILE_NAME)
        .cloned()
        .collect();
    ancillary_files.sort();

    Ok(ArchiveContents {
        events,
        clubs,
        zones,
        event_types,
        manifest,
        ancillary_files,
    })
}

/// Parse one JSON array member, pushing a problem instead of failing
/// fast so every malformed member is reported at once.
fn parse_member<T: DeserializeOwned>(
    members: &HashMap<String, Vec<u8>>,
    name: &str,
    problems: &mut Vec<String>,
) -> Vec<T> {
    // Presence was checked above.
    let bytes = &members[name];
    match serde_json::from_slice(bytes) {
        Ok(records) => records,
        Err(e) => {
            problems.push(format!("Malformed {name}: {e}"));
            Vec::new()
        }
    }
}

// ── Statistics ───────────────────────────────────────────────────────

/// Derive archive-level statistics from parsed contents.
pub fn archive_stats(contents: &ArchiveContents) -> ArchiveStats {
    let clubs_by_id: HashMap<&str, &ClubRecord> =
        contents.clubs.iter().map(|c| (c.id.as_str(), c)).collect();
    let zones_by_id: HashMap<&str, &ZoneRecord> =
        contents.zones.iter().map(|z| (z.id.as_str(), z)).collect();
    let types_by_id: HashMap<&str, &EventTypeRecord> = contents
        .event_types
        .iter()
        .map(|t| (t.id.as_str(), t))
        .collect();

    let mut date_range: Option<DateRange> = None;
    let mut zones = BTreeSet::new();
    let mut clubs = BTreeSet::new();
    let mut event_types = BTreeSet::new();

    for event in &contents.events {
        date_range = Some(match date_range {
            None => DateRange {
                start: event.date,
                end: event.date,
            },
            Some(range) => DateRange {
                start: range.start.min(event.date),
                end: range.end.max(event.date),
            },
        });

        let club = event
            .club_id
            .as_deref()
            .map(|id| clubs_by_id.get(id).copied());
        if let Some(club) = club {
            clubs.insert(club.map_or(UNKNOWN_NAME, |c| c.name.as_str()).to_string());
        }

        let zone_id = club
            .flatten()
            .and_then(|c| c.zone_id.as_deref())
            .or(event.zone_id.as_deref());
        if let Some(zone_id) = zone_id {
            zones.insert(
                zones_by_id
                    .get(zone_id)
                    .map_or(UNKNOWN_NAME, |z| z.name.as_str())
                    .to_string(),
            );
        }

        if let Some(type_id) = event.event_type_id.as_deref() {
            event_types.insert(
                types_by_id
                    .get(type_id)
                    .map_or(UNKNOWN_NAME, |t| t.name.as_str())
                    .to_string(),
            );
        }
    }

    ArchiveStats {
        total_records: contents.events.len(),
        date_range,
        zones: zones.into_iter().collect(),
        clubs: clubs.into_iter().collect(),
        event_types: event_types.into_iter().collect(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
