//! Weighted confidence matching between live and archived events.
//!
//! Every `(live, archive)` pair receives a 0–100 confidence score from
//! weighted structural heuristics plus name similarity. Per live record
//! only the best-scoring archive pairing is kept, and pairings below
//! the discard threshold are never materialized.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::records::{ClubRecord, EventRecord, ZoneRecord, UNKNOWN_NAME};
use crate::similarity::name_similarity;

// ---------------------------------------------------------------------------
// Scoring weights
// ---------------------------------------------------------------------------

/// Identical record ids.
pub const WEIGHT_ID: f64 = 40.0;
/// Maximum contribution of name similarity.
pub const WEIGHT_NAME: f64 = 25.0;
/// Identical dates.
pub const WEIGHT_DATE_EXACT: f64 = 20.0;
/// Dates at most one day apart.
pub const WEIGHT_DATE_ADJACENT: f64 = 15.0;
/// Dates at most one week apart.
pub const WEIGHT_DATE_SAME_WEEK: f64 = 10.0;
/// Identical club references (both sides present).
pub const WEIGHT_CLUB: f64 = 10.0;
/// Identical event-type references (both sides present).
pub const WEIGHT_EVENT_TYPE: f64 = 5.0;

// ---------------------------------------------------------------------------
// Classification thresholds
// ---------------------------------------------------------------------------

/// Confidence at or above this is an exact match.
pub const EXACT_THRESHOLD: f64 = 80.0;
/// Confidence at or above this (below exact) is a near match.
pub const NEAR_THRESHOLD: f64 = 60.0;
/// Confidence below this is discarded; at or above (below near) is partial.
pub const PARTIAL_THRESHOLD: f64 = 40.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Confidence-derived classification of a retained match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Near,
    Partial,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Near => "near",
            Self::Partial => "partial",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "exact" => Some(Self::Exact),
            "near" => Some(Self::Near),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }

    /// All valid match type values.
    pub const ALL: &'static [&'static str] = &["exact", "near", "partial"];
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The retained pairing between one live record and its best-scoring
/// archive record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Id of the live record this match belongs to.
    pub live_id: String,
    /// The archive record that produced the best score.
    pub archive_record: EventRecord,
    /// Weighted confidence in `[0, 100]`.
    pub confidence: f64,
    pub match_type: MatchType,
    /// Resolved club display name, or `"Unknown"`.
    pub club: String,
    /// Resolved zone display name, or `"Unknown"`.
    pub zone: String,
    /// Status of the live record.
    pub status: String,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Compute the weighted confidence score for one `(live, archive)` pair.
pub fn score_pair(live: &EventRecord, archive: &EventRecord) -> f64 {
    let mut confidence = 0.0;

    if live.id == archive.id {
        confidence += WEIGHT_ID;
    }

    confidence += name_similarity(&live.name, &archive.name) * WEIGHT_NAME;

    if live.date == archive.date {
        confidence += WEIGHT_DATE_EXACT;
    } else {
        let days_diff = (live.date - archive.date).num_days().abs();
        if days_diff <= 1 {
            confidence += WEIGHT_DATE_ADJACENT;
        } else if days_diff <= 7 {
            confidence += WEIGHT_DATE_SAME_WEEK;
        }
    }

    if let (Some(a), Some(b)) = (&live.club_id, &archive.club_id) {
        if a == b {
            confidence += WEIGHT_CLUB;
        }
    }

    if let (Some(a), Some(b)) = (&live.event_type_id, &archive.event_type_id) {
        if a == b {
            confidence += WEIGHT_EVENT_TYPE;
        }
    }

    confidence
}

/// Classify a confidence score, or `None` when it falls below the
/// discard threshold.
pub fn classify_confidence(confidence: f64) -> Option<MatchType> {
    if confidence >= EXACT_THRESHOLD {
        Some(MatchType::Exact)
    } else if confidence >= NEAR_THRESHOLD {
        Some(MatchType::Near)
    } else if confidence >= PARTIAL_THRESHOLD {
        Some(MatchType::Partial)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Pair every live record with its best-scoring archive record.
///
/// At most one [`MatchResult`] per live record is produced; ties keep
/// the archive record that appears first in input order. Pairings whose
/// confidence falls below [`PARTIAL_THRESHOLD`] are discarded.
pub fn match_records(
    live_records: &[EventRecord],
    archive_records: &[EventRecord],
    clubs: &[ClubRecord],
    zones: &[ZoneRecord],
) -> Vec<MatchResult> {
    let resolver = NameResolver::new(clubs, zones);
    let mut results = Vec::new();

    for live in live_records {
        let mut best: Option<(&EventRecord, f64)> = None;
        for archive in archive_records {
            let confidence = score_pair(live, archive);
            // Strict greater-than keeps the earliest archive record on ties.
            if best.map_or(true, |(_, c)| confidence > c) {
                best = Some((archive, confidence));
            }
        }

        let Some((archive, confidence)) = best else {
            continue;
        };
        let Some(match_type) = classify_confidence(confidence) else {
            continue;
        };

        let (club, zone) = resolver.resolve(live);
        results.push(MatchResult {
            live_id: live.id.clone(),
            archive_record: archive.clone(),
            confidence,
            match_type,
            club,
            zone,
            status: live.status.clone(),
        });
    }

    results
}

/// Resolves club and zone display names for event records.
///
/// The zone is reached through the record's club; a clubless record
/// falls back to its own zone reference. Anything unresolvable renders
/// as `"Unknown"` rather than failing.
pub struct NameResolver<'a> {
    clubs_by_id: HashMap<&'a str, &'a ClubRecord>,
    zones_by_id: HashMap<&'a str, &'a ZoneRecord>,
}

impl<'a> NameResolver<'a> {
    pub fn new(clubs: &'a [ClubRecord], zones: &'a [ZoneRecord]) -> Self {
        Self {
            clubs_by_id: clubs.iter().map(|c| (c.id.as_str(), c)).collect(),
            zones_by_id: zones.iter().map(|z| (z.id.as_str(), z)).collect(),
        }
    }

    /// Resolve `(club, zone)` display names for a record.
    pub fn resolve(&self, record: &EventRecord) -> (String, String) {
        let club = record
            .club_id
            .as_deref()
            .and_then(|id| self.clubs_by_id.get(id).copied());

        let zone_id = club
            .and_then(|c| c.zone_id.as_deref())
            .or(record.zone_id.as_deref());

        let club_name = club
            .map(|c| c.name.clone())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());
        let zone_name = zone_id
            .and_then(|id| self.zones_by_id.get(id))
            .map(|z| z.name.clone())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());

        (club_name, zone_name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn event(id: &str, name: &str, day: &str) -> EventRecord {
        EventRecord {
            id: id.to_string(),
            name: name.to_string(),
            date: date(day),
            club_id: None,
            zone_id: None,
            event_type_id: None,
            status: "approved".to_string(),
        }
    }

    fn event_with_refs(
        id: &str,
        name: &str,
        day: &str,
        club_id: Option<&str>,
        event_type_id: Option<&str>,
    ) -> EventRecord {
        EventRecord {
            club_id: club_id.map(String::from),
            event_type_id: event_type_id.map(String::from),
            ..event(id, name, day)
        }
    }

    // -- score_pair -----------------------------------------------------------

    #[test]
    fn identical_records_score_one_hundred() {
        let live = event_with_refs("e1", "Spring Rally", "2025-09-15", Some("c1"), Some("t1"));
        let archive = live.clone();
        assert_eq!(score_pair(&live, &archive), 100.0);
    }

    #[test]
    fn id_match_alone_scores_forty_plus_name() {
        let live = event("e1", "Spring Rally", "2025-09-15");
        let archive = event("e1", "Winter Gymkhana", "2025-01-10");
        let score = score_pair(&live, &archive);
        assert!(score >= WEIGHT_ID);
        assert!(score < WEIGHT_ID + WEIGHT_NAME);
    }

    #[test]
    fn adjacent_date_scores_fifteen() {
        let live = event("e1", "Rally", "2025-09-15");
        let archive = event("e2", "Rally", "2025-09-16");
        // 25 (name) + 15 (one day apart).
        assert_eq!(score_pair(&live, &archive), WEIGHT_NAME + WEIGHT_DATE_ADJACENT);
    }

    #[test]
    fn same_week_date_scores_ten() {
        let live = event("e1", "Rally", "2025-09-15");
        let archive = event("e2", "Rally", "2025-09-22");
        assert_eq!(score_pair(&live, &archive), WEIGHT_NAME + WEIGHT_DATE_SAME_WEEK);
    }

    #[test]
    fn date_beyond_week_scores_nothing_for_date() {
        let live = event("e1", "Rally", "2025-09-15");
        let archive = event("e2", "Rally", "2025-09-23");
        assert_eq!(score_pair(&live, &archive), WEIGHT_NAME);
    }

    #[test]
    fn missing_club_on_either_side_scores_nothing_for_club() {
        let live = event_with_refs("e1", "Rally", "2025-09-15", Some("c1"), None);
        let archive = event("e1", "Rally", "2025-09-15");
        // 40 + 25 + 20, no club contribution.
        assert_eq!(
            score_pair(&live, &archive),
            WEIGHT_ID + WEIGHT_NAME + WEIGHT_DATE_EXACT
        );
    }

    #[test]
    fn near_match_scenario() {
        // Same id, one-character name typo, one-day date drift, club only
        // on the live side: lands just below the exact threshold.
        let live = event_with_refs("e1", "Spring Rally", "2025-09-15", Some("c1"), None);
        let archive = event("e1", "Spring Raly", "2025-09-16");
        let score = score_pair(&live, &archive);
        assert!((score - (40.0 + (1.0 - 1.0 / 12.0) * 25.0 + 15.0)).abs() < 1e-9);
        assert_eq!(classify_confidence(score), Some(MatchType::Near));
    }

    // -- classify_confidence --------------------------------------------------

    #[test]
    fn classification_boundaries() {
        assert_eq!(classify_confidence(80.0), Some(MatchType::Exact));
        assert_eq!(classify_confidence(79.0), Some(MatchType::Near));
        assert_eq!(classify_confidence(60.0), Some(MatchType::Near));
        assert_eq!(classify_confidence(59.0), Some(MatchType::Partial));
        assert_eq!(classify_confidence(40.0), Some(MatchType::Partial));
        assert_eq!(classify_confidence(39.0), None);
        assert_eq!(classify_confidence(0.0), None);
    }

    // -- match_records --------------------------------------------------------

    #[test]
    fn keeps_only_best_archive_record_per_live_record() {
        let live = vec![event("e1", "Spring Rally", "2025-09-15")];
        let archive = vec![
            event("e9", "Spring Rally", "2025-09-22"), // name + same week = 35
            event("e1", "Spring Rally", "2025-09-15"), // full structural match
        ];
        let matches = match_records(&live, &archive, &[], &[]);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].archive_record.id, "e1");
        assert_eq!(matches[0].match_type, MatchType::Exact);
    }

    #[test]
    fn tie_keeps_first_archive_record_in_input_order() {
        let live = vec![event("e1", "Spring Rally", "2025-09-15")];
        let archive = vec![
            event("a1", "Spring Rally", "2025-09-15"),
            event("a2", "Spring Rally", "2025-09-15"),
        ];
        let matches = match_records(&live, &archive, &[], &[]);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].archive_record.id, "a1");
    }

    #[test]
    fn below_discard_threshold_emits_nothing() {
        let live = vec![event("e1", "Spring Rally", "2025-09-15")];
        let archive = vec![event("x1", "Annual General Meeting", "2024-01-01")];
        assert!(match_records(&live, &archive, &[], &[]).is_empty());
    }

    #[test]
    fn resolves_club_and_zone_display_names() {
        let live = vec![event_with_refs(
            "e1",
            "Spring Rally",
            "2025-09-15",
            Some("c1"),
            None,
        )];
        let archive = vec![live[0].clone()];
        let clubs = vec![ClubRecord {
            id: "c1".to_string(),
            name: "North Riders".to_string(),
            zone_id: Some("z1".to_string()),
        }];
        let zones = vec![ZoneRecord {
            id: "z1".to_string(),
            name: "North".to_string(),
        }];
        let matches = match_records(&live, &archive, &clubs, &zones);
        assert_eq!(matches[0].club, "North Riders");
        assert_eq!(matches[0].zone, "North");
    }

    #[test]
    fn unresolved_references_render_unknown() {
        let live = vec![event_with_refs(
            "e1",
            "Spring Rally",
            "2025-09-15",
            Some("c-missing"),
            None,
        )];
        let archive = vec![live[0].clone()];
        let matches = match_records(&live, &archive, &[], &[]);
        assert_eq!(matches[0].club, "Unknown");
        assert_eq!(matches[0].zone, "Unknown");
    }

    #[test]
    fn clubless_record_falls_back_to_its_own_zone() {
        let mut rec = event("e1", "Spring Rally", "2025-09-15");
        rec.zone_id = Some("z2".to_string());
        let zones = vec![ZoneRecord {
            id: "z2".to_string(),
            name: "South".to_string(),
        }];
        let matches = match_records(&[rec.clone()], &[rec], &[], &zones);
        assert_eq!(matches[0].club, "Unknown");
        assert_eq!(matches[0].zone, "South");
    }

    #[test]
    fn match_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&MatchType::Exact).unwrap(),
            "\"exact\""
        );
        for s in MatchType::ALL {
            assert_eq!(MatchType::from_str(s).unwrap().as_str(), *s);
        }
    }
}
