//! Record types shared by the archive reader, matcher, and engine.
//!
//! These mirror the JSON shapes produced by the club administration
//! export: an event collection plus the club / zone / event-type
//! reference collections it points into. Archive-sourced records are
//! immutable once read; live records are owned by the store and
//! read-only to this crate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ── Event status ─────────────────────────────────────────────────────

pub const STATUS_APPROVED: &str = "approved";
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_CANCELLED: &str = "cancelled";
pub const STATUS_COMPLETED: &str = "completed";

/// All valid event status values.
pub const VALID_EVENT_STATUSES: &[&str] = &[
    STATUS_APPROVED,
    STATUS_PENDING,
    STATUS_CANCELLED,
    STATUS_COMPLETED,
];

/// Display label for an unresolvable club / zone / event-type reference.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Validate that a status string is one of the known event statuses.
pub fn validate_event_status(status: &str) -> Result<(), CoreError> {
    if VALID_EVENT_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unknown event status: '{status}'. Valid statuses: {}",
            VALID_EVENT_STATUSES.join(", ")
        )))
    }
}

// ── Records ──────────────────────────────────────────────────────────

/// A single event record, in archive JSON shape.
///
/// The same shape serves archive-sourced and live-store records; only
/// ownership differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type_id: Option<String>,
    pub status: String,
}

/// A club reference record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
}

/// A zone reference record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRecord {
    pub id: String,
    pub name: String,
}

/// An event-type reference record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeRecord {
    pub id: String,
    pub name: String,
}

// ── Tests ────────────────────────────────────────────────────────────
