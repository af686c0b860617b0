//! Operation configuration for archive analyze / purge / import runs.
//!
//! Configuration is validated in full before any store access, so a
//! rejected run never mutates anything.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::records::validate_event_status;

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Inclusive date window applied to record dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Record selection filters shared by purge and import.
///
/// Empty lists select everything; the lists hold *display names*, the
/// same strings the matcher resolves (so `"Unknown"` selects records
/// with unresolvable references).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OperationFilters {
    pub zones: Vec<String>,
    pub clubs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

impl OperationFilters {
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty() && self.clubs.is_empty() && self.date_range.is_none()
    }

    /// Whether a record with the given resolved names and date passes
    /// every configured filter.
    pub fn selects(&self, zone: &str, club: &str, date: NaiveDate) -> bool {
        if !self.zones.is_empty() && !self.zones.iter().any(|z| z == zone) {
            return false;
        }
        if !self.clubs.is_empty() && !self.clubs.iter().any(|c| c == club) {
            return false;
        }
        if let Some(range) = &self.date_range {
            if !range.contains(date) {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Operation config
// ---------------------------------------------------------------------------

/// Configuration for one purge or import run against an uploaded
/// archive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OperationConfig {
    /// Compute full results without mutating the store.
    pub dry_run: bool,
    pub filters: OperationFilters,
    /// Require an explicit confirmation before a destructive run.
    pub require_confirmation: bool,
    /// The caller's confirmation for a destructive run.
    pub confirm: bool,
    /// Snapshot the records about to be mutated before the first
    /// destructive commit.
    pub create_backup: bool,
    /// Ignore non-record archive members (schedule PDFs etc.).
    pub skip_ancillary_files: bool,
    /// Import name-colliding records without an explicit resolution.
    pub allow_duplicates: bool,
    /// Verify the archive manifest version and per-file checksums.
    pub validate_manifest: bool,
    /// Restrict the operation to records in these statuses. Empty means
    /// all statuses.
    pub statuses: Vec<String>,
}

impl OperationConfig {
    /// Validate the configuration. Runs before any store access.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(range) = &self.filters.date_range {
            if range.start > range.end {
                return Err(CoreError::Validation(format!(
                    "Date range start {} is after end {}",
                    range.start, range.end
                )));
            }
        }
        for status in &self.statuses {
            validate_event_status(status)?;
        }
        if self.require_confirmation && !self.dry_run && !self.confirm {
            return Err(CoreError::Validation(
                "Operation requires confirmation; set confirm or run as dry run".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a record status passes the status restriction.
    pub fn selects_status(&self, status: &str) -> bool {
        self.statuses.is_empty() || self.statuses.iter().any(|s| s == status)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
