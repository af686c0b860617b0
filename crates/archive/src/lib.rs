//! Archive container reading for the reconciliation engine.
//!
//! An export archive is a ZIP container holding the JSON record
//! collections (`events.json`, `clubs.json`, `zones.json`,
//! `event-types.json`) and an optional integrity manifest. This crate
//! validates the container, verifies the manifest when asked, and
//! parses the typed collections — a pure read; it never touches the
//! live store.

pub mod error;
pub mod manifest;
pub mod reader;

pub use error::ArchiveError;
pub use manifest::{Manifest, ManifestFile, SUPPORTED_MANIFEST_VERSION};
pub use reader::{archive_stats, read_archive, ArchiveContents, ArchiveStats};
