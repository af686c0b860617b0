//! Integrity manifest model and verification.

use std::collections::HashMap;

use rallydesk_core::hashing::sha256_hex;
use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;

/// The one manifest version this engine accepts.
pub const SUPPORTED_MANIFEST_VERSION: &str = "1.0";

/// Archive member name of the manifest.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// One file entry recorded by the exporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFile {
    pub name: String,
    pub size: u64,
    /// SHA-256 hex digest of the member contents.
    pub checksum: String,
}

/// The archive integrity manifest written at export time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub files: Vec<ManifestFile>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Verify the manifest version against [`SUPPORTED_MANIFEST_VERSION`].
pub fn check_version(manifest: &Manifest) -> Result<(), ArchiveError> {
    if manifest.version == SUPPORTED_MANIFEST_VERSION {
        Ok(())
    } else {
        Err(ArchiveError::Incompatibility {
            found: manifest.version.clone(),
            supported: SUPPORTED_MANIFEST_VERSION.to_string(),
        })
    }
}

/// Recompute the digest of every file the manifest lists and compare
/// against the recorded checksum.
///
/// All mismatches are accumulated; a listed file absent from the
/// archive counts as a mismatch.
pub fn verify_checksums(
    manifest: &Manifest,
    members: &HashMap<String, Vec<u8>>,
) -> Result<(), ArchiveError> {
    let mut mismatched = Vec::new();

    for entry in &manifest.files {
        match members.get(&entry.name) {
            Some(bytes) if sha256_hex(bytes) == entry.checksum => {}
            _ => mismatched.push(entry.name.clone()),
        }
    }

    if mismatched.is_empty() {
        Ok(())
    } else {
        Err(ArchiveError::Integrity { files: mismatched })
    }
}
