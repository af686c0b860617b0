//! Archive-level error taxonomy.
//!
//! All three variants are detected before any store access, so a
//! failed archive is always safe to fix and retry.

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Missing required members, malformed container, or malformed
    /// JSON. Every problem is listed, not just the first.
    #[error("Archive validation failed: {}", .problems.join("; "))]
    Validation { problems: Vec<String> },

    /// Recomputed checksums disagree with the manifest. Every
    /// mismatching file is named.
    #[error("Archive integrity check failed for: {}", .files.join(", "))]
    Integrity { files: Vec<String> },

    /// The manifest version is not supported by this engine.
    #[error("Unsupported archive manifest version '{found}' (supported: {supported})")]
    Incompatibility { found: String, supported: String },
}
