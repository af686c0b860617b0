use rallydesk_archive::ArchiveError;
use rallydesk_core::CoreError;
use rallydesk_store::StoreError;

/// Engine-level error for operation entry points.
///
/// Every variant is raised before the first destructive commit; later
/// failures are collected into the operation result instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A domain or configuration error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An archive validation, integrity, or compatibility error.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// A store error during the read phase.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
