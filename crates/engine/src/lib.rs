//! The archive reconciliation and purge engine.
//!
//! Orchestrates one operation per request, sequentially: archive
//! parsing → matching → (conflict resolution | filter pipeline) →
//! batch execution → aggregation.
//!
//! - [`executor`] — bounded-size batch execution with dry-run,
//!   per-item failure tracking, and backup snapshots.
//! - [`ops`] — the `analyze`, `purge`, `import`, and
//!   `rollback_import` operations.
//!
//! Precondition: one operation at a time per dataset. The caller
//! serializes concurrent purge/import requests; the engine neither
//! detects nor prevents concurrent conflicting runs.

pub mod error;
pub mod executor;
pub mod ops;

pub use error::EngineError;
pub use executor::{BatchExecutor, ExecutionReport};
pub use ops::{analyze, detect_import_conflicts, import, purge, rollback_import, AnalyzeReport};
