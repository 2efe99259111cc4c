//! Error types for the archive subsystem.
//!
//! [`ArchiveError`] is the primary error type returned by all archive
//! operations. The surface is kept small enough for exhaustive pattern
//! matching; callers in the engine treat every variant as non-fatal and log
//! it without rolling back in-memory state.

use thiserror::Error;

/// Errors that can occur during archive operations.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Requested record was not found.
    #[error("record not found: {kind} {id}")]
    NotFound {
        /// Record kind that was requested.
        kind: &'static str,
        /// ID that was requested.
        id: String,
    },

    /// Backend-specific failure.
    #[error("archive backend error: {0}")]
    Backend(String),
}

/// Convenience type alias for archive results.
pub type Result<T> = std::result::Result<T, ArchiveError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
