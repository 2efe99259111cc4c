//! # parley-store
//!
//! Persistence collaborator for the Parley server.
//!
//! The authoritative conversation state lives in memory inside
//! `parley-engine`; this crate defines the [`Archive`] trait the engine
//! writes through after each successful mutation, plus the in-memory
//! reference backend [`MemoryArchive`]. Archive writes are best-effort audit
//! records: a failed save is logged by the caller and never rolls back the
//! in-memory state.

#![deny(unsafe_code)]

pub mod errors;
pub mod memory;
pub mod record;

pub use errors::{ArchiveError, Result};
pub use memory::MemoryArchive;
pub use record::{Record, RecordKind};

use async_trait::async_trait;
use parley_core::SessionId;

/// Async persistence interface for domain records.
///
/// Implementations must be safe to call concurrently from many tasks.
#[async_trait]
pub trait Archive: Send + Sync {
    /// Insert or overwrite a record, keyed by `(kind, id)`.
    async fn save_record(&self, record: Record) -> Result<()>;

    /// Look up a single record by kind and entity ID.
    async fn find_by_id(&self, kind: RecordKind, id: &str) -> Result<Option<Record>>;

    /// All records of one kind belonging to a session.
    async fn find_by_session(&self, kind: RecordKind, session_id: &SessionId)
        -> Result<Vec<Record>>;

    /// Remove every record belonging to a session. Returns the number of
    /// records removed.
    async fn delete_by_session(&self, session_id: &SessionId) -> Result<u64>;
}
