//! In-memory archive implementation.
//!
//! [`MemoryArchive`] is the reference [`Archive`] backend: a keyed map of
//! records behind a `parking_lot` lock. It is the default for the server (no
//! durable database by design) and the fixture for engine tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use parley_core::SessionId;

use crate::errors::Result;
use crate::record::{Record, RecordKind};
use crate::Archive;

/// In-memory [`Archive`] backed by a `HashMap` keyed by `(kind, id)`.
///
/// Saves are upserts; lookups clone snapshots. All operations complete
/// synchronously under the lock (nothing is held across an await).
#[derive(Default)]
pub struct MemoryArchive {
    records: RwLock<HashMap<(RecordKind, String), Record>>,
}

impl MemoryArchive {
    /// Create an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records, across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the archive is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl Archive for MemoryArchive {
    async fn save_record(&self, record: Record) -> Result<()> {
        let key = (record.kind(), record.id().to_owned());
        let _ = self.records.write().insert(key, record);
        Ok(())
    }

    async fn find_by_id(&self, kind: RecordKind, id: &str) -> Result<Option<Record>> {
        Ok(self.records.read().get(&(kind, id.to_owned())).cloned())
    }

    async fn find_by_session(&self, kind: RecordKind, session_id: &SessionId) -> Result<Vec<Record>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.kind() == kind && r.session_id() == session_id)
            .cloned()
            .collect())
    }

    async fn delete_by_session(&self, session_id: &SessionId) -> Result<u64> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, r| r.session_id() != session_id);
        Ok((before - records.len()) as u64)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
