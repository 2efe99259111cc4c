//! # parley-engine
//!
//! The authoritative in-memory conversation model: the session directory,
//! the branch tree, and the TTS router.
//!
//! Concurrency model: a `parking_lot::RwLock` guards each index of
//! per-entry `Arc<Mutex<_>>` handles. Mutations for one session or one
//! branch are linearized under that entry's lock; there is no ordering
//! across entries. Listing reads clone snapshots. No lock is ever held
//! across an `.await`; archive writes happen after the locks are released
//! and never roll back memory on failure.

#![deny(unsafe_code)]

pub mod branches;
pub mod directory;
pub mod tts;

pub use branches::{BranchTree, UtteranceHints};
pub use directory::SessionDirectory;
pub use tts::{NewRoutingConfig, RoutingUpdate, TtsRouter};

use std::sync::Arc;

use parley_core::errors::Result;
use parley_core::{ParticipantId, Session, SessionId};
use parley_store::Archive;

/// Bundle of the three engine components sharing one archive.
///
/// This is what the server and binary wire together; the components stay
/// individually addressable for tests.
pub struct Engine {
    /// Live session registry.
    pub directory: Arc<SessionDirectory>,
    /// Conversation branch forest.
    pub branches: Arc<BranchTree>,
    /// TTS routing and streaming state.
    pub tts: Arc<TtsRouter>,
}

impl Engine {
    /// Wire up the engine over one archive.
    #[must_use]
    pub fn new(archive: Arc<dyn Archive>) -> Self {
        let directory = Arc::new(SessionDirectory::new(Arc::clone(&archive)));
        let branches = Arc::new(BranchTree::new(
            Arc::clone(&directory),
            Arc::clone(&archive),
        ));
        let tts = Arc::new(TtsRouter::new(Arc::clone(&directory), archive));
        Self {
            directory,
            branches,
            tts,
        }
    }

    /// Explicitly create a session and its `Main` branch.
    pub async fn create_session(
        &self,
        title: impl Into<String>,
        description: Option<String>,
        max_participants: u32,
        created_by: &ParticipantId,
    ) -> Result<Session> {
        let session = self
            .directory
            .create_session(title, description, max_participants)
            .await;
        let _ = self.branches.ensure_main(&session.id, created_by).await?;
        Ok(session)
    }
}
