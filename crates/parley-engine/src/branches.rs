//! The branch tree: per-session conversation branches and their utterances.
//!
//! Each session owns a forest rooted at its `Main` branch. Two locks matter
//! here: the per-session branch list (linearizes creation order, so
//! `sequence_order` is gapless per session) and the per-branch entry
//! (linearizes utterance appends, so sequence numbers are gapless per
//! branch). Neither is held across an await.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use parley_core::errors::Result;
use parley_core::{
    Branch, BranchId, BranchKind, BranchStatus, EngineError, ParticipantId, SessionId, Utterance,
    UtteranceKind, now_rfc3339,
};
use parley_store::{Archive, Record};

use crate::directory::SessionDirectory;

/// One branch plus its transcript, guarded as a unit.
#[derive(Debug)]
struct BranchEntry {
    branch: Branch,
    utterances: Vec<Utterance>,
    next_sequence: u64,
}

/// Optional rendering hints attached to an utterance.
#[derive(Debug, Clone, Default)]
pub struct UtteranceHints {
    /// Emotion hint (e.g. "happy").
    pub emotion: Option<String>,
    /// Animation hint (e.g. "wave").
    pub animation: Option<String>,
}

/// Forest of conversation branches across all sessions.
pub struct BranchTree {
    branches: RwLock<HashMap<BranchId, Arc<Mutex<BranchEntry>>>>,
    by_session: RwLock<HashMap<SessionId, Arc<Mutex<Vec<BranchId>>>>>,
    directory: Arc<SessionDirectory>,
    archive: Arc<dyn Archive>,
}

impl BranchTree {
    /// Create an empty tree over the given directory and archive.
    pub fn new(directory: Arc<SessionDirectory>, archive: Arc<dyn Archive>) -> Self {
        Self {
            branches: RwLock::new(HashMap::new()),
            by_session: RwLock::new(HashMap::new()),
            directory,
            archive,
        }
    }

    fn entry(&self, branch_id: &BranchId) -> Option<Arc<Mutex<BranchEntry>>> {
        self.branches.read().get(branch_id).cloned()
    }

    fn session_list(&self, session_id: &SessionId) -> Arc<Mutex<Vec<BranchId>>> {
        if let Some(list) = self.by_session.read().get(session_id).cloned() {
            return list;
        }
        let mut index = self.by_session.write();
        index
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }

    async fn archive_save(&self, record: Record) {
        if let Err(err) = self.archive.save_record(record).await {
            warn!(error = %err, "archive write failed; in-memory state unchanged");
        }
    }

    /// Create a branch in a session.
    ///
    /// Fails with `SessionNotFound` when the session is absent and with
    /// `ParentNotFound` when the parent branch is absent or belongs to a
    /// different session. The creation-order index is the session's branch
    /// count read under the session's branch-list lock.
    pub async fn create_branch(
        &self,
        session_id: &SessionId,
        name: impl Into<String>,
        description: Option<String>,
        kind: BranchKind,
        parent_id: Option<BranchId>,
        created_by: ParticipantId,
    ) -> Result<Branch> {
        if !self.directory.contains(session_id) {
            return Err(EngineError::SessionNotFound(session_id.to_string()));
        }

        if let Some(parent) = &parent_id {
            let parent_entry = self
                .entry(parent)
                .ok_or_else(|| EngineError::ParentNotFound(parent.to_string()))?;
            if &parent_entry.lock().branch.session_id != session_id {
                return Err(EngineError::ParentNotFound(parent.to_string()));
            }
        }

        let snapshot = {
            let list = self.session_list(session_id);
            let mut list_guard = list.lock();
            let order = u32::try_from(list_guard.len()).unwrap_or(u32::MAX);
            let branch = Branch::new(
                session_id.clone(),
                parent_id,
                name,
                description,
                kind,
                order,
                created_by,
            );
            let snapshot = branch.clone();
            list_guard.push(branch.id.clone());
            let _ = self.branches.write().insert(
                branch.id.clone(),
                Arc::new(Mutex::new(BranchEntry {
                    branch,
                    utterances: Vec::new(),
                    next_sequence: 1,
                })),
            );
            snapshot
        };

        info!(
            session_id = %session_id,
            branch_id = %snapshot.id,
            kind = ?snapshot.kind,
            order = snapshot.sequence_order,
            "branch created"
        );
        self.archive_save(Record::Branch(snapshot.clone())).await;
        Ok(snapshot)
    }

    /// Return the session's `Main` branch, creating it if absent.
    ///
    /// Idempotent: concurrent callers all observe the same branch.
    pub async fn ensure_main(
        &self,
        session_id: &SessionId,
        created_by: &ParticipantId,
    ) -> Result<Branch> {
        if !self.directory.contains(session_id) {
            return Err(EngineError::SessionNotFound(session_id.to_string()));
        }

        let snapshot = {
            let list = self.session_list(session_id);
            let mut list_guard = list.lock();
            let branches = self.branches.read();
            if let Some(existing) = list_guard
                .iter()
                .filter_map(|id| branches.get(id))
                .find(|e| e.lock().branch.kind == BranchKind::Main)
            {
                return Ok(existing.lock().branch.clone());
            }
            drop(branches);

            let mut branch = Branch::main(session_id.clone(), created_by.clone());
            branch.sequence_order = u32::try_from(list_guard.len()).unwrap_or(u32::MAX);
            let snapshot = branch.clone();
            list_guard.push(branch.id.clone());
            let _ = self.branches.write().insert(
                branch.id.clone(),
                Arc::new(Mutex::new(BranchEntry {
                    branch,
                    utterances: Vec::new(),
                    next_sequence: 1,
                })),
            );
            snapshot
        };

        info!(session_id = %session_id, branch_id = %snapshot.id, "main branch created");
        self.archive_save(Record::Branch(snapshot.clone())).await;
        Ok(snapshot)
    }

    /// Append an utterance to a branch.
    ///
    /// The sequence number is taken from the per-branch counter under the
    /// branch entry lock: strictly increasing, gapless, starting at 1.
    /// Only `Active` branches accept utterances.
    pub async fn add_utterance(
        &self,
        branch_id: &BranchId,
        speaker_id: ParticipantId,
        content: impl Into<String>,
        kind: UtteranceKind,
        hints: UtteranceHints,
    ) -> Result<Utterance> {
        let entry = self
            .entry(branch_id)
            .ok_or_else(|| EngineError::BranchNotFound(branch_id.to_string()))?;

        let (snapshot, session_id) = {
            let mut guard = entry.lock();
            if guard.branch.status != BranchStatus::Active {
                return Err(EngineError::InvalidBranchState {
                    branch_id: branch_id.to_string(),
                    status: guard.branch.status,
                    operation: "add utterance",
                });
            }
            let seq = guard.next_sequence;
            guard.next_sequence += 1;
            let mut utterance =
                Utterance::new(branch_id.clone(), speaker_id, content, kind, seq);
            utterance.emotion = hints.emotion;
            utterance.animation = hints.animation;
            guard.utterances.push(utterance.clone());
            (utterance, guard.branch.session_id.clone())
        };

        debug!(
            branch_id = %branch_id,
            sequence = snapshot.sequence_number,
            "utterance appended"
        );
        self.archive_save(Record::Utterance {
            session_id,
            utterance: snapshot.clone(),
        })
        .await;
        Ok(snapshot)
    }

    /// Merge a branch back into its parent.
    ///
    /// The `Main` branch is never merged. No content is moved; merging is a
    /// status transition plus a timestamp.
    pub async fn merge(&self, branch_id: &BranchId, actor: &ParticipantId) -> Result<Branch> {
        let entry = self
            .entry(branch_id)
            .ok_or_else(|| EngineError::BranchNotFound(branch_id.to_string()))?;

        let snapshot = {
            let mut guard = entry.lock();
            if guard.branch.kind == BranchKind::Main {
                return Err(EngineError::CannotMergeMain(branch_id.to_string()));
            }
            if guard.branch.status.is_terminal() {
                return Err(EngineError::InvalidBranchState {
                    branch_id: branch_id.to_string(),
                    status: guard.branch.status,
                    operation: "merge",
                });
            }
            guard.branch.status = BranchStatus::Merged;
            guard.branch.merged_at = Some(now_rfc3339());
            guard.branch.clone()
        };

        info!(branch_id = %branch_id, actor = %actor, "branch merged");
        self.archive_save(Record::Branch(snapshot.clone())).await;
        Ok(snapshot)
    }

    /// Pause an active branch.
    pub async fn pause(&self, branch_id: &BranchId) -> Result<Branch> {
        self.set_status(branch_id, BranchStatus::Active, BranchStatus::Paused, "pause")
            .await
    }

    /// Resume a paused branch.
    pub async fn resume(&self, branch_id: &BranchId) -> Result<Branch> {
        self.set_status(branch_id, BranchStatus::Paused, BranchStatus::Active, "resume")
            .await
    }

    async fn set_status(
        &self,
        branch_id: &BranchId,
        expected: BranchStatus,
        next: BranchStatus,
        operation: &'static str,
    ) -> Result<Branch> {
        let entry = self
            .entry(branch_id)
            .ok_or_else(|| EngineError::BranchNotFound(branch_id.to_string()))?;

        let snapshot = {
            let mut guard = entry.lock();
            if guard.branch.status != expected {
                return Err(EngineError::InvalidBranchState {
                    branch_id: branch_id.to_string(),
                    status: guard.branch.status,
                    operation,
                });
            }
            guard.branch.status = next;
            guard.branch.clone()
        };

        debug!(branch_id = %branch_id, status = ?next, "branch status changed");
        self.archive_save(Record::Branch(snapshot.clone())).await;
        Ok(snapshot)
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// One branch snapshot.
    pub fn branch(&self, branch_id: &BranchId) -> Result<Branch> {
        self.entry(branch_id)
            .map(|e| e.lock().branch.clone())
            .ok_or_else(|| EngineError::BranchNotFound(branch_id.to_string()))
    }

    /// All branches of a session, in creation order.
    pub fn session_branches(&self, session_id: &SessionId) -> Vec<Branch> {
        let Some(list) = self.by_session.read().get(session_id).cloned() else {
            return Vec::new();
        };
        let ids = list.lock().clone();
        let branches = self.branches.read();
        ids.iter()
            .filter_map(|id| branches.get(id))
            .map(|e| e.lock().branch.clone())
            .collect()
    }

    /// Direct children of a branch, in creation order.
    pub fn child_branches(&self, parent_id: &BranchId) -> Result<Vec<Branch>> {
        let parent = self.branch(parent_id)?;
        Ok(self
            .session_branches(&parent.session_id)
            .into_iter()
            .filter(|b| b.parent_id.as_ref() == Some(parent_id))
            .collect())
    }

    /// Transcript snapshot of a branch, in sequence order.
    pub fn utterances(&self, branch_id: &BranchId) -> Result<Vec<Utterance>> {
        self.entry(branch_id)
            .map(|e| e.lock().utterances.clone())
            .ok_or_else(|| EngineError::BranchNotFound(branch_id.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
