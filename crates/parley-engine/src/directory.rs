//! The session directory: authoritative registry of live sessions.
//!
//! All session and roster mutations for one session are linearized under
//! that session's entry lock; different sessions never contend. Listing
//! reads clone snapshots under the index read lock and serialize outside
//! it. Archive writes happen after the entry lock is released and are
//! best-effort: a failed save is logged and never rolls back memory.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use parley_core::errors::Result;
use parley_core::{
    EngineError, Participant, ParticipantId, Session, SessionId,
};
use parley_store::{Archive, Record};

/// One session plus its roster, guarded as a unit.
#[derive(Debug)]
struct SessionEntry {
    session: Session,
    roster: HashMap<ParticipantId, Participant>,
}

/// Registry of live sessions and their participants.
pub struct SessionDirectory {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<SessionEntry>>>>,
    archive: Arc<dyn Archive>,
}

impl SessionDirectory {
    /// Create an empty directory writing through to `archive`.
    pub fn new(archive: Arc<dyn Archive>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            archive,
        }
    }

    /// Look up an entry handle without holding the index lock afterwards.
    fn entry(&self, session_id: &SessionId) -> Option<Arc<Mutex<SessionEntry>>> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Best-effort archive write; failures are logged, never propagated.
    async fn archive_save(&self, record: Record) {
        if let Err(err) = self.archive.save_record(record).await {
            warn!(error = %err, "archive write failed; in-memory state unchanged");
        }
    }

    /// Get the session with this ID, creating it with defaults if absent.
    ///
    /// Idempotent: concurrent callers racing on the same ID all observe the
    /// same session.
    pub async fn create_or_get(&self, session_id: &SessionId) -> Session {
        if let Some(entry) = self.entry(session_id) {
            return entry.lock().session.clone();
        }

        let snapshot = {
            let mut index = self.sessions.write();
            // Re-check under the write lock: another caller may have won.
            let entry = index.entry(session_id.clone()).or_insert_with(|| {
                info!(session_id = %session_id, "creating session with defaults");
                Arc::new(Mutex::new(SessionEntry {
                    session: Session::with_defaults(session_id.clone()),
                    roster: HashMap::new(),
                }))
            });
            entry.lock().session.clone()
        };

        self.archive_save(Record::Session(snapshot.clone())).await;
        snapshot
    }

    /// Explicitly create a session with a fresh ID.
    pub async fn create_session(
        &self,
        title: impl Into<String>,
        description: Option<String>,
        max_participants: u32,
    ) -> Session {
        let session = Session::new(SessionId::new(), title, description, max_participants);
        let snapshot = session.clone();
        {
            let mut index = self.sessions.write();
            let _ = index.insert(
                session.id.clone(),
                Arc::new(Mutex::new(SessionEntry {
                    session,
                    roster: HashMap::new(),
                })),
            );
        }
        info!(session_id = %snapshot.id, title = %snapshot.title, "session created");
        self.archive_save(Record::Session(snapshot.clone())).await;
        snapshot
    }

    /// Look up a session snapshot.
    pub fn get(&self, session_id: &SessionId) -> Option<Session> {
        self.entry(session_id).map(|e| e.lock().session.clone())
    }

    /// Add a participant to a session.
    ///
    /// The capacity check and the roster insert happen under the same entry
    /// lock, so the count can never exceed `max_participants`. Rejoining with
    /// an ID already on the roster reactivates that participant instead of
    /// growing the roster.
    pub async fn join(&self, session_id: &SessionId, participant: Participant) -> Result<Session> {
        let entry = self
            .entry(session_id)
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;

        let (session_snap, participant_snap) = {
            let mut guard = entry.lock();
            if !guard.session.is_active() {
                return Err(EngineError::SessionEnded(session_id.to_string()));
            }
            let SessionEntry { session, roster } = &mut *guard;
            match roster.get_mut(&participant.id) {
                Some(existing) if existing.active => {
                    // Already joined; treat as a no-op rejoin.
                    (session.clone(), existing.clone())
                }
                Some(existing) => {
                    if session.participant_count >= session.max_participants {
                        return Err(EngineError::SessionFull {
                            session_id: session_id.to_string(),
                            max_participants: session.max_participants,
                        });
                    }
                    existing.active = true;
                    existing.left_at = None;
                    let snap = existing.clone();
                    session.participant_count += 1;
                    (session.clone(), snap)
                }
                None => {
                    if session.participant_count >= session.max_participants {
                        return Err(EngineError::SessionFull {
                            session_id: session_id.to_string(),
                            max_participants: session.max_participants,
                        });
                    }
                    let snap = participant.clone();
                    let _ = roster.insert(participant.id.clone(), participant);
                    session.participant_count += 1;
                    (session.clone(), snap)
                }
            }
        };

        debug!(
            session_id = %session_id,
            participant_id = %participant_snap.id,
            count = session_snap.participant_count,
            "participant joined"
        );
        self.archive_save(Record::Session(session_snap.clone())).await;
        self.archive_save(Record::Participant {
            session_id: session_id.clone(),
            participant: participant_snap,
        })
        .await;
        Ok(session_snap)
    }

    /// Deactivate a participant and decrement the active count (floor 0).
    ///
    /// Unknown session or participant is a no-op: teardown paths call this
    /// unconditionally and must be idempotent.
    pub async fn leave(&self, session_id: &SessionId, participant_id: &ParticipantId) {
        let Some(entry) = self.entry(session_id) else {
            return;
        };

        let snapshot = {
            let mut guard = entry.lock();
            let Some(p) = guard.roster.get_mut(participant_id) else {
                return;
            };
            if !p.active {
                return;
            }
            p.deactivate();
            let snap = p.clone();
            guard.session.participant_count = guard.session.participant_count.saturating_sub(1);
            (guard.session.clone(), snap)
        };

        debug!(session_id = %session_id, participant_id = %participant_id, "participant left");
        self.archive_save(Record::Session(snapshot.0)).await;
        self.archive_save(Record::Participant {
            session_id: session_id.clone(),
            participant: snapshot.1,
        })
        .await;
    }

    /// End a session: status `Ended`, `ended_at` set, every active
    /// participant deactivated, count zeroed — all under one entry lock.
    /// Idempotent: ending an ended session returns the recorded snapshot.
    pub async fn end(&self, session_id: &SessionId) -> Result<Session> {
        let entry = self
            .entry(session_id)
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;

        let (session_snap, roster_snap) = {
            let mut guard = entry.lock();
            if !guard.session.is_active() {
                return Ok(guard.session.clone());
            }
            guard.session.end();
            guard.session.participant_count = 0;
            for p in guard.roster.values_mut() {
                p.deactivate();
            }
            (
                guard.session.clone(),
                guard.roster.values().cloned().collect::<Vec<_>>(),
            )
        };

        info!(session_id = %session_id, "session ended");
        self.archive_save(Record::Session(session_snap.clone())).await;
        for p in roster_snap {
            self.archive_save(Record::Participant {
                session_id: session_id.clone(),
                participant: p,
            })
            .await;
        }
        Ok(session_snap)
    }

    /// Roster snapshot for a session (active and inactive members).
    pub fn participants(&self, session_id: &SessionId) -> Result<Vec<Participant>> {
        let entry = self
            .entry(session_id)
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
        let guard = entry.lock();
        Ok(guard.roster.values().cloned().collect())
    }

    /// One participant snapshot.
    pub fn participant(
        &self,
        session_id: &SessionId,
        participant_id: &ParticipantId,
    ) -> Result<Participant> {
        let entry = self
            .entry(session_id)
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
        let guard = entry.lock();
        guard
            .roster
            .get(participant_id)
            .cloned()
            .ok_or_else(|| EngineError::ParticipantNotFound(participant_id.to_string()))
    }

    /// Snapshot of all sessions still `Active`.
    pub fn list_active(&self) -> Vec<Session> {
        let entries: Vec<_> = self.sessions.read().values().cloned().collect();
        entries
            .iter()
            .map(|e| e.lock().session.clone())
            .filter(Session::is_active)
            .collect()
    }

    /// Snapshot of active sessions that still have capacity.
    pub fn list_available(&self) -> Vec<Session> {
        let entries: Vec<_> = self.sessions.read().values().cloned().collect();
        entries
            .iter()
            .map(|e| e.lock().session.clone())
            .filter(Session::has_capacity)
            .collect()
    }

    /// Whether a session exists (any status).
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.read().contains_key(session_id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
