//! The connection registry: live transport handles and session membership.
//!
//! Three indexes, each behind its own short `parking_lot` lock: connections
//! by connection ID, the participant-to-connection binding (last writer
//! wins), and the live-membership set per session that the broadcast router
//! fans out over. A fourth index tracks connections per legacy chat room.
//! Sends are best-effort `try_send`; a closed or full channel reports
//! `false`, never an error.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use parley_core::{ConnectionId, ParticipantId, SessionId};

use super::connection::ClientConnection;

/// Registry of live connections, participant bindings, and session
/// membership.
#[derive(Default)]
pub struct ConnectionRegistry {
    by_conn: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    by_participant: RwLock<HashMap<ParticipantId, ConnectionId>>,
    sessions: RwLock<HashMap<SessionId, HashSet<ParticipantId>>>,
    rooms: RwLock<HashMap<String, HashSet<ConnectionId>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Connections ─────────────────────────────────────────────────

    /// Track a freshly upgraded connection and add it to its room.
    pub fn add_connection(&self, conn: Arc<ClientConnection>) {
        let _ = self
            .rooms
            .write()
            .entry(conn.room.clone())
            .or_default()
            .insert(conn.id.clone());
        let _ = self.by_conn.write().insert(conn.id.clone(), conn);
    }

    /// Drop a connection: removes the transport handle, the room entry, and
    /// unregisters any participant bound to it. Idempotent.
    pub fn remove_connection(&self, conn_id: &ConnectionId) {
        let removed = self.by_conn.write().remove(conn_id);
        if let Some(conn) = &removed {
            if let Some(room) = self.rooms.write().get_mut(&conn.room) {
                let _ = room.remove(conn_id);
            }
        }

        // Unregister every participant still bound to this connection.
        let stale: Vec<ParticipantId> = self
            .by_participant
            .read()
            .iter()
            .filter(|(_, cid)| *cid == conn_id)
            .map(|(pid, _)| pid.clone())
            .collect();
        for pid in stale {
            self.unregister(&pid);
        }
    }

    /// Look up a connection handle.
    pub fn connection(&self, conn_id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.by_conn.read().get(conn_id).cloned()
    }

    /// Snapshot of every live connection handle.
    pub fn connections(&self) -> Vec<Arc<ClientConnection>> {
        self.by_conn.read().values().cloned().collect()
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.by_conn.read().len()
    }

    // ── Participant bindings ────────────────────────────────────────

    /// Bind a participant to a connection. Last writer wins: a rejoin from
    /// a new connection silently replaces the old binding.
    pub fn register(&self, participant_id: &ParticipantId, conn_id: &ConnectionId) {
        let _ = self
            .by_participant
            .write()
            .insert(participant_id.clone(), conn_id.clone());
        debug!(participant_id = %participant_id, conn_id = %conn_id, "participant registered");
    }

    /// Remove a participant's binding and drop them from every session's
    /// live-membership set. Idempotent no-op when absent.
    pub fn unregister(&self, participant_id: &ParticipantId) {
        let _ = self.by_participant.write().remove(participant_id);
        let mut sessions = self.sessions.write();
        for members in sessions.values_mut() {
            let _ = members.remove(participant_id);
        }
        debug!(participant_id = %participant_id, "participant unregistered");
    }

    /// Whether a participant currently has a live binding.
    pub fn is_registered(&self, participant_id: &ParticipantId) -> bool {
        self.by_participant.read().contains_key(participant_id)
    }

    // ── Session membership ──────────────────────────────────────────

    /// Add a participant to a session's live-membership set.
    pub fn join(&self, session_id: &SessionId, participant_id: &ParticipantId) {
        let _ = self
            .sessions
            .write()
            .entry(session_id.clone())
            .or_default()
            .insert(participant_id.clone());
    }

    /// Snapshot of a session's live members.
    pub fn members(&self, session_id: &SessionId) -> Vec<ParticipantId> {
        self.sessions
            .read()
            .get(session_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    // ── Sends ───────────────────────────────────────────────────────

    /// Best-effort send to a participant's connection.
    ///
    /// Returns `false` when the participant has no binding, the connection
    /// is gone, or the channel is full or closed.
    pub fn send(&self, participant_id: &ParticipantId, payload: Arc<String>) -> bool {
        let Some(conn_id) = self.by_participant.read().get(participant_id).cloned() else {
            return false;
        };
        match self.connection(&conn_id) {
            Some(conn) => conn.send(payload),
            None => false,
        }
    }

    /// Lifetime drop count of the connection a participant is bound to.
    pub fn members_connection_drops(&self, participant_id: &ParticipantId) -> Option<u64> {
        let conn_id = self.by_participant.read().get(participant_id).cloned()?;
        self.connection(&conn_id).map(|c| c.drop_count())
    }

    /// Connection handles in a legacy chat room.
    pub fn room_connections(&self, room: &str) -> Vec<Arc<ClientConnection>> {
        let ids: Vec<ConnectionId> = self
            .rooms
            .read()
            .get(room)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        let by_conn = self.by_conn.read();
        ids.iter().filter_map(|id| by_conn.get(id).cloned()).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_conn(id: &str, room: &str) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        (
            Arc::new(ClientConnection::new(ConnectionId::from(id), room, tx)),
            rx,
        )
    }

    #[test]
    fn add_and_remove_connection() {
        let reg = ConnectionRegistry::new();
        let (conn, _rx) = make_conn("c1", "default");
        reg.add_connection(conn);
        assert_eq!(reg.connection_count(), 1);
        reg.remove_connection(&ConnectionId::from("c1"));
        assert_eq!(reg.connection_count(), 0);
        // idempotent
        reg.remove_connection(&ConnectionId::from("c1"));
    }

    #[test]
    fn connections_snapshot_tracks_adds_and_removes() {
        let reg = ConnectionRegistry::new();
        let (c1, _r1) = make_conn("c1", "default");
        let (c2, _r2) = make_conn("c2", "lobby");
        reg.add_connection(c1);
        reg.add_connection(c2);
        assert_eq!(reg.connections().len(), 2);

        reg.remove_connection(&ConnectionId::from("c1"));
        let remaining = reg.connections();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id.as_str(), "c2");
    }

    #[test]
    fn register_last_writer_wins() {
        let reg = ConnectionRegistry::new();
        let (c1, mut rx1) = make_conn("c1", "default");
        let (c2, mut rx2) = make_conn("c2", "default");
        reg.add_connection(c1);
        reg.add_connection(c2);

        let pid = ParticipantId::from("p1");
        reg.register(&pid, &ConnectionId::from("c1"));
        reg.register(&pid, &ConnectionId::from("c2"));

        assert!(reg.send(&pid, Arc::new("hi".into())));
        assert!(rx1.try_recv().is_err(), "old binding must not receive");
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn unregister_removes_from_all_sessions() {
        let reg = ConnectionRegistry::new();
        let (conn, _rx) = make_conn("c1", "default");
        reg.add_connection(conn);

        let pid = ParticipantId::from("p1");
        reg.register(&pid, &ConnectionId::from("c1"));
        reg.join(&SessionId::from("s1"), &pid);
        reg.join(&SessionId::from("s2"), &pid);

        reg.unregister(&pid);
        assert!(!reg.is_registered(&pid));
        assert!(reg.members(&SessionId::from("s1")).is_empty());
        assert!(reg.members(&SessionId::from("s2")).is_empty());

        // idempotent
        reg.unregister(&pid);
    }

    #[test]
    fn remove_connection_unregisters_bound_participants() {
        let reg = ConnectionRegistry::new();
        let (conn, _rx) = make_conn("c1", "default");
        reg.add_connection(conn);

        let pid = ParticipantId::from("p1");
        reg.register(&pid, &ConnectionId::from("c1"));
        reg.join(&SessionId::from("s1"), &pid);

        reg.remove_connection(&ConnectionId::from("c1"));
        assert!(!reg.is_registered(&pid));
        assert!(reg.members(&SessionId::from("s1")).is_empty());
    }

    #[test]
    fn members_snapshot() {
        let reg = ConnectionRegistry::new();
        let sid = SessionId::from("s1");
        reg.join(&sid, &ParticipantId::from("p1"));
        reg.join(&sid, &ParticipantId::from("p2"));
        let mut members = reg.members(&sid);
        members.sort();
        assert_eq!(members.len(), 2);
        assert!(reg.members(&SessionId::from("empty")).is_empty());
    }

    #[test]
    fn send_unknown_participant_returns_false() {
        let reg = ConnectionRegistry::new();
        assert!(!reg.send(&ParticipantId::from("ghost"), Arc::new("x".into())));
    }

    #[test]
    fn send_after_connection_removed_returns_false() {
        let reg = ConnectionRegistry::new();
        let (conn, _rx) = make_conn("c1", "default");
        reg.add_connection(conn);
        let pid = ParticipantId::from("p1");
        reg.register(&pid, &ConnectionId::from("c1"));
        reg.remove_connection(&ConnectionId::from("c1"));
        assert!(!reg.send(&pid, Arc::new("x".into())));
    }

    #[test]
    fn room_connections_grouped_by_room() {
        let reg = ConnectionRegistry::new();
        let (c1, _r1) = make_conn("c1", "lobby");
        let (c2, _r2) = make_conn("c2", "lobby");
        let (c3, _r3) = make_conn("c3", "other");
        reg.add_connection(c1);
        reg.add_connection(c2);
        reg.add_connection(c3);

        assert_eq!(reg.room_connections("lobby").len(), 2);
        assert_eq!(reg.room_connections("other").len(), 1);
        assert!(reg.room_connections("empty").is_empty());

        reg.remove_connection(&ConnectionId::from("c1"));
        assert_eq!(reg.room_connections("lobby").len(), 1);
    }
}
