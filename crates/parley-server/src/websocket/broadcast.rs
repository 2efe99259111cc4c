//! Event fan-out to session members and legacy chat rooms.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use parley_core::{ParticipantId, SessionId};

use crate::metrics::{SLOW_CLIENT_EVICTIONS_TOTAL, WS_BROADCAST_DROPS_TOTAL};
use crate::protocol::OutboundEvent;

use super::registry::ConnectionRegistry;

/// Lifetime drop budget per connection; a client that exceeds it is
/// evicted from the registry rather than silently starved.
const MAX_TOTAL_DROPS: u64 = 256;

/// Fans out events to the live members of a session.
pub struct BroadcastRouter {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastRouter {
    /// Create a router over the given registry.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Broadcast an event to every live member of a session, optionally
    /// excluding one participant (typically the sender).
    ///
    /// The event is serialized once and shared via `Arc`. Per-recipient
    /// failures are logged and counted, never propagated; the iteration
    /// order within one call is preserved.
    pub fn broadcast(
        &self,
        session_id: &SessionId,
        event: &OutboundEvent,
        exclude: Option<&ParticipantId>,
    ) {
        let json = match serde_json::to_string(event) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event_type = %event.event_type, error = %e, "failed to serialize event");
                return;
            }
        };

        let members = self.registry.members(session_id);
        debug!(
            event_type = %event.event_type,
            session_id = %session_id,
            recipients = members.len(),
            "broadcast event to session"
        );

        for participant_id in &members {
            if Some(participant_id) == exclude {
                continue;
            }
            if !self.registry.send(participant_id, Arc::clone(&json)) {
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                warn!(
                    participant_id = %participant_id,
                    session_id = %session_id,
                    "failed to send event to participant"
                );
                self.maybe_evict(participant_id);
            }
        }
    }

    /// Relay a raw legacy chat payload to every connection in a room,
    /// excluding the sender's connection.
    pub fn relay_room(&self, room: &str, payload: &str, sender: &parley_core::ConnectionId) {
        let json = Arc::new(payload.to_owned());
        let conns = self.registry.room_connections(room);
        debug!(room, recipients = conns.len(), "relay legacy chat message");
        for conn in conns {
            if &conn.id == sender {
                continue;
            }
            if !conn.send(Arc::clone(&json)) {
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                warn!(conn_id = %conn.id, room, "failed to relay chat message");
            }
        }
    }

    /// Evict a participant whose connection has exceeded its lifetime drop
    /// budget. The session read loop notices the closed registry entry and
    /// tears the socket down.
    fn maybe_evict(&self, participant_id: &ParticipantId) {
        let over_budget = self
            .registry
            .members_connection_drops(participant_id)
            .is_some_and(|drops| drops >= MAX_TOTAL_DROPS);
        if over_budget {
            counter!(SLOW_CLIENT_EVICTIONS_TOTAL).increment(1);
            warn!(participant_id = %participant_id, "evicting slow client");
            self.registry.unregister(participant_id);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
