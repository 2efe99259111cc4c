//! Conversation sessions and their participants.
//!
//! A [`Session`] is the top-level container that participants join. It has a
//! one-way `Active` → `Ended` lifecycle and a participant capacity that is
//! enforced at join time. A [`Participant`] is owned by exactly one session
//! and is deactivated on leave, never deleted, so the roster remains a
//! complete history of who took part.

use serde::{Deserialize, Serialize};

use crate::ids::{ParticipantId, SessionId};
use crate::now_rfc3339;

/// Default participant capacity for sessions created implicitly.
pub const DEFAULT_MAX_PARTICIPANTS: u32 = 10;

/// Lifecycle state of a session. One-way: `Active` → `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Session accepts joins, branches, and messages.
    Active,
    /// Session has ended; all mutation is rejected.
    Ended,
}

/// What kind of actor a participant is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantKind {
    /// A human user.
    Human,
    /// An autonomous AI conversation agent.
    AiAgent,
    /// A scripted bot.
    Bot,
    /// The system itself (notices, housekeeping).
    System,
}

/// Authorization role of a participant within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantRole {
    /// Created the session; may end it.
    Host,
    /// Regular member.
    Participant,
    /// Read-only member.
    Observer,
    /// Elevated member.
    Admin,
    /// Transient member.
    Guest,
}

/// A member of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Unique participant ID (client-supplied or generated).
    pub id: ParticipantId,
    /// Display name shown to other participants.
    pub display_name: String,
    /// Actor kind.
    pub kind: ParticipantKind,
    /// Role within the session.
    pub role: ParticipantRole,
    /// RFC 3339 timestamp of the join.
    pub joined_at: String,
    /// RFC 3339 timestamp of the leave, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_at: Option<String>,
    /// Whether the participant is currently active in the session.
    pub active: bool,
}

impl Participant {
    /// Create a new active participant joined now.
    #[must_use]
    pub fn new(
        id: ParticipantId,
        display_name: impl Into<String>,
        kind: ParticipantKind,
        role: ParticipantRole,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            kind,
            role,
            joined_at: now_rfc3339(),
            left_at: None,
            active: true,
        }
    }

    /// Mark the participant as having left. Idempotent: `left_at` is only
    /// recorded the first time.
    pub fn deactivate(&mut self) {
        if self.active {
            self.active = false;
            self.left_at = Some(now_rfc3339());
        }
    }
}

/// A multi-party conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session ID.
    pub id: SessionId,
    /// Human-readable title.
    pub title: String,
    /// Optional free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Participant capacity; joins beyond this are rejected.
    pub max_participants: u32,
    /// Number of currently active participants.
    pub participant_count: u32,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 end timestamp, set once when the session ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
}

impl Session {
    /// Create a new active session with the given capacity.
    #[must_use]
    pub fn new(
        id: SessionId,
        title: impl Into<String>,
        description: Option<String>,
        max_participants: u32,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            description,
            status: SessionStatus::Active,
            max_participants,
            participant_count: 0,
            created_at: now_rfc3339(),
            ended_at: None,
        }
    }

    /// Create a session with the implicit defaults used by `create_or_get`:
    /// title `"Parley Session <id>"` and capacity [`DEFAULT_MAX_PARTICIPANTS`].
    #[must_use]
    pub fn with_defaults(id: SessionId) -> Self {
        let title = format!("Parley Session {id}");
        Self::new(id, title, None, DEFAULT_MAX_PARTICIPANTS)
    }

    /// Whether the session can accept another participant.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.status == SessionStatus::Active && self.participant_count < self.max_participants
    }

    /// Whether the session is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// End the session. Idempotent: `ended_at` is only recorded once.
    pub fn end(&mut self) {
        if self.status == SessionStatus::Active {
            self.status = SessionStatus::Ended;
            self.ended_at = Some(now_rfc3339());
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_defaults_uses_capacity_ten() {
        let s = Session::with_defaults(SessionId::from("s1"));
        assert_eq!(s.max_participants, DEFAULT_MAX_PARTICIPANTS);
        assert_eq!(s.title, "Parley Session s1");
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.participant_count, 0);
        assert!(s.ended_at.is_none());
    }

    #[test]
    fn has_capacity_respects_limit() {
        let mut s = Session::new(SessionId::from("s1"), "t", None, 2);
        assert!(s.has_capacity());
        s.participant_count = 2;
        assert!(!s.has_capacity());
    }

    #[test]
    fn ended_session_has_no_capacity() {
        let mut s = Session::with_defaults(SessionId::from("s1"));
        s.end();
        assert!(!s.has_capacity());
        assert!(!s.is_active());
    }

    #[test]
    fn end_is_idempotent() {
        let mut s = Session::with_defaults(SessionId::from("s1"));
        s.end();
        let first = s.ended_at.clone();
        assert!(first.is_some());
        s.end();
        assert_eq!(s.ended_at, first);
    }

    #[test]
    fn participant_deactivate_records_left_at_once() {
        let mut p = Participant::new(
            ParticipantId::from("p1"),
            "Mia",
            ParticipantKind::AiAgent,
            ParticipantRole::Participant,
        );
        assert!(p.active);
        assert!(p.left_at.is_none());
        p.deactivate();
        let first = p.left_at.clone();
        assert!(!p.active);
        assert!(first.is_some());
        p.deactivate();
        assert_eq!(p.left_at, first);
    }

    #[test]
    fn status_serializes_screaming_snake() {
        let json = serde_json::to_string(&SessionStatus::Active).unwrap();
        assert_eq!(json, "\"ACTIVE\"");
        let json = serde_json::to_string(&ParticipantKind::AiAgent).unwrap();
        assert_eq!(json, "\"AI_AGENT\"");
        let json = serde_json::to_string(&ParticipantRole::Host).unwrap();
        assert_eq!(json, "\"HOST\"");
    }

    #[test]
    fn session_serializes_camel_case() {
        let s = Session::with_defaults(SessionId::from("s1"));
        let v = serde_json::to_value(&s).unwrap();
        assert!(v.get("maxParticipants").is_some());
        assert!(v.get("participantCount").is_some());
        assert!(v.get("createdAt").is_some());
        // None fields are skipped
        assert!(v.get("endedAt").is_none());
    }
}
