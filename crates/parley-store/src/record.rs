//! Archived record types.
//!
//! [`Record`] is the single envelope the archive stores: one variant per
//! domain entity. Entities that do not carry a session ID themselves
//! (participants, utterances, streaming sessions) are wrapped together with
//! the session they belong to, so `find_by_session` and `delete_by_session`
//! work uniformly across all kinds.

use serde::{Deserialize, Serialize};

use parley_core::{
    Branch, Participant, RoutingConfig, Session, SessionId, StreamingSession, Utterance,
};

/// Discriminates the entity kind of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordKind {
    /// A conversation session.
    Session,
    /// A session participant.
    Participant,
    /// A conversation branch.
    Branch,
    /// A branch utterance.
    Utterance,
    /// A TTS routing configuration.
    RoutingConfig,
    /// A TTS streaming session.
    StreamingSession,
}

impl RecordKind {
    /// Stable string name, used in logs and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Session => "SESSION",
            Self::Participant => "PARTICIPANT",
            Self::Branch => "BRANCH",
            Self::Utterance => "UTTERANCE",
            Self::RoutingConfig => "ROUTING_CONFIG",
            Self::StreamingSession => "STREAMING_SESSION",
        }
    }
}

/// One archived domain entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Record {
    /// A session snapshot.
    Session(Session),
    /// A participant snapshot, tagged with its owning session.
    Participant {
        /// Session the participant belongs to.
        session_id: SessionId,
        /// The participant.
        participant: Participant,
    },
    /// A branch snapshot.
    Branch(Branch),
    /// An utterance snapshot, tagged with its owning session.
    Utterance {
        /// Session the utterance's branch belongs to.
        session_id: SessionId,
        /// The utterance.
        utterance: Utterance,
    },
    /// A routing config snapshot.
    RoutingConfig(RoutingConfig),
    /// A streaming session snapshot, tagged with its owning session.
    StreamingSession {
        /// Session the stream's routing config belongs to.
        session_id: SessionId,
        /// The streaming session.
        stream: StreamingSession,
    },
}

impl Record {
    /// The entity kind of this record.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Session(_) => RecordKind::Session,
            Self::Participant { .. } => RecordKind::Participant,
            Self::Branch(_) => RecordKind::Branch,
            Self::Utterance { .. } => RecordKind::Utterance,
            Self::RoutingConfig(_) => RecordKind::RoutingConfig,
            Self::StreamingSession { .. } => RecordKind::StreamingSession,
        }
    }

    /// The entity's own ID.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Session(s) => s.id.as_str(),
            Self::Participant { participant, .. } => participant.id.as_str(),
            Self::Branch(b) => b.id.as_str(),
            Self::Utterance { utterance, .. } => utterance.id.as_str(),
            Self::RoutingConfig(c) => c.id.as_str(),
            Self::StreamingSession { stream, .. } => stream.id.as_str(),
        }
    }

    /// The session this record belongs to.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Session(s) => &s.id,
            Self::Participant { session_id, .. }
            | Self::Utterance { session_id, .. }
            | Self::StreamingSession { session_id, .. } => session_id,
            Self::Branch(b) => &b.session_id,
            Self::RoutingConfig(c) => &c.session_id,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{ParticipantId, ParticipantKind, ParticipantRole};

    #[test]
    fn session_record_accessors() {
        let s = Session::with_defaults(SessionId::from("s1"));
        let r = Record::Session(s);
        assert_eq!(r.kind(), RecordKind::Session);
        assert_eq!(r.id(), "s1");
        assert_eq!(r.session_id().as_str(), "s1");
    }

    #[test]
    fn participant_record_carries_session() {
        let p = Participant::new(
            ParticipantId::from("p1"),
            "Mia",
            ParticipantKind::AiAgent,
            ParticipantRole::Participant,
        );
        let r = Record::Participant {
            session_id: SessionId::from("s1"),
            participant: p,
        };
        assert_eq!(r.kind(), RecordKind::Participant);
        assert_eq!(r.id(), "p1");
        assert_eq!(r.session_id().as_str(), "s1");
    }

    #[test]
    fn branch_record_uses_embedded_session() {
        let b = Branch::main(SessionId::from("s2"), ParticipantId::from("host"));
        let r = Record::Branch(b.clone());
        assert_eq!(r.kind(), RecordKind::Branch);
        assert_eq!(r.id(), b.id.as_str());
        assert_eq!(r.session_id().as_str(), "s2");
    }

    #[test]
    fn record_serde_is_tagged() {
        let s = Session::with_defaults(SessionId::from("s1"));
        let json = serde_json::to_value(Record::Session(s)).unwrap();
        assert_eq!(json.get("kind").and_then(|v| v.as_str()), Some("SESSION"));
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(RecordKind::RoutingConfig.as_str(), "ROUTING_CONFIG");
        assert_eq!(RecordKind::StreamingSession.as_str(), "STREAMING_SESSION");
    }
}
