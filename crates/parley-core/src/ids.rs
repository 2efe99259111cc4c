//! Branded ID newtypes for type safety.
//!
//! Every entity in the Parley system has a distinct ID type implemented as a
//! newtype wrapper around `String`. This prevents accidentally passing a
//! branch ID where a session ID is expected.
//!
//! Freshly generated IDs are UUID v7 (time-ordered) via
//! [`uuid::Uuid::now_v7`]; IDs supplied by clients (session ids, participant
//! ids) are accepted as arbitrary opaque strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a new UUID v7 string (time-ordered).
fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(new_v7())
            }

            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for a conversation session.
    SessionId
}

branded_id! {
    /// Unique identifier for a participant (human or agent).
    ParticipantId
}

branded_id! {
    /// Unique identifier for a conversation branch within a session.
    BranchId
}

branded_id! {
    /// Unique identifier for an utterance within a branch.
    UtteranceId
}

branded_id! {
    /// Unique identifier for a TTS routing configuration.
    RoutingId
}

branded_id! {
    /// Unique identifier for a TTS streaming session.
    StreamId
}

branded_id! {
    /// Unique identifier for a live transport connection.
    ConnectionId
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_new_is_uuid_v7() {
        let id = SessionId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn branch_id_new_is_uuid_v7() {
        let id = BranchId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn ids_are_unique() {
        let a = StreamId::new();
        let b = StreamId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn from_string() {
        let id = SessionId::from_string("parley_demo".to_owned());
        assert_eq!(id.as_str(), "parley_demo");
    }

    #[test]
    fn from_str_ref() {
        let id = ParticipantId::from("ai1");
        assert_eq!(id.as_str(), "ai1");
    }

    #[test]
    fn deref_to_str() {
        let id = BranchId::from("main");
        let s: &str = &id;
        assert_eq!(s, "main");
    }

    #[test]
    fn display() {
        let id = RoutingId::from("route-7");
        assert_eq!(format!("{id}"), "route-7");
    }

    #[test]
    fn into_string() {
        let id = SessionId::from("convert");
        let s: String = id.into();
        assert_eq!(s, "convert");
    }

    #[test]
    fn serde_roundtrip() {
        let id = UtteranceId::from("serde-test");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"serde-test\"");
        let back: UtteranceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn serde_in_struct() {
        #[derive(Serialize, Deserialize, Debug, PartialEq)]
        struct Keyed {
            session_id: SessionId,
            branch_id: BranchId,
        }

        let keyed = Keyed {
            session_id: SessionId::from("sess-1"),
            branch_id: BranchId::from("br-1"),
        };
        let json = serde_json::to_string(&keyed).unwrap();
        let back: Keyed = serde_json::from_str(&json).unwrap();
        assert_eq!(keyed, back);
    }

    #[test]
    fn hash_and_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        let id = ParticipantId::from("same");
        let _ = set.insert(id.clone());
        let _ = set.insert(id.clone());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn default_creates_new() {
        let id1 = ConnectionId::default();
        let id2 = ConnectionId::default();
        assert_ne!(id1, id2, "default should create unique IDs");
    }
}
