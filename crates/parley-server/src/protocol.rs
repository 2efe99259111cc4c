//! Wire protocol: inbound frames, the response envelope, outbound events.
//!
//! Inbound frames are JSON objects `{type, data, timestamp}`. Recognized
//! types get a structured handler; anything else falls back to the legacy
//! room-chat relay. Responses to the sender use the envelope
//! `{status: SUCCESS|ERROR, message, data, timestamp}`; broadcasts to other
//! participants reuse the `{type, data, timestamp}` shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use parley_core::now_rfc3339;

// ── Frame types ─────────────────────────────────────────────────────

/// Join (or implicitly create) a session.
pub const JOIN_SESSION: &str = "JOIN_SESSION";
/// Split a new branch off the conversation.
pub const CREATE_BRANCH: &str = "CREATE_BRANCH";
/// Post an utterance to a branch.
pub const CHARACTER_MESSAGE: &str = "CHARACTER_MESSAGE";
/// Register a TTS routing configuration.
pub const CONFIGURE_TTS: &str = "CONFIGURE_TTS";

// ── Outbound event types ────────────────────────────────────────────

/// Sent to the client immediately after the WebSocket upgrade.
pub const CONNECTION_ESTABLISHED: &str = "CONNECTION_ESTABLISHED";
/// Broadcast when a participant joins a session.
pub const PARTICIPANT_JOINED: &str = "PARTICIPANT_JOINED";
/// Broadcast when a branch is created.
pub const BRANCH_CREATED: &str = "BRANCH_CREATED";
/// Sent to every live connection when the server begins shutting down.
pub const SERVER_SHUTDOWN: &str = "SERVER_SHUTDOWN";

// ── Protocol-level error codes ──────────────────────────────────────

/// Speaker id missing or empty on a `CHARACTER_MESSAGE`.
pub const INVALID_SPEAKER: &str = "INVALID_SPEAKER";
/// Content missing or empty on a `CHARACTER_MESSAGE`.
pub const INVALID_MESSAGE: &str = "INVALID_MESSAGE";

// ── Legacy fallback IDs (opt-in via config) ─────────────────────────

/// Session substituted when `legacy_fallback_ids` is enabled.
pub const DEFAULT_SESSION_ID: &str = "default_session";

/// An inbound client frame.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    /// Frame type; unrecognized values take the legacy relay path.
    #[serde(rename = "type")]
    pub frame_type: String,
    /// Type-specific payload.
    #[serde(default)]
    pub data: Value,
    /// Client-supplied timestamp, ignored by the server.
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// Response status of an [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    /// The operation was applied.
    Success,
    /// The operation was rejected; `data.code` carries the error code.
    Error,
}

/// Response sent back to the frame's sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Outcome of the operation.
    pub status: ResponseStatus,
    /// Human-readable summary.
    pub message: String,
    /// Operation result, or `{code}` on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Server timestamp, RFC 3339 with milliseconds.
    pub timestamp: String,
}

impl Envelope {
    /// A `SUCCESS` envelope.
    #[must_use]
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            data: Some(data),
            timestamp: now_rfc3339(),
        }
    }

    /// An `ERROR` envelope carrying a machine-readable code in `data.code`.
    #[must_use]
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: message.into(),
            data: Some(serde_json::json!({ "code": code })),
            timestamp: now_rfc3339(),
        }
    }

    /// Serialize to a JSON string. Serialization of this shape cannot fail;
    /// an empty object is returned defensively if it ever does.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".into())
    }
}

/// An outbound broadcast event `{type, data, timestamp}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundEvent {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    pub data: Value,
    /// Server timestamp, RFC 3339 with milliseconds.
    pub timestamp: String,
}

impl OutboundEvent {
    /// Build an event stamped now.
    #[must_use]
    pub fn new(event_type: &str, data: Value) -> Self {
        Self {
            event_type: event_type.to_owned(),
            data,
            timestamp: now_rfc3339(),
        }
    }
}

/// Display name for well-known speaker ids; everyone else keeps their id.
#[must_use]
pub fn speaker_display_name(speaker_id: &str) -> String {
    match speaker_id {
        "user" => "Parley User".into(),
        "assistant" => "AI Assistant".into(),
        "ai1" => "Mia".into(),
        "ai2" => "Leo".into(),
        other => other.to_owned(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_frame_parses_with_and_without_data() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"type":"JOIN_SESSION","data":{"sessionId":"s1"}}"#).unwrap();
        assert_eq!(frame.frame_type, JOIN_SESSION);
        assert_eq!(frame.data["sessionId"], "s1");

        let frame: InboundFrame = serde_json::from_str(r#"{"type":"PING"}"#).unwrap();
        assert_eq!(frame.frame_type, "PING");
        assert!(frame.data.is_null());
    }

    #[test]
    fn frame_without_type_fails_to_parse() {
        let result = serde_json::from_str::<InboundFrame>(r#"{"data":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn success_envelope_shape() {
        let env = Envelope::success("joined", serde_json::json!({"sessionId": "s1"}));
        let v: Value = serde_json::from_str(&env.to_json()).unwrap();
        assert_eq!(v["status"], "SUCCESS");
        assert_eq!(v["message"], "joined");
        assert_eq!(v["data"]["sessionId"], "s1");
        assert!(v["timestamp"].is_string());
    }

    #[test]
    fn error_envelope_carries_code() {
        let env = Envelope::error("SESSION_FULL", "session is full");
        let v: Value = serde_json::from_str(&env.to_json()).unwrap();
        assert_eq!(v["status"], "ERROR");
        assert_eq!(v["data"]["code"], "SESSION_FULL");
    }

    #[test]
    fn outbound_event_shape() {
        let event = OutboundEvent::new(PARTICIPANT_JOINED, serde_json::json!({"id": "p1"}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PARTICIPANT_JOINED");
        assert_eq!(json["data"]["id"], "p1");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn well_known_speaker_names() {
        assert_eq!(speaker_display_name("user"), "Parley User");
        assert_eq!(speaker_display_name("assistant"), "AI Assistant");
        assert_eq!(speaker_display_name("ai1"), "Mia");
        assert_eq!(speaker_display_name("ai2"), "Leo");
        assert_eq!(speaker_display_name("alice"), "alice");
    }
}
